//! Corridor: governance middleware between coding agents and their tools.
//!
//! Corridor sits between an autonomous coding agent and its effectful
//! tools (`write_to_file`, `execute_command`) and enforces that every
//! mutation is attributed to a declared intent, that destructive or
//! out-of-scope operations are intercepted for approval, that concurrent
//! sessions cannot clobber each other's files, and that every accepted
//! mutation lands in a content-addressed trace journal.
//!
//! # For AI Agents
//!
//! - **Select an intent first**: every tool except `select_intent` is
//!   blocked with `INTENT_REQUIRED` until the session declares one
//! - **Read before you write**: writes are validated against the
//!   read-version your session registered; stale snapshots are rejected
//! - **Blocked is not broken**: every block carries a `_recovery` payload
//!   with suggested actions; follow it instead of retrying blindly
//!
//! # Architecture
//!
//! The [`bootstrap::Governor`] wires process-wide services (intent store,
//! ignore rules, lock manager, session registry, trace store, lesson log)
//! into a hook pipeline:
//!
//! - pre-hooks validate (intent gatekeeper, command classifier, scope
//!   enforcer, stale-file detector) and fail closed on policy violations
//! - the wrapped tool runs only if nothing blocked
//! - post-hooks record (lock release, trace, lessons, recovery log) and
//!   fail open on internal errors
//!
//! A fallback wrapper guarantees the middleware can never wedge the host
//! agent: after a catastrophic pipeline failure, tools run in bypass mode
//! for up to 60 seconds while the primary is health-probed back in.
//!
//! # Storage
//!
//! All state lives under `<workspace>/.corridor/`: `intents.yaml` and
//! `ignore.rules` (declarative, read-only), `traces.jsonl` and
//! `governance.events.jsonl` (append-only journals), `lessons.md`,
//! `intent_map.md` (derived), and `approvals.db`.

pub mod bootstrap;
pub mod cli;
pub mod core;
pub mod plugins;

pub use bootstrap::Governor;
