//! Read-only audit CLI.
//!
//! Queries over the journals and declarative stores; nothing here mutates
//! governance state except `map rebuild`, which rewrites a derived view.

use crate::core::error::CorridorError;
use crate::core::output::compact_line;
use crate::core::spatial;
use crate::core::store::Store;
use crate::core::trace::TraceStore;
use crate::plugins::command_risk;
use crate::plugins::ignore_rules::IgnoreIndex;
use crate::plugins::intent_map;
use crate::plugins::intents::IntentStore;
use crate::plugins::lesson::LessonLog;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "corridor",
    version = env!("CARGO_PKG_VERSION"),
    about = "Audit surface for the Corridor governance middleware"
)]
pub struct Cli {
    /// Workspace root (defaults to the current directory)
    #[clap(long, global = true)]
    pub workspace: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List or show declared intents
    Intents {
        #[clap(subcommand)]
        command: IntentsCommand,
    },
    /// Query the trace journal
    Trace {
        #[clap(subcommand)]
        command: TraceCommand,
    },
    /// Classify a shell command the way the gate would
    #[clap(name = "command")]
    Eval {
        /// The command string to classify
        command: String,
    },
    /// Show the most recent lesson entries
    Lessons {
        #[clap(long, default_value = "5")]
        last: usize,
    },
    /// Rebuild the derived intent map from the journal
    Map,
    /// List remembered approvals
    Approvals,
    /// Locate a content hash in the workspace tree
    Locate {
        /// Hex SHA-256 of the normalized content
        hash: String,
    },
    /// Show the loaded ignore rules
    Rules,
}

#[derive(Subcommand, Debug)]
pub enum IntentsCommand {
    List,
    Show {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TraceCommand {
    /// Records attributed to an intent
    ByIntent { id: String },
    /// Records touching a file path
    ByFile { path: String },
    /// Records containing a content hash
    ByHash { hash: String },
    /// Most recent records
    Tail {
        #[clap(long, default_value = "5")]
        last: usize,
    },
}

pub fn run(cli: Cli) -> Result<(), CorridorError> {
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let store = Store::new(&workspace);
    let traces = TraceStore::new(store.trace_journal_path());

    match cli.command {
        Command::Intents { command } => {
            let intents = IntentStore::new(store.intents_path());
            match command {
                IntentsCommand::List => {
                    let all = intents.load();
                    if all.is_empty() {
                        println!("No intents declared.");
                    }
                    for intent in all {
                        println!(
                            "{:<10} {:<10} {}",
                            intent.id.bold(),
                            format!("{:?}", intent.status),
                            intent.name
                        );
                    }
                }
                IntentsCommand::Show { id } => match intents.get(&id) {
                    Some(intent) => {
                        println!("{}", serde_json::to_string_pretty(&intent)?);
                    }
                    None => println!("{} not found", id.red()),
                },
            }
        }
        Command::Trace { command } => {
            let records = match command {
                TraceCommand::ByIntent { id } => traces.by_intent(&id),
                TraceCommand::ByFile { path } => traces.by_file(&path),
                TraceCommand::ByHash { hash } => traces
                    .by_content_hash(&hash)
                    .into_iter()
                    .map(|(record, _)| record)
                    .collect(),
                TraceCommand::Tail { last } => {
                    let mut all = traces.all();
                    if all.len() > last {
                        all.drain(..all.len() - last);
                    }
                    all
                }
            };
            if records.is_empty() {
                println!("No matching trace records.");
            }
            for record in records {
                let files: Vec<&str> = record
                    .files
                    .iter()
                    .map(|f| f.relative_path.as_str())
                    .collect();
                println!(
                    "{}  {}  {}  {}",
                    record.ts.dimmed(),
                    record.intent_id().unwrap_or("-").bold(),
                    files.join(", "),
                    compact_line(&record.vcs.revision_id, 12).dimmed()
                );
            }
        }
        Command::Eval { command } => {
            let classification = command_risk::classify(&command);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Command::Lessons { last } => {
            let lessons = LessonLog::new(store.lesson_log_path());
            for entry in lessons.tail(last) {
                println!("{}\n", entry);
            }
        }
        Command::Map => {
            intent_map::rebuild(&traces, &store.intent_map_path())?;
            println!("Intent map rebuilt at {}", store.intent_map_path().display());
        }
        Command::Approvals => {
            let ledger = crate::core::approval::ApprovalLedger::open(store.approvals_db_path())?;
            let approvals = ledger.list()?;
            if approvals.is_empty() {
                println!("No remembered approvals.");
            }
            for approval in approvals {
                println!(
                    "{}  {:<10} {:<8} {}",
                    approval.ts.dimmed(),
                    approval.scope,
                    approval.actor,
                    compact_line(&approval.action, 60)
                );
            }
        }
        Command::Locate { hash } => {
            let hits = spatial::find_by_hash(&hash, &[store.workspace_root.clone()]);
            if hits.is_empty() {
                println!("Hash not found in the workspace tree.");
            }
            for hit in hits {
                println!(
                    "{}:{}-{}",
                    hit.path.display(),
                    hit.start_line,
                    hit.end_line
                );
            }
        }
        Command::Rules => {
            let index = IgnoreIndex::load(&store.ignore_path());
            for rule in index.rules() {
                let intent = rule.intent_id.as_deref().unwrap_or("*");
                println!("{:<10} {:<20} {:?}", intent, rule.pattern, rule.kind);
            }
        }
    }
    Ok(())
}
