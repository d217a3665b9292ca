//! Glob matching for scope and ignore rules.
//!
//! Semantics: `*` matches any run of non-separator characters, `?` matches
//! exactly one non-separator character, `**` as a full path segment matches
//! any number of segments (including zero), and literals compare
//! case-sensitively on their stored form. Paths are compared with `/` as the
//! separator; callers normalize `\` before matching.

/// Match `path` against `pattern` under standard glob semantics.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').collect();
    let segs: Vec<&str> = path.split('/').collect();
    match_segments(&pat, &segs)
}

fn match_segments(pat: &[&str], segs: &[&str]) -> bool {
    match pat.split_first() {
        None => segs.is_empty(),
        Some((&"**", rest)) => (0..=segs.len()).any(|i| match_segments(rest, &segs[i..])),
        Some((first, rest)) => match segs.split_first() {
            Some((seg, seg_rest)) => match_segment(first, seg) && match_segments(rest, seg_rest),
            None => false,
        },
    }
}

fn match_segment(pat: &str, seg: &str) -> bool {
    let p: Vec<char> = pat.chars().collect();
    let s: Vec<char> = seg.chars().collect();
    match_chars(&p, &s)
}

fn match_chars(p: &[char], s: &[char]) -> bool {
    match p.split_first() {
        None => s.is_empty(),
        Some(('*', rest)) => (0..=s.len()).any(|i| match_chars(rest, &s[i..])),
        Some(('?', rest)) => !s.is_empty() && match_chars(rest, &s[1..]),
        Some((c, rest)) => s.first() == Some(c) && match_chars(rest, &s[1..]),
    }
}
