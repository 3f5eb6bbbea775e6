//! Reviewer command grammar.
//!
//! `Command ::= SingleOp Seq Reason? | BulkOp Reason?`
//!
//! Parsed once per inbound message, independent of transport text quirks.
//! Anything that does not match the grammar is not a command.

use std::sync::LazyLock;

use regex::Regex;

static BULK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(ya|na|全部同意|全部拒绝)\s*(.*)$").unwrap());

static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(y|n|通过|拒绝)\s*(\d+)\s*(.*)$").unwrap());

/// A parsed reviewer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve one pending approval by sequence number.
    Single {
        approve: bool,
        seq: u32,
        reason: String,
    },
    /// Resolve every pending approval at once.
    Bulk { approve: bool, reason: String },
}

/// Parse a message text as a reviewer command.
///
/// Bulk operators are matched first so `ya` is never read as `y` + garbage.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();
    if let Some(caps) = BULK_RE.captures(text) {
        let op = caps[1].to_lowercase();
        return Some(Command::Bulk {
            approve: op == "ya" || op == "全部同意",
            reason: caps[2].trim().to_string(),
        });
    }
    if let Some(caps) = SINGLE_RE.captures(text) {
        let op = caps[1].to_lowercase();
        // A number too large for u32 cannot name a pending approval.
        let seq = caps[2].parse().ok()?;
        return Some(Command::Single {
            approve: op == "y" || op == "通过",
            seq,
            reason: caps[3].trim().to_string(),
        });
    }
    None
}
