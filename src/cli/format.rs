//! Output formatting for CLI display.

use crate::{
    model::PendingEntry,
    storage::{LogEntry, UpsertBranch, UpsertOutcome},
};

/// One line per entry: id, page, submitter, and summary if any.
pub(super) fn format_entry(entry: &PendingEntry) -> String {
    let fields = &entry.fields;
    let mut line = format!("#{}  {}  by {}", entry.id, fields.page, fields.submitter);
    if !fields.section.is_empty() {
        line.push_str(&format!(" (section {})", fields.section));
    }
    if !fields.summary.is_empty() {
        line.push_str(&format!("  \"{}\"", fields.summary));
    }
    if let Some(rev) = entry.merged_revid {
        line.push_str(&format!("  → r{rev}"));
    }
    line
}

/// What queueing an edit did to the moderation table.
pub(super) fn describe_upsert(outcome: &UpsertOutcome) -> String {
    match outcome.branch {
        UpsertBranch::Inserted => format!("Queued entry {}", outcome.id),
        UpsertBranch::Updated => format!("Updated entry {}", outcome.id),
        UpsertBranch::Ambiguous => format!(
            "Entry {} was written concurrently; treating it as updated",
            outcome.id
        ),
    }
}

pub(super) fn format_log_entry(entry: &LogEntry) -> String {
    let params: Vec<String> = entry
        .params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!(
        "{}  {} {}d {}  [{}]",
        entry.timestamp,
        entry.actor,
        entry.action,
        entry.page,
        params.join(" ")
    )
}
