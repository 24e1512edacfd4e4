use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::diff::{diff_json, redact, REDACTED};
use crate::error::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Every cycle entry carries the whole snapshot.
    Full,
    /// First cycle entry is full; later ones carry `{path, old, new}` changes.
    Diffed,
}

/// Append-only NDJSON record of cycles, push messages and failures.
pub(crate) struct SyncJournal {
    mode: JournalMode,
    file: File,
    previous_state: Option<Value>,
}

impl SyncJournal {
    pub fn new(mode: JournalMode, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_state: None,
        })
    }

    pub fn log_cycle(&mut self, cycle_id: Uuid, mode: &str, snapshot: &Value) {
        let snapshot = redact(snapshot);
        let entry = match (self.mode, self.previous_state.as_ref()) {
            (JournalMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, &snapshot, "", &mut changes);
                let change_entries: Vec<Value> = changes
                    .iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "kind": "cycle",
                    "cycle_id": cycle_id.to_string(),
                    "mode": mode,
                    "changes": change_entries,
                })
            }
            (JournalMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "kind": "cycle",
                "cycle_id": cycle_id.to_string(),
                "mode": mode,
                "full": true,
                "snapshot": snapshot,
            }),
            (JournalMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "kind": "cycle",
                "cycle_id": cycle_id.to_string(),
                "mode": mode,
                "snapshot": snapshot,
            }),
        };
        self.write_line(&entry);
        if self.mode == JournalMode::Diffed {
            self.previous_state = Some(snapshot);
        }
    }

    pub fn log_push(&mut self, payload: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "push",
            "serial": REDACTED,
            "payload": redact(payload),
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, cycle_id: Uuid, class: ErrorClass, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "kind": "failure",
            "cycle_id": cycle_id.to_string(),
            "class": class.as_str(),
            "error": error,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write journal entry: {e}");
        }
    }
}
