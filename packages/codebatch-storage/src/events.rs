//! Append-only observability events. Never consulted by any query path -
//! see the events-independence invariant in the query engine module.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::ids::now_rfc3339;
use crate::schema::Event;

/// Append one event line to `path`, creating the file and parent
/// directories if needed. Plain append is acceptable here: events are
/// observability-only and never participate in the atomic-replace
/// discipline that governs `state.json`/`outputs.index.jsonl`.
pub fn append(path: &Path, event: &str, fields: HashMap<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let record = Event {
        event: event.to_string(),
        ts: now_rfc3339(),
        fields,
    };
    let line = serde_json::to_string(&record)?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}
