//! Process tree statistics over a parsed listing

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::record::{FieldValue, ProcessRecord};

/// The parts of a record that define its place in the process tree.
/// Deserializes straight out of a stored artifact, ignoring other keys.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub pid: FieldValue,
    #[serde(default)]
    pub ppid: Option<FieldValue>,
    #[serde(rename = "ExitTime", default)]
    pub exit_time: Option<String>,
}

impl From<&ProcessRecord> for TreeEntry {
    fn from(record: &ProcessRecord) -> Self {
        Self {
            pid: record.pid.clone(),
            ppid: record.ppid.clone(),
            exit_time: record.exit_time.clone(),
        }
    }
}

impl TreeEntry {
    /// Only an explicit ppid of 0 marks a top-level process. A missing or
    /// blank ppid is treated as an absent parent.
    fn is_top_level(&self) -> bool {
        self.ppid.as_ref().and_then(FieldValue::as_int) == Some(0)
    }
}

fn parent_of<'a>(
    by_pid: &HashMap<&'a FieldValue, &'a TreeEntry>,
    entry: &TreeEntry,
) -> Option<&'a TreeEntry> {
    entry.ppid.as_ref().and_then(|p| by_pid.get(p).copied())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub total: usize,
    pub running: usize,
    pub exited: usize,
    /// Processes with ppid 0 or whose parent is not in the listing
    pub roots: usize,
    /// Processes without ppid 0 whose parent is not in the listing
    pub orphans: usize,
    /// Processes with at least one child in the listing
    pub parents: usize,
    pub leaves: usize,
    pub max_depth: usize,
}

impl TreeSummary {
    pub fn from_records(records: &[ProcessRecord]) -> Self {
        let entries: Vec<TreeEntry> = records.iter().map(TreeEntry::from).collect();
        Self::from_entries(&entries)
    }

    pub fn from_entries(entries: &[TreeEntry]) -> Self {
        let by_pid: HashMap<&FieldValue, &TreeEntry> =
            entries.iter().map(|e| (&e.pid, e)).collect();

        let mut summary = TreeSummary {
            total: entries.len(),
            ..Default::default()
        };

        let child_ppids: HashSet<&FieldValue> =
            entries.iter().filter_map(|e| e.ppid.as_ref()).collect();

        for entry in entries {
            if entry.exit_time.as_deref().unwrap_or("").is_empty() {
                summary.running += 1;
            } else {
                summary.exited += 1;
            }

            let top_level = entry.is_top_level();
            let has_parent = parent_of(&by_pid, entry).is_some();
            if top_level || !has_parent {
                summary.roots += 1;
            }
            if !top_level && !has_parent {
                summary.orphans += 1;
            }
            if child_ppids.contains(&entry.pid) {
                summary.parents += 1;
            }

            // Walk up the chain; a pid seen twice means a cycle in the listing.
            let mut depth = 1;
            let mut seen = HashSet::from([&entry.pid]);
            let mut current = entry;
            while let Some(parent) = parent_of(&by_pid, current) {
                if current.is_top_level() || !seen.insert(&parent.pid) {
                    break;
                }
                depth += 1;
                current = parent;
            }
            summary.max_depth = summary.max_depth.max(depth);
        }

        summary.leaves = summary.total - summary.parents;
        summary
    }
}
