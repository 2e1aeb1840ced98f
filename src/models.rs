use crate::config::{ExplorerConfig, DEFAULT_MAX_SESSIONS};
use crate::explorer::{Explorer, ShellEvent, ViewModel};
use crate::tree::TreeNode;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

#[derive(Deserialize)]
pub struct DirectoryQuery {
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct EntryResult {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub success: bool,
    pub session_id: u64,
    pub view: ViewModel,
}

#[derive(Serialize)]
pub struct IntentResult {
    pub success: bool,
    pub events: Vec<ShellEvent>,
    pub view: ViewModel,
}

/// Shared by every worker: the snapshot and the live sessions built on it.
/// Session ids only grow, so the first key in `sessions` is the oldest.
pub struct AppState {
    pub snapshot: Arc<TreeNode>,
    pub defaults: ExplorerConfig,
    pub max_sessions: usize,
    pub sessions: Mutex<BTreeMap<u64, Explorer>>,
    pub next_session_id: AtomicU64,
}

impl AppState {
    pub fn new(snapshot: TreeNode, defaults: ExplorerConfig) -> Result<Self> {
        if !snapshot.is_dir() {
            bail!("Snapshot root '{}' is not a directory", snapshot.name());
        }
        snapshot
            .validate()
            .map_err(|e| anyhow!("Invalid snapshot: {}", e))?;
        Ok(Self {
            snapshot: Arc::new(snapshot),
            defaults,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: Mutex::new(BTreeMap::new()),
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn with_session_limit(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_snapshot_with_duplicate_siblings() {
        let snapshot = TreeNode::dir(
            "proj",
            vec![TreeNode::file("a.ts", "x"), TreeNode::file("a.ts", "y")],
        );
        assert!(AppState::new(snapshot, ExplorerConfig::default()).is_err());
    }

    #[test]
    fn rejects_file_root() {
        let snapshot = TreeNode::file("a.ts", "x");
        assert!(AppState::new(snapshot, ExplorerConfig::default()).is_err());
    }

    #[test]
    fn session_limit_is_at_least_one() {
        let state = AppState::new(TreeNode::dir("proj", vec![]), ExplorerConfig::default())
            .unwrap()
            .with_session_limit(0);
        assert_eq!(state.max_sessions, 1);
    }
}
