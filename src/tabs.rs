use crate::tree::{NodePath, TreeNode};
use log::debug;

/// Why an open request left the tab set untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    Directory,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened { evicted: Option<NodePath> },
    AlreadyOpen,
    Rejected(RejectReason),
}

/// Bounded, ordered set of open files plus the active one.
///
/// Eviction is FIFO on open order: the oldest-opened tab goes first, whether
/// or not it is the one being shown.
#[derive(Debug, Clone)]
pub struct TabManager {
    max_open: usize,
    open: Vec<NodePath>,
    selected: Option<NodePath>,
}

impl TabManager {
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open: max_open.max(1),
            open: Vec::new(),
            selected: None,
        }
    }

    pub fn max_open(&self) -> usize {
        self.max_open
    }

    pub fn open_paths(&self) -> &[NodePath] {
        &self.open
    }

    pub fn selected(&self) -> Option<&NodePath> {
        self.selected.as_ref()
    }

    pub fn is_open(&self, path: &NodePath) -> bool {
        self.open.contains(path)
    }

    pub fn open_file(&mut self, tree: &TreeNode, path: &NodePath) -> OpenOutcome {
        let node = match tree.lookup(path) {
            Some(node) => node,
            None => {
                debug!("Ignoring open of unknown path {}", path);
                return OpenOutcome::Rejected(RejectReason::NotFound);
            }
        };
        if node.is_dir() {
            debug!("Ignoring open of directory {}", path);
            return OpenOutcome::Rejected(RejectReason::Directory);
        }
        if tree.resolve(path).map_or(false, |file| file.binary) {
            debug!("Ignoring open of binary file {}", path);
            return OpenOutcome::Rejected(RejectReason::Binary);
        }

        self.selected = Some(path.clone());
        if self.is_open(path) {
            return OpenOutcome::AlreadyOpen;
        }

        let evicted = if self.open.len() >= self.max_open {
            let oldest = self.open.remove(0);
            debug!("Tab limit {} reached, evicting {}", self.max_open, oldest);
            Some(oldest)
        } else {
            None
        };
        self.open.push(path.clone());
        debug!("Opened {} ({} of {} tabs)", path, self.open.len(), self.max_open);
        OpenOutcome::Opened { evicted }
    }

    /// Removes `path`. When it was active, the tab at `len - 2` of the
    /// pre-removal order takes over; if that slot held the closed tab itself,
    /// the last remaining tab does. This is not "the tab before the closed
    /// one": closing the first of three active tabs selects the second.
    pub fn close_file(&mut self, path: &NodePath) -> bool {
        let Some(index) = self.open.iter().position(|p| p == path) else {
            return false;
        };
        let was_selected = self.selected.as_ref() == Some(path);
        let fallback = if was_selected {
            let len = self.open.len();
            match len.checked_sub(2) {
                Some(slot) if slot != index => Some(self.open[slot].clone()),
                Some(_) => Some(self.open[len - 1].clone()),
                None => None,
            }
        } else {
            None
        };

        self.open.remove(index);
        if was_selected {
            self.selected = fallback;
        }
        debug!(
            "Closed {}, selection now {}",
            path,
            self.selected.as_ref().map_or("none", |p| p.as_str())
        );
        true
    }

    pub fn select_file(&mut self, path: &NodePath) -> bool {
        if !self.is_open(path) {
            debug!("Ignoring selection of unopened path {}", path);
            return false;
        }
        self.selected = Some(path.clone());
        true
    }
}
