//! One explorer session: an immutable snapshot plus the state derived from it.
//!
//! Every intent from the shell goes through [`Explorer::apply`], which hands
//! it to exactly one of the tree, tab or search components and reports the
//! events the shell has to act on.

use crate::config::ExplorerConfig;
use crate::search::SearchEngine;
use crate::tabs::{OpenOutcome, TabManager};
use crate::tree::{NodePath, TreeNode};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A user action raised by the presentation shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "intent", rename_all = "camelCase")]
pub enum Intent {
    ExpandToggle { path: NodePath },
    OpenFile { path: NodePath },
    CloseFile { path: NodePath },
    SelectFile { path: NodePath },
    Search { query: String },
    SearchNext,
    SearchPrevious,
    ClearSearch,
    CopyToClipboard { text: String },
    LineClicked { line: usize },
}

/// Something the shell must do in response to an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ShellEvent {
    /// Scroll to and emphasise this 1-based line.
    RevealLine { line: usize },
    CopyToClipboard { text: String },
    LineClicked { path: Option<NodePath>, line: usize },
}

/// Which directories are expanded. Only overrides of the defaults are stored.
#[derive(Debug, Clone)]
pub struct Expansion {
    root_expanded: bool,
    nested_expanded: bool,
    overrides: HashMap<NodePath, bool>,
}

impl Expansion {
    pub fn new(default_open: bool, default_collapsed: bool) -> Self {
        Self {
            root_expanded: default_open,
            nested_expanded: !default_collapsed,
            overrides: HashMap::new(),
        }
    }

    pub fn is_expanded(&self, path: &NodePath) -> bool {
        if let Some(expanded) = self.overrides.get(path) {
            return *expanded;
        }
        if path.segments().len() <= 1 {
            self.root_expanded
        } else {
            self.nested_expanded
        }
    }

    pub fn toggle(&mut self, path: &NodePath) -> bool {
        let expanded = !self.is_expanded(path);
        self.overrides.insert(path.clone(), expanded);
        expanded
    }

    pub fn expand(&mut self, path: &NodePath) {
        self.overrides.insert(path.clone(), true);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    pub name: String,
    pub path: NodePath,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    /// Sorted children; present only for expanded directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeView>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub path: NodePath,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFile {
    pub path: NodePath,
    pub content: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub query: String,
    pub matches: Vec<usize>,
    /// Index into `matches`, or -1 when there is no active match.
    pub cursor: i64,
    pub highlighted_line: Option<usize>,
}

/// Everything the shell needs to render one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub tree: TreeView,
    pub tabs: Vec<TabView>,
    pub selected: Option<NodePath>,
    pub active_file: Option<ActiveFile>,
    pub search: SearchView,
}

pub struct Explorer {
    root: Arc<TreeNode>,
    expansion: Expansion,
    tabs: TabManager,
    search: SearchEngine,
}

fn buffer_for<'a>(root: &'a TreeNode, selected: Option<&NodePath>) -> &'a str {
    selected
        .and_then(|path| root.resolve(path))
        .and_then(|file| file.content)
        .unwrap_or("")
}

impl Explorer {
    pub fn new(root: Arc<TreeNode>, config: &ExplorerConfig) -> Self {
        if config.max_open == 0 {
            warn!("max_open must be at least 1, using 1");
        }
        let mut explorer = Self {
            root,
            expansion: Expansion::new(config.default_open, config.default_collapsed),
            tabs: TabManager::new(config.max_open),
            search: SearchEngine::new(),
        };

        if let Some(raw) = &config.default_selected_path {
            let path = NodePath::parse(raw);
            match explorer.tabs.open_file(&explorer.root, &path) {
                OpenOutcome::Opened { .. } | OpenOutcome::AlreadyOpen => {
                    for ancestor in path.ancestors() {
                        explorer.expansion.expand(&ancestor);
                    }
                    debug!("Opened default selection {}", path);
                }
                OpenOutcome::Rejected(reason) => {
                    warn!("Default selected path {} not opened: {:?}", path, reason);
                }
            }
        }
        explorer
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }

    pub fn apply(&mut self, intent: Intent) -> Vec<ShellEvent> {
        debug!("Applying intent {:?}", intent);
        let mut events = Vec::new();
        match intent {
            Intent::ExpandToggle { path } => {
                if self.root.lookup(&path).map_or(false, TreeNode::is_dir) {
                    let expanded = self.expansion.toggle(&path);
                    debug!("{} {}", if expanded { "Expanded" } else { "Collapsed" }, path);
                } else {
                    debug!("Ignoring expand toggle on non-directory {}", path);
                }
            }
            Intent::OpenFile { path } => {
                let before = self.tabs.selected().cloned();
                if let OpenOutcome::Opened {
                    evicted: Some(evicted),
                } = self.tabs.open_file(&self.root, &path)
                {
                    info!("Evicted {} to make room for {}", evicted, path);
                }
                self.sync_search(before, &mut events);
            }
            Intent::CloseFile { path } => {
                let before = self.tabs.selected().cloned();
                self.tabs.close_file(&path);
                self.sync_search(before, &mut events);
            }
            Intent::SelectFile { path } => {
                let before = self.tabs.selected().cloned();
                self.tabs.select_file(&path);
                self.sync_search(before, &mut events);
            }
            Intent::Search { query } => {
                let buffer = buffer_for(&self.root, self.tabs.selected());
                let line = self.search.set_query(buffer, &query);
                push_reveal(line, &mut events);
            }
            Intent::SearchNext => push_reveal(self.search.next(), &mut events),
            Intent::SearchPrevious => push_reveal(self.search.previous(), &mut events),
            Intent::ClearSearch => self.search.clear(),
            Intent::CopyToClipboard { text } => events.push(ShellEvent::CopyToClipboard { text }),
            Intent::LineClicked { line } => events.push(ShellEvent::LineClicked {
                path: self.tabs.selected().cloned(),
                line,
            }),
        }
        events
    }

    /// Re-runs the current query when the displayed buffer changed.
    fn sync_search(&mut self, before: Option<NodePath>, events: &mut Vec<ShellEvent>) {
        if self.tabs.selected() == before.as_ref() {
            return;
        }
        let buffer = buffer_for(&self.root, self.tabs.selected());
        let line = self.search.refresh(buffer);
        push_reveal(line, events);
    }

    pub fn active_file(&self) -> Option<ActiveFile> {
        let path = self.tabs.selected()?;
        let file = self.root.resolve(path)?;
        Some(ActiveFile {
            path: path.clone(),
            content: file.content.unwrap_or_default().to_string(),
            language: file.language,
        })
    }

    pub fn view(&self) -> ViewModel {
        let selected = self.tabs.selected();
        let root_path = NodePath::from_segments(&[self.root.name()]);
        ViewModel {
            tree: self.tree_view(&self.root, root_path),
            tabs: self
                .tabs
                .open_paths()
                .iter()
                .map(|path| TabView {
                    path: path.clone(),
                    name: path.name().unwrap_or_default().to_string(),
                    active: Some(path) == selected,
                })
                .collect(),
            selected: selected.cloned(),
            active_file: self.active_file(),
            search: SearchView {
                query: self.search.query().to_string(),
                matches: self.search.matches().to_vec(),
                cursor: self.search.cursor().map_or(-1, |i| i as i64),
                highlighted_line: self.search.highlighted_line(),
            },
        }
    }

    fn tree_view(&self, node: &TreeNode, path: NodePath) -> TreeView {
        match node {
            TreeNode::File { name, .. } => TreeView {
                name: name.clone(),
                path,
                kind: "file",
                expanded: None,
                children: None,
            },
            TreeNode::Directory { name, .. } => {
                let expanded = self.expansion.is_expanded(&path);
                let children = expanded.then(|| {
                    node.sorted_children()
                        .into_iter()
                        .map(|child| self.tree_view(child, path.join(child.name())))
                        .collect()
                });
                TreeView {
                    name: name.clone(),
                    path,
                    kind: "directory",
                    expanded: Some(expanded),
                    children,
                }
            }
        }
    }
}

fn push_reveal(line: Option<usize>, events: &mut Vec<ShellEvent>) {
    if let Some(line) = line {
        events.push(ShellEvent::RevealLine { line });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn p(raw: &str) -> NodePath {
        NodePath::parse(raw)
    }

    fn open(path: &str) -> Intent {
        Intent::OpenFile { path: p(path) }
    }

    #[fixture]
    fn root() -> Arc<TreeNode> {
        Arc::new(TreeNode::dir(
            "proj",
            vec![
                TreeNode::dir(
                    "src",
                    vec![
                        TreeNode::file("a.ts", "x\ny\nfoo\n"),
                        TreeNode::file("b.ts", "foo\nbar\n"),
                        TreeNode::dir("util", vec![TreeNode::file("c.ts", "Foo\nfoo\n")]),
                    ],
                ),
                TreeNode::file("icon.png", ""),
                TreeNode::file("README.md", "read me\n"),
            ],
        ))
    }

    fn config(max_open: usize) -> ExplorerConfig {
        ExplorerConfig {
            max_open,
            ..ExplorerConfig::default()
        }
    }

    #[rstest]
    fn single_tab_walkthrough(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(1));

        explorer.apply(open("/proj/src/a.ts"));
        assert_eq!(explorer.tabs().open_paths(), &[p("/proj/src/a.ts")]);
        assert_eq!(explorer.tabs().selected(), Some(&p("/proj/src/a.ts")));

        explorer.apply(open("/proj/src/b.ts"));
        assert_eq!(explorer.tabs().open_paths(), &[p("/proj/src/b.ts")]);
        assert_eq!(explorer.tabs().selected(), Some(&p("/proj/src/b.ts")));

        let events = explorer.apply(Intent::Search {
            query: "foo".to_string(),
        });
        assert_eq!(events, vec![ShellEvent::RevealLine { line: 1 }]);
        assert_eq!(explorer.search().matches(), &[1]);
        assert_eq!(explorer.search().cursor(), Some(0));

        explorer.apply(Intent::SearchNext);
        assert_eq!(explorer.search().cursor(), Some(0));
    }

    #[rstest]
    fn switching_tabs_reruns_query(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/a.ts"));
        explorer.apply(open("/proj/src/util/c.ts"));
        explorer.apply(Intent::Search {
            query: "foo".to_string(),
        });
        assert_eq!(explorer.search().matches(), &[1, 2]);
        explorer.apply(Intent::SearchNext);
        assert_eq!(explorer.search().cursor(), Some(1));

        let events = explorer.apply(Intent::SelectFile {
            path: p("/proj/src/a.ts"),
        });
        assert_eq!(events, vec![ShellEvent::RevealLine { line: 3 }]);
        assert_eq!(explorer.search().matches(), &[3]);
        assert_eq!(explorer.search().cursor(), Some(0));
    }

    #[rstest]
    fn reselecting_same_tab_keeps_cursor(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/util/c.ts"));
        explorer.apply(Intent::Search {
            query: "foo".to_string(),
        });
        explorer.apply(Intent::SearchNext);
        let events = explorer.apply(open("/proj/src/util/c.ts"));
        assert!(events.is_empty());
        assert_eq!(explorer.search().cursor(), Some(1));
    }

    #[rstest]
    fn closing_last_tab_empties_search(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/b.ts"));
        explorer.apply(Intent::Search {
            query: "bar".to_string(),
        });
        explorer.apply(Intent::CloseFile {
            path: p("/proj/src/b.ts"),
        });
        let view = explorer.view();
        assert!(view.selected.is_none());
        assert!(view.active_file.is_none());
        assert_eq!(view.search.query, "bar");
        assert!(view.search.matches.is_empty());
        assert_eq!(view.search.cursor, -1);
    }

    #[rstest]
    #[case(open("/proj/src"))]
    #[case(open("/proj/icon.png"))]
    #[case(open("/proj/missing.ts"))]
    #[case(Intent::SelectFile { path: p("/proj/README.md") })]
    #[case(Intent::CloseFile { path: p("/proj/README.md") })]
    fn invalid_intents_leave_state_alone(root: Arc<TreeNode>, #[case] intent: Intent) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/a.ts"));
        let before = explorer.view();
        assert!(explorer.apply(intent).is_empty());
        assert_eq!(explorer.view(), before);
    }

    #[rstest]
    fn search_without_open_tab_is_empty(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        let events = explorer.apply(Intent::Search {
            query: "foo".to_string(),
        });
        assert!(events.is_empty());
        assert_eq!(explorer.view().search.cursor, -1);
        assert!(explorer.apply(Intent::SearchPrevious).is_empty());
    }

    #[rstest]
    fn clear_search_resets_state(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/a.ts"));
        explorer.apply(Intent::Search {
            query: "y".to_string(),
        });
        explorer.apply(Intent::ClearSearch);
        let search = explorer.view().search;
        assert_eq!(search.query, "");
        assert!(search.matches.is_empty());
        assert_eq!(search.cursor, -1);
        assert_eq!(search.highlighted_line, None);
    }

    #[rstest]
    fn pass_through_events(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/README.md"));
        let events = explorer.apply(Intent::CopyToClipboard {
            text: "read me".to_string(),
        });
        assert_eq!(
            events,
            vec![ShellEvent::CopyToClipboard {
                text: "read me".to_string()
            }]
        );
        let events = explorer.apply(Intent::LineClicked { line: 7 });
        assert_eq!(
            events,
            vec![ShellEvent::LineClicked {
                path: Some(p("/proj/README.md")),
                line: 7
            }]
        );
    }

    #[rstest]
    fn view_lists_sorted_tree_and_tabs(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        explorer.apply(open("/proj/src/b.ts"));
        explorer.apply(open("/proj/README.md"));
        let view = explorer.view();

        let top: Vec<&str> = view
            .tree
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(top, vec!["src", "icon.png", "README.md"]);

        let tabs: Vec<(&str, bool)> = view.tabs.iter().map(|t| (t.name.as_str(), t.active)).collect();
        assert_eq!(tabs, vec![("b.ts", false), ("README.md", true)]);

        let active = view.active_file.unwrap();
        assert_eq!(active.content, "read me\n");
        assert_eq!(active.language.as_deref(), Some("markdown"));
    }

    #[rstest]
    fn expand_toggle_flips_directories_only(root: Arc<TreeNode>) {
        let mut explorer = Explorer::new(root, &config(5));
        let src = p("/proj/src");
        assert!(explorer.expansion().is_expanded(&src));
        explorer.apply(Intent::ExpandToggle { path: src.clone() });
        assert!(!explorer.expansion().is_expanded(&src));
        let src_view = explorer.view().tree.children.unwrap().remove(0);
        assert_eq!(src_view.expanded, Some(false));
        assert!(src_view.children.is_none());

        explorer.apply(Intent::ExpandToggle { path: src.clone() });
        assert!(explorer.expansion().is_expanded(&src));

        let readme = p("/proj/README.md");
        explorer.apply(Intent::ExpandToggle {
            path: readme.clone(),
        });
        assert!(!explorer.expansion.overrides.contains_key(&readme));
    }

    #[rstest]
    fn collapsed_defaults(root: Arc<TreeNode>) {
        let explorer = Explorer::new(
            root,
            &ExplorerConfig {
                default_open: false,
                default_collapsed: true,
                ..ExplorerConfig::default()
            },
        );
        let view = explorer.view();
        assert_eq!(view.tree.expanded, Some(false));
        assert!(view.tree.children.is_none());
        assert!(!explorer.expansion().is_expanded(&p("/proj/src")));
    }

    #[rstest]
    fn default_selection_opens_and_reveals(root: Arc<TreeNode>) {
        let explorer = Explorer::new(
            root,
            &ExplorerConfig {
                default_selected_path: Some("proj/src/util/c.ts".to_string()),
                default_open: false,
                default_collapsed: true,
                ..ExplorerConfig::default()
            },
        );
        assert_eq!(explorer.tabs().selected(), Some(&p("/proj/src/util/c.ts")));
        for dir in ["/proj", "/proj/src", "/proj/src/util"] {
            assert!(explorer.expansion().is_expanded(&p(dir)), "{} collapsed", dir);
        }
    }

    #[rstest]
    fn default_selection_of_directory_is_ignored(root: Arc<TreeNode>) {
        let explorer = Explorer::new(
            root,
            &ExplorerConfig {
                default_selected_path: Some("/proj/src".to_string()),
                ..ExplorerConfig::default()
            },
        );
        assert!(explorer.tabs().open_paths().is_empty());
        assert!(explorer.tabs().selected().is_none());
    }

    #[test]
    fn intents_deserialize_from_shell_json() {
        let intent: Intent =
            serde_json::from_str(r#"{"intent":"openFile","path":"proj/src/a.ts"}"#).unwrap();
        assert_eq!(intent, open("/proj/src/a.ts"));
        let intent: Intent = serde_json::from_str(r#"{"intent":"searchNext"}"#).unwrap();
        assert_eq!(intent, Intent::SearchNext);
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(ShellEvent::RevealLine { line: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "revealLine", "line": 4}));
    }
}
