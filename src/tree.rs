use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Icon, image and font formats. Such files can be resolved for metadata but
/// never opened into a tab.
const BINARY_EXTENSIONS: &[&str] = &[
    "ico", "png", "jpg", "jpeg", "gif", "bmp", "webp", "avif", "tif", "tiff", "woff", "woff2",
    "ttf", "otf", "eot",
];

/// Canonical identity of a node: `/`-joined names from the root, root included.
///
/// Parsing drops empty segments, so `proj/src`, `/proj/src` and `/proj//src/`
/// all name the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    pub fn parse(raw: &str) -> Self {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        Self::from_segments(&segments)
    }

    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.push_str(segment.as_ref());
        }
        NodePath(path)
    }

    /// Splits the path once into the segments that traversal compares by depth.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment, i.e. the node's own name.
    pub fn name(&self) -> Option<&str> {
        self.0.rsplit('/').find(|s| !s.is_empty())
    }

    pub fn join(&self, name: &str) -> NodePath {
        NodePath(format!("{}/{}", self.0, name))
    }

    /// Proper ancestors, root first.
    pub fn ancestors(&self) -> Vec<NodePath> {
        let segments = self.segments();
        (1..segments.len())
            .map(|depth| NodePath::from_segments(&segments[..depth]))
            .collect()
    }
}

impl From<String> for NodePath {
    fn from(raw: String) -> Self {
        NodePath::parse(&raw)
    }
}

impl From<&str> for NodePath {
    fn from(raw: &str) -> Self {
        NodePath::parse(raw)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file or directory of an immutable project snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, rename = "languageHint", skip_serializing_if = "Option::is_none")]
        language_hint: Option<String>,
    },
    #[serde(alias = "folder")]
    Directory {
        name: String,
        #[serde(default)]
        children: Vec<TreeNode>,
    },
}

/// What the viewer needs to display a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile<'a> {
    pub content: Option<&'a str>,
    pub language: Option<String>,
    pub binary: bool,
}

impl TreeNode {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        TreeNode::File {
            name: name.into(),
            content: Some(content.into()),
            language_hint: None,
        }
    }

    pub fn dir(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        TreeNode::Directory {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name, .. } | TreeNode::Directory { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Directory { children, .. } => children,
            TreeNode::File { .. } => &[],
        }
    }

    fn find_child(&self, name: &str) -> Option<&TreeNode> {
        self.children().iter().find(|child| child.name() == name)
    }

    /// Walks `path` segment by segment from this node, which must match the
    /// first segment.
    pub fn lookup(&self, path: &NodePath) -> Option<&TreeNode> {
        let segments = path.segments();
        let (first, rest) = segments.split_first()?;
        if *first != self.name() {
            return None;
        }
        let mut node = self;
        for segment in rest {
            node = node.find_child(segment)?;
        }
        Some(node)
    }

    /// Content and language of the file at `path`. Directories and unknown
    /// paths resolve to `None`.
    pub fn resolve(&self, path: &NodePath) -> Option<ResolvedFile<'_>> {
        match self.lookup(path)? {
            TreeNode::File {
                name,
                content,
                language_hint,
            } => Some(ResolvedFile {
                content: content.as_deref(),
                language: language_hint
                    .clone()
                    .or_else(|| language_for(name).map(str::to_string)),
                binary: is_binary(name),
            }),
            TreeNode::Directory { .. } => None,
        }
    }

    /// Children in display order. Computed on every call.
    pub fn sorted_children(&self) -> Vec<&TreeNode> {
        let mut children: Vec<&TreeNode> = self.children().iter().collect();
        children.sort_by(|a, b| compare_entries(a, b));
        children
    }

    /// Paths of every file below (and including) this node, depth first.
    pub fn file_paths(&self) -> Vec<NodePath> {
        fn collect(node: &TreeNode, parent: Option<&NodePath>, out: &mut Vec<NodePath>) {
            let path = match parent {
                Some(parent) => parent.join(node.name()),
                None => NodePath::from_segments(&[node.name()]),
            };
            match node {
                TreeNode::File { .. } => out.push(path),
                TreeNode::Directory { children, .. } => {
                    for child in children {
                        collect(child, Some(&path), out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(self, None, &mut out);
        out
    }

    /// Checks the naming invariants the path scheme relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.name().is_empty() {
            return Err("Node name must not be empty".to_string());
        }
        if self.name().contains('/') {
            return Err(format!("Node name contains '/': {}", self.name()));
        }
        let mut seen = HashSet::new();
        for child in self.children() {
            if !seen.insert(child.name()) {
                return Err(format!(
                    "Duplicate name '{}' under '{}'",
                    child.name(),
                    self.name()
                ));
            }
            child.validate()?;
        }
        Ok(())
    }
}

/// Directories before files, then natural name order ignoring case.
pub fn compare_entries(a: &TreeNode, b: &TreeNode) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| compare_names(a.name(), b.name()))
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    natord::compare_ignore_case(a, b)
        .then_with(|| natord::compare(a, b))
        .then_with(|| a.cmp(b))
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_binary(name: &str) -> bool {
    extension(name).map_or(false, |ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// Highlighting language guessed from a file name when the snapshot carries
/// no explicit hint.
pub fn language_for(name: &str) -> Option<&'static str> {
    match name {
        "Dockerfile" => return Some("dockerfile"),
        "Makefile" => return Some("makefile"),
        _ => {}
    }
    let language = match extension(name)?.as_str() {
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "rs" => "rust",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "rb" => "ruby",
        "json" => "json",
        "md" | "markdown" => "markdown",
        "css" => "css",
        "scss" => "scss",
        "html" | "htm" => "html",
        "xml" | "svg" => "xml",
        "toml" => "toml",
        "yml" | "yaml" => "yaml",
        "sh" | "bash" => "bash",
        "sql" => "sql",
        _ => return None,
    };
    Some(language)
}
