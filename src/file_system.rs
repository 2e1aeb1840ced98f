use crate::tree::{is_binary, TreeNode};
use anyhow::{anyhow, bail, Context, Result};
use ignore::WalkBuilder;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn validate_path(requested_path: &Path) -> Result<PathBuf> {
    if !requested_path.exists() {
        bail!("Path does not exist: {}", requested_path.display());
    }
    requested_path
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", requested_path.display()))
}

/// Builds the immutable snapshot served to every session, either from a JSON
/// description or by walking a directory.
pub fn load_snapshot(requested_path: &Path) -> Result<TreeNode> {
    let start_time = Instant::now();
    let path = validate_path(requested_path)?;
    info!("Loading snapshot from {}", path.display());

    let tree = if path.is_file() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
        serde_json::from_str::<TreeNode>(&raw)
            .with_context(|| format!("Invalid snapshot JSON in {}", path.display()))?
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string());
        TreeNode::Directory {
            name,
            children: build_tree(&path)?,
        }
    };
    tree.validate()
        .map_err(|e| anyhow!("Invalid snapshot {}: {}", path.display(), e))?;

    info!(
        "Loaded snapshot '{}' with {} files in {:.2?}.",
        tree.name(),
        tree.file_paths().len(),
        start_time.elapsed()
    );
    Ok(tree)
}

/// Walks `root` without following directory symlinks, honouring every
/// `.gitignore` on the way down. Parents are yielded before their children.
pub fn build_tree(root: &Path) -> Result<Vec<TreeNode>> {
    debug!("Building snapshot for directory: {}", root.display());
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut nodes = Vec::new();
    for entry in walker {
        let entry = entry.context("Failed to walk directory")?;
        if entry.depth() == 0 {
            continue;
        }
        let entry_path = entry.path();
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let node = if file_type.is_dir() {
            TreeNode::Directory {
                name,
                children: Vec::new(),
            }
        } else if file_type.is_file() || (file_type.is_symlink() && entry_path.is_file()) {
            let content = if is_binary(&name) {
                None
            } else {
                fs::read_to_string(entry_path).ok()
            };
            if content.is_none() {
                debug!("Keeping {} without content", entry_path.display());
            }
            TreeNode::File {
                name,
                content,
                language_hint: None,
            }
        } else {
            debug!("Skipping symlink {}", entry_path.display());
            continue;
        };

        let relative = entry_path
            .strip_prefix(root)
            .with_context(|| format!("{} escaped the snapshot root", entry_path.display()))?;
        let parents: Vec<String> = relative
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        insert_node(&mut nodes, &parents, node)
            .with_context(|| format!("No parent directory for {}", entry_path.display()))?;
    }
    Ok(nodes)
}

fn insert_node(siblings: &mut Vec<TreeNode>, parents: &[String], node: TreeNode) -> Option<()> {
    let Some((first, rest)) = parents.split_first() else {
        siblings.push(node);
        return Some(());
    };
    match siblings.iter_mut().find(|n| n.is_dir() && n.name() == first)? {
        TreeNode::Directory { children, .. } => insert_node(children, rest, node),
        TreeNode::File { .. } => None,
    }
}
