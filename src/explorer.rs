use std::collections::HashSet;

use crate::message::FileCollection;

/// One node of the file tree derived from a [`FileCollection`].
/// Sibling order is first-encounter order while building, never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File { name: String },
    Folder { name: String, children: Vec<TreeNode> },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name } => name,
            TreeNode::Folder { name, .. } => name,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }
}

/// Build the display tree for a flat path→content mapping.
///
/// Iterates the mapping in its native (insertion) order, creating folder
/// nodes for every segment but the last and a file leaf for the last.
/// Empty keys and empty segments are skipped. When a file and a folder
/// collide on the same name at the same level, the folder wins: a file
/// leaf is promoted to a folder when a deeper path needs it, and a file
/// whose name matches an existing folder is dropped from the tree (its
/// content stays addressable through the collection itself).
pub fn build_tree(files: &FileCollection) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    for path in files.keys() {
        insert_path(&mut roots, path);
    }
    roots
}

fn insert_path(roots: &mut Vec<TreeNode>, path: &str) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    insert_segments(roots, &segments);
}

fn insert_segments(level: &mut Vec<TreeNode>, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        // Duplicate names at a level (including a folder of the same name)
        // are skipped rather than doubled.
        if !level.iter().any(|n| n.name() == *first) {
            level.push(TreeNode::File {
                name: first.to_string(),
            });
        }
        return;
    }

    let idx = match level.iter().position(|n| n.name() == *first) {
        Some(i) => i,
        None => {
            level.push(TreeNode::Folder {
                name: first.to_string(),
                children: Vec::new(),
            });
            level.len() - 1
        }
    };
    if let TreeNode::File { name } = &level[idx] {
        let name = name.clone();
        level[idx] = TreeNode::Folder {
            name,
            children: Vec::new(),
        };
    }
    if let TreeNode::Folder { children, .. } = &mut level[idx] {
        insert_segments(children, rest);
    }
}

/// Collect every file leaf's full path, in display order.
pub fn leaf_paths(nodes: &[TreeNode]) -> Vec<String> {
    fn walk(nodes: &[TreeNode], prefix: &str, out: &mut Vec<String>) {
        for node in nodes {
            let full = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}/{}", node.name())
            };
            match node {
                TreeNode::File { .. } => out.push(full),
                TreeNode::Folder { children, .. } => walk(children, &full, out),
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, "", &mut out);
    out
}

// ── Breadcrumbs ────────────────────────────────────────────────────

/// One entry of a breadcrumb trail for a selected path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub name: String,
    pub path: String,
    pub is_last: bool,
}

/// Derive the breadcrumb trail for a path: a synthetic root entry followed
/// by one entry per non-empty segment, each carrying the cumulative path.
/// Only the final appended entry is marked `is_last`.
pub fn breadcrumbs_for(path: &str) -> Vec<Crumb> {
    let mut crumbs = vec![Crumb {
        name: "Root".to_string(),
        path: String::new(),
        is_last: false,
    }];

    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if current.is_empty() {
            current.push_str(segment);
        } else {
            current.push('/');
            current.push_str(segment);
        }
        crumbs.push(Crumb {
            name: segment.to_string(),
            path: current.clone(),
            is_last: false,
        });
    }

    if crumbs.len() > 1 {
        if let Some(last) = crumbs.last_mut() {
            last.is_last = true;
        }
    }
    crumbs
}

// ── Explorer state ─────────────────────────────────────────────────

/// A row of the flattened tree as shown in the explorer pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub name: String,
    /// Full slash-joined path of this node.
    pub path: String,
    pub depth: usize,
    pub is_folder: bool,
    pub collapsed: bool,
    /// Last sibling at its level; drives the branch-guide glyph.
    pub is_last: bool,
}

/// Selection and navigation state for the code explorer.
///
/// The selection contract: `select` only changes state when the path is a
/// real key of the current collection, so breadcrumb links that point at
/// folders fall through harmlessly.
#[derive(Debug, Default)]
pub struct ExplorerState {
    tree: Vec<TreeNode>,
    rows: Vec<TreeRow>,
    collapsed: HashSet<String>,
    selected: Option<String>,
    pub cursor: usize,
}

impl ExplorerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh file set: rebuild the tree, collapse folders below
    /// the top level, and select the first file key (the explorer's mount
    /// behavior).
    pub fn set_files(&mut self, files: &FileCollection) {
        self.tree = build_tree(files);
        self.collapsed = folders_below_top_level(&self.tree);
        self.selected = files.keys().next().cloned();
        self.cursor = 0;
        self.rebuild_rows();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    /// Select `path` if and only if it names a file in `files`.
    pub fn select(&mut self, path: &str, files: &FileCollection) {
        if files.contains_key(path) {
            self.selected = Some(path.to_string());
        }
    }

    pub fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    /// Act on the row under the cursor: toggle a folder, or select a file.
    pub fn activate_cursor(&mut self, files: &FileCollection) {
        let Some(row) = self.rows.get(self.cursor) else {
            return;
        };
        if row.is_folder {
            let path = row.path.clone();
            self.toggle_folder(&path);
        } else {
            let path = row.path.clone();
            self.select(&path, files);
        }
    }

    /// Collapse the folder under the cursor (or the cursor's parent folder).
    pub fn collapse_cursor(&mut self) {
        let Some(row) = self.rows.get(self.cursor) else {
            return;
        };
        if row.is_folder && !row.collapsed {
            let path = row.path.clone();
            self.toggle_folder(&path);
        } else if let Some(parent) = row.path.rfind('/').map(|i| row.path[..i].to_string()) {
            if let Some(idx) = self.rows.iter().position(|r| r.path == parent) {
                self.cursor = idx;
            }
        }
    }

    pub fn toggle_folder(&mut self, path: &str) {
        if !self.collapsed.remove(path) {
            self.collapsed.insert(path.to_string());
        }
        self.rebuild_rows();
        if self.cursor >= self.rows.len() {
            self.cursor = self.rows.len().saturating_sub(1);
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows = flatten(&self.tree, &self.collapsed);
    }
}

fn folders_below_top_level(nodes: &[TreeNode]) -> HashSet<String> {
    fn walk(nodes: &[TreeNode], prefix: &str, depth: usize, out: &mut HashSet<String>) {
        for node in nodes {
            if let TreeNode::Folder { name, children } = node {
                let full = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                if depth > 0 {
                    out.insert(full.clone());
                }
                walk(children, &full, depth + 1, out);
            }
        }
    }
    let mut out = HashSet::new();
    walk(nodes, "", 0, &mut out);
    out
}

fn flatten(nodes: &[TreeNode], collapsed: &HashSet<String>) -> Vec<TreeRow> {
    fn walk(nodes: &[TreeNode], prefix: &str, depth: usize, collapsed: &HashSet<String>, out: &mut Vec<TreeRow>) {
        for (idx, node) in nodes.iter().enumerate() {
            let full = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{prefix}/{}", node.name())
            };
            let is_last = idx + 1 == nodes.len();
            match node {
                TreeNode::File { name } => out.push(TreeRow {
                    name: name.clone(),
                    path: full,
                    depth,
                    is_folder: false,
                    collapsed: false,
                    is_last,
                }),
                TreeNode::Folder { name, children } => {
                    let is_collapsed = collapsed.contains(&full);
                    out.push(TreeRow {
                        name: name.clone(),
                        path: full.clone(),
                        depth,
                        is_folder: true,
                        collapsed: is_collapsed,
                        is_last,
                    });
                    if !is_collapsed {
                        walk(children, &full, depth + 1, collapsed, out);
                    }
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(nodes, "", 0, collapsed, &mut out);
    out
}
