//! Addressing nodes in the configuration tree.
//!
//! A [`NodePath`] is an absolute, normalized location: the sequence of child
//! names from the root to a node. Input paths typed by the user are resolved
//! against a base location with [`resolve`], which walks the tree one segment
//! at a time so that every named segment has to exist.

use crate::error::{Result, ShellError};
use crate::node::Node;
use std::collections::BTreeMap;
use std::fmt;

pub const SEPARATOR: char = '/';
pub const CURRENT: &str = ".";
pub const PARENT: &str = "..";
/// Suffix addressing every child of a path instead of the path itself: `storage*`.
pub const ALL_CHILDREN: char = '*';

/// Absolute location of a node, as names from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The location of the root node, displayed as `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an already canonical absolute path such as `/a/b`.
    ///
    /// Used for stored locations (bookmarks, path history). `.` and `..` are
    /// not accepted here.
    pub fn parse_absolute(text: &str) -> Result<Self> {
        if !text.starts_with(SEPARATOR) {
            return Err(ShellError::invalid_path(text, "not an absolute path"));
        }
        let mut segments = Vec::new();
        for segment in text.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == CURRENT || segment == PARENT {
                return Err(ShellError::invalid_path(text, "not a canonical path"));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Child names from the root down to the addressed node.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this addresses the root node.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of levels below the root; 0 for the root itself.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Name of the addressed node; `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Location one level up, or `None` at the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self { segments })
        }
    }

    /// Location of the child `name` below this one. Existence is not checked.
    pub fn child(&self, name: &str) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "{}", SEPARATOR);
        }
        for segment in &self.segments {
            write!(f, "{}{}", SEPARATOR, segment)?;
        }
        Ok(())
    }
}

/// Whether `text` syntactically looks like navigation rather than a word.
///
/// True for absolute paths, `.`/`..` and anything starting with them, bookmark
/// references and any token containing a separator.
pub fn is_path_like(text: &str) -> bool {
    text == CURRENT
        || text == PARENT
        || text.starts_with(SEPARATOR)
        || text.starts_with("./")
        || text.starts_with("../")
        || text.starts_with('@')
        || text.contains(SEPARATOR)
}

/// Split the all-children suffix off a path word.
///
/// # Arguments
///
/// * `text` - a path word as typed, e.g. `storage*`, `../*` or `*`.
///
/// # Returns
///
/// The path without the suffix (`.` when nothing else is left) and whether
/// the suffix was present.
pub fn strip_all_children(text: &str) -> (&str, bool) {
    match text.strip_suffix(ALL_CHILDREN) {
        Some("") => (CURRENT, true),
        Some(rest) => (rest, true),
        None => (text, false),
    }
}

/// Resolve `input` against `base` in the tree rooted at `root`.
///
/// Absolute inputs ignore `base`. Empty segments and `.` are skipped, `..`
/// ascends one level and fails with `InvalidPath` at the root. Every named
/// segment must be an existing child (exact, case-sensitive match).
pub fn resolve(root: &Node, base: &NodePath, input: &str) -> Result<NodePath> {
    let mut stack: Vec<&Node> = vec![root];
    let mut path = NodePath::root();

    if !input.starts_with(SEPARATOR) {
        for segment in base.segments() {
            let current = stack[stack.len() - 1];
            let next = current.child(segment).ok_or_else(|| ShellError::PathNotFound {
                path: path.child(segment).to_string(),
            })?;
            stack.push(next);
            path.segments.push(segment.clone());
        }
    }

    for segment in input.split(SEPARATOR) {
        match segment {
            "" | CURRENT => {}
            PARENT => {
                if path.is_root() {
                    return Err(ShellError::invalid_path(input, "cannot go above the root node"));
                }
                stack.pop();
                path.segments.pop();
            }
            name => {
                let current = stack[stack.len() - 1];
                let next = current.child(name).ok_or_else(|| ShellError::PathNotFound {
                    path: path.child(name).to_string(),
                })?;
                stack.push(next);
                path.segments.push(name.to_string());
            }
        }
    }

    log::debug!("resolved '{}' from {} to {}", input, base, path);
    Ok(path)
}

/// Like [`resolve`], but a leading `@name` segment starts from the
/// bookmarked location `name`.
pub fn resolve_bookmarked(
    root: &Node,
    base: &NodePath,
    input: &str,
    bookmarks: &BTreeMap<String, String>,
) -> Result<NodePath> {
    let Some(reference) = input.strip_prefix('@') else {
        return resolve(root, base, input);
    };
    let (name, rest) = reference.split_once(SEPARATOR).unwrap_or((reference, ""));
    let target = bookmarks
        .get(name)
        .ok_or_else(|| ShellError::BookmarkNotFound(name.to_string()))?;
    let start = NodePath::parse_absolute(target)?;
    root.node_at(&start)?;
    resolve(root, &start, rest)
}
