//! Text rendering of trees and prompts.

use crate::node::{Node, Summary};
use crate::path::NodePath;
use crate::prefs::Preferences;

/// Width tree lines are padded to.
pub const CONSOLE_WIDTH: usize = 80;

const NODE_SHIFT: usize = 2;

/// How `ls` draws a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStyle {
    pub round_nodes: bool,
    pub status_mode: bool,
    pub show_root: bool,
    /// Levels below the listed node to show; `None` is unlimited.
    pub max_depth: Option<usize>,
    pub width: usize,
}

impl TreeStyle {
    /// Style from the preferences. A positive `depth` overrides `tree_max_depth`.
    pub fn from_prefs(prefs: &Preferences, depth: i64) -> Self {
        let depth = if depth > 0 { depth } else { prefs.tree_max_depth };
        Self {
            round_nodes: prefs.tree_round_nodes,
            status_mode: prefs.tree_status_mode,
            show_root: prefs.tree_show_root,
            max_depth: usize::try_from(depth).ok().filter(|d| *d > 0),
            width: CONSOLE_WIDTH,
        }
    }
}

impl Default for TreeStyle {
    fn default() -> Self {
        Self::from_prefs(&Preferences::default(), 0)
    }
}

/// Text shown between brackets after a node name.
pub fn summary_text(summary: &Summary) -> String {
    if !summary.description.is_empty() {
        return summary.description.clone();
    }
    match summary.healthy {
        Some(true) => "OK".to_string(),
        Some(false) => "ERROR".to_string(),
        None => "...".to_string(),
    }
}

/// Draw `root` and its descendants, children sorted by name.
pub fn render_tree(root: &Node, style: &TreeStyle) -> String {
    let mut lines = Vec::new();
    if style.show_root {
        render_node(root, style, &mut vec![false], style.max_depth, &mut lines);
    } else {
        for child in sorted_children(root) {
            render_node(child, style, &mut vec![false], style.max_depth, &mut lines);
        }
    }
    lines.join("\n")
}

fn sorted_children(node: &Node) -> Vec<&Node> {
    let mut children: Vec<&Node> = node.children().iter().collect();
    children.sort_by(|a, b| a.name().cmp(b.name()));
    children
}

/// `margin` holds, per ancestor level, whether a vertical bar continues there.
/// Its last entry belongs to `node` itself and is not drawn.
fn render_node(node: &Node, style: &TreeStyle, margin: &mut Vec<bool>, depth: Option<usize>, lines: &mut Vec<String>) {
    let mut line = String::new();
    for pipe in margin.iter().take(margin.len().saturating_sub(1)) {
        let cell = if *pipe { "|" } else { "" };
        line.push_str(&format!("{:<width$}", cell, width = NODE_SHIFT));
    }
    line.push_str(if style.round_nodes { "o- " } else { "+- " });
    let margin_len = line.chars().count();

    line.push_str(node.name());
    if style.status_mode {
        let description = summary_text(&node.summary());
        let used = 1 + margin_len + node.name().chars().count() + description.chars().count() + 3;
        let pad = ".".repeat(style.width.saturating_sub(used));
        line.push_str(&format!(" {} [{}]", pad, description));
    }
    lines.push(line);

    if depth == Some(0) {
        return;
    }
    let children = sorted_children(node);
    let last = children.len().saturating_sub(1);
    for (i, child) in children.into_iter().enumerate() {
        margin.push(i < last);
        render_node(child, style, margin, depth.map(|d| d - 1), lines);
        margin.pop();
    }
}

/// The prompt for `path`, eliding the middle of long paths.
pub fn prompt(path: &NodePath, max_len: i64) -> String {
    let text = path.to_string();
    let chars: Vec<char> = text.chars().collect();
    let limit = usize::try_from(max_len).unwrap_or(0);
    if limit == 0 || chars.len() <= limit {
        return format!("{}> ", text);
    }
    let half = limit.saturating_sub(3) / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{}...{}> ", head, tail)
}
