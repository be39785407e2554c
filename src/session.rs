use crate::path::NodePath;
use crate::prefs::Preferences;

/// Per-session state threaded through the shell loop.
///
/// The session holds the current location (a path into the tree, never a
/// reference to a node), the lines entered so far and the exit flag. Only the
/// shell loop changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current: NodePath,
    history: Vec<String>,
    should_exit: bool,
}

impl Session {
    /// A fresh session located at the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the current node. It may be stale for a moment if a
    /// handler deleted the node; the shell moves up before the next line.
    pub fn current(&self) -> &NodePath {
        &self.current
    }

    pub(crate) fn set_current(&mut self, path: NodePath) {
        if path != self.current {
            log::debug!("current node {} -> {}", self.current, path);
        }
        self.current = path;
    }

    /// Move to `path` and record it in the navigation history.
    pub(crate) fn navigate(&mut self, path: NodePath, prefs: &mut Preferences) {
        prefs.record_path(&path);
        self.set_current(path);
    }

    /// Input lines in the order they were entered.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub(crate) fn push_history(&mut self, line: &str) {
        self.history.push(line.to_string());
    }

    /// Set once `exit` ran or the input ended.
    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    pub(crate) fn request_exit(&mut self) {
        self.should_exit = true;
    }
}
