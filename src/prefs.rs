//! Persisted shell preferences: the `global` configuration group, bookmarks
//! and the navigation history.
//!
//! Preferences live in `prefs.toml` inside an optional preferences directory.
//! A missing or unreadable file is never fatal: the shell starts from the
//! defaults and logs a warning.

use crate::error::{Result, ShellError};
use crate::path::NodePath;
use crate::value::{ParamSpec, ParamType, Value};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const PREFS_FILE: &str = "prefs.toml";
pub const HISTORY_FILE: &str = "history.txt";
/// Name of the preferences group for `get`/`set`.
pub const GLOBAL_GROUP: &str = "global";

const MAX_PATH_HISTORY: usize = 200;
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

fn default_prompt_length() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_loglevel() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Longest prompt path before eliding its middle; 0 disables elision.
    #[serde(default = "default_prompt_length")]
    pub prompt_length: i64,
    /// Depth limit for `ls`; 0 is unlimited.
    #[serde(default)]
    pub tree_max_depth: i64,
    #[serde(default = "default_true")]
    pub tree_round_nodes: bool,
    #[serde(default = "default_true")]
    pub tree_status_mode: bool,
    #[serde(default = "default_true")]
    pub tree_show_root: bool,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub bookmarks: BTreeMap<String, String>,
    #[serde(default)]
    pub path_history: Vec<String>,
    #[serde(default)]
    pub path_history_index: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            prompt_length: default_prompt_length(),
            tree_max_depth: 0,
            tree_round_nodes: true,
            tree_status_mode: true,
            tree_show_root: true,
            loglevel: default_loglevel(),
            bookmarks: BTreeMap::new(),
            path_history: Vec::new(),
            path_history_index: 0,
        }
    }
}

impl Preferences {
    /// Read `prefs.toml` from `dir`, falling back to defaults.
    pub fn load(dir: &Path) -> Self {
        let file = dir.join(PREFS_FILE);
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not read {}: {}", file.display(), e);
                }
                return Self::default();
            }
        };
        match Self::from_toml(&text) {
            Ok(prefs) => prefs,
            Err(e) => {
                log::warn!("ignoring {}: {}", file.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ShellError::Prefs(format!("{PREFS_FILE}: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ShellError::Prefs(format!("{PREFS_FILE}: {e}")))
    }

    /// Write `prefs.toml` into `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(PREFS_FILE), self.to_toml()?)?;
        log::debug!("saved preferences to {}", dir.display());
        Ok(())
    }

    /// Declarations of the parameters in the `global` group.
    pub fn global_specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("loglevel", ParamType::choice(LOG_LEVELS))
                .describe("Maximum level of log messages."),
            ParamSpec::new("prompt_length", ParamType::Number { min: Some(0), max: None })
                .describe("Maximum length of the path shown in the prompt, 0 for no limit."),
            ParamSpec::new("tree_max_depth", ParamType::Number { min: Some(0), max: None })
                .describe("Default depth of ls listings, 0 for no limit."),
            ParamSpec::new("tree_round_nodes", ParamType::Bool)
                .describe("Draw tree nodes as 'o-' rather than '+-'."),
            ParamSpec::new("tree_show_root", ParamType::Bool)
                .describe("Show the listed node itself at the top of ls output."),
            ParamSpec::new("tree_status_mode", ParamType::Bool)
                .describe("Show node summaries in ls output."),
        ]
    }

    pub fn get_global(&self, name: &str) -> Result<Value> {
        let value = match name {
            "loglevel" => Value::from(self.loglevel.as_str()),
            "prompt_length" => Value::Int(self.prompt_length),
            "tree_max_depth" => Value::Int(self.tree_max_depth),
            "tree_round_nodes" => Value::Bool(self.tree_round_nodes),
            "tree_show_root" => Value::Bool(self.tree_show_root),
            "tree_status_mode" => Value::Bool(self.tree_status_mode),
            _ => return Err(not_found(name)),
        };
        Ok(value)
    }

    /// Validate and store a `global` parameter. Nothing changes on failure.
    pub fn set_global(&mut self, name: &str, raw: &str) -> Result<Value> {
        let specs = Self::global_specs();
        let spec = specs.iter().find(|s| s.name == name).ok_or_else(|| not_found(name))?;
        let value = spec.ty.coerce(name, raw)?;
        match (name, &value) {
            ("loglevel", Value::Str(level)) => {
                self.loglevel = level.clone();
                self.apply_loglevel();
            }
            ("prompt_length", Value::Int(n)) => self.prompt_length = *n,
            ("tree_max_depth", Value::Int(n)) => self.tree_max_depth = *n,
            ("tree_round_nodes", Value::Bool(b)) => self.tree_round_nodes = *b,
            ("tree_show_root", Value::Bool(b)) => self.tree_show_root = *b,
            ("tree_status_mode", Value::Bool(b)) => self.tree_status_mode = *b,
            _ => return Err(not_found(name)),
        }
        Ok(value)
    }

    /// Push the `loglevel` preference into the `log` facade.
    pub fn apply_loglevel(&self) {
        match self.loglevel.parse::<LevelFilter>() {
            Ok(level) => log::set_max_level(level),
            Err(_) => log::warn!("unknown log level '{}'", self.loglevel),
        }
    }

    /// Apply the stored `loglevel` when a shell starts.
    ///
    /// # Arguments
    ///
    /// * `env_filter` - the `RUST_LOG` filter, if the environment sets one.
    ///   An explicit filter wins over the stored preference.
    ///
    /// # Returns
    ///
    /// Whether the preference was applied.
    pub fn apply_saved_loglevel(&self, env_filter: Option<&str>) -> bool {
        if let Some(filter) = env_filter {
            log::debug!(
                "{}={} overrides the loglevel preference '{}'",
                env_logger::DEFAULT_FILTER_ENV,
                filter,
                self.loglevel
            );
            return false;
        }
        self.apply_loglevel();
        true
    }

    pub fn bookmark(&self, name: &str) -> Result<NodePath> {
        let text = self
            .bookmarks
            .get(name)
            .ok_or_else(|| ShellError::BookmarkNotFound(name.to_string()))?;
        NodePath::parse_absolute(text)
    }

    pub fn add_bookmark(&mut self, name: &str, path: &NodePath) -> Result<()> {
        if self.bookmarks.contains_key(name) {
            return Err(ShellError::Command(format!("Bookmark {} already exists", name)));
        }
        self.bookmarks.insert(name.to_string(), path.to_string());
        Ok(())
    }

    pub fn remove_bookmark(&mut self, name: &str) -> Result<()> {
        self.bookmarks
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ShellError::BookmarkNotFound(name.to_string()))
    }

    /// Record a visited location, dropping any forward history.
    pub fn record_path(&mut self, path: &NodePath) {
        let text = path.to_string();
        if !self.path_history.is_empty() {
            self.path_history.truncate(self.path_history_index + 1);
            if self.path_history.last() == Some(&text) {
                return;
            }
        }
        self.path_history.push(text);
        if self.path_history.len() > MAX_PATH_HISTORY {
            self.path_history.remove(0);
        }
        self.path_history_index = self.path_history.len() - 1;
    }

    /// Entries before (`back`) or after the current history position, nearest
    /// first, with their indexes.
    pub fn history_candidates(&self, back: bool) -> Vec<(usize, &str)> {
        let index = self.path_history_index.min(self.path_history.len());
        let entries = self.path_history.iter().map(String::as_str).enumerate();
        if back {
            entries.take(index).rev().collect()
        } else {
            entries.skip(index + 1).collect()
        }
    }
}

fn not_found(name: &str) -> ShellError {
    ShellError::ParameterNotFound {
        group: GLOBAL_GROUP.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn p(text: &str) -> NodePath {
        NodePath::parse_absolute(text).unwrap()
    }

    #[test]
    fn missing_fields_take_defaults() {
        let prefs = Preferences::from_toml("prompt_length = 12\n").unwrap();
        assert_eq!(prefs.prompt_length, 12);
        assert!(prefs.tree_round_nodes);
        assert_eq!(prefs.loglevel, "warn");
        assert!(prefs.bookmarks.is_empty());
    }

    #[test]
    fn save_then_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = Preferences::default();
        prefs.tree_max_depth = 3;
        prefs.add_bookmark("disks", &p("/storage/disks")).unwrap();
        prefs.save(dir.path()).unwrap();

        let loaded = Preferences::load(dir.path());
        assert_eq!(loaded, prefs);
        assert_eq!(loaded.bookmark("disks").unwrap(), p("/storage/disks"));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Preferences::load(dir.path()), Preferences::default());
        fs::write(dir.path().join(PREFS_FILE), "prompt_length = \"long\"").unwrap();
        assert_eq!(Preferences::load(dir.path()), Preferences::default());
    }

    #[test]
    fn set_global_validates_before_writing() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.set_global("prompt_length", "10").unwrap(), Value::Int(10));
        let err = prefs.set_global("prompt_length", "-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(prefs.prompt_length, 10);
        let err = prefs.set_global("tree_round_nodes", "maybe").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(prefs.set_global("colour", "red").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(prefs.get_global("tree_round_nodes").unwrap(), Value::Bool(true));
    }

    #[test]
    fn environment_filter_wins_over_saved_loglevel() {
        let prefs = Preferences::default();
        assert!(!prefs.apply_saved_loglevel(Some("debug")));
        assert!(prefs.apply_saved_loglevel(None));
    }

    #[test]
    fn bookmarks_reject_duplicates_and_unknown_names() {
        let mut prefs = Preferences::default();
        prefs.add_bookmark("a", &p("/a")).unwrap();
        assert!(prefs.add_bookmark("a", &p("/b")).is_err());
        prefs.remove_bookmark("a").unwrap();
        assert_eq!(prefs.remove_bookmark("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(prefs.bookmark("a").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn recording_a_path_truncates_forward_history() {
        let mut prefs = Preferences::default();
        for path in ["/", "/a", "/a/b", "/c"] {
            prefs.record_path(&p(path));
        }
        prefs.record_path(&p("/c"));
        assert_eq!(prefs.path_history.len(), 4);

        prefs.path_history_index = 1;
        let back: Vec<&str> = prefs.history_candidates(true).into_iter().map(|(_, p)| p).collect();
        assert_eq!(back, vec!["/"]);
        let forward: Vec<&str> = prefs.history_candidates(false).into_iter().map(|(_, p)| p).collect();
        assert_eq!(forward, vec!["/a/b", "/c"]);

        prefs.record_path(&p("/d"));
        assert_eq!(prefs.path_history, vec!["/", "/a", "/d"]);
        assert_eq!(prefs.path_history_index, 2);
    }
}
