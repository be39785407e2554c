//! Tab completion.
//!
//! [`complete`] works on a read-only view of the tree and session: it only
//! looks up children, commands and parameter declarations, plus whatever a
//! command's completer derives from them, so producing candidates never runs
//! a handler. [`ShellHelper`] plugs it into rustyline.

use crate::builtin::Builtins;
use crate::lexer::{self, Token};
use crate::node::Node;
use crate::parser::{self, Scope};
use crate::path::{self, NodePath, SEPARATOR};
use crate::value::{CommandSignature, ParamType};
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// What completion needs to know about the shell.
pub struct CompletionScope<'a> {
    pub root: &'a Node,
    pub current: &'a NodePath,
    pub bookmarks: &'a BTreeMap<String, String>,
    pub builtins: &'a Builtins,
}

/// Parser scope of one node, with builtins counted as commands.
pub(crate) struct NodeScope<'a> {
    pub node: &'a Node,
    pub builtins: &'a Builtins,
}

impl Scope for NodeScope<'_> {
    fn has_child(&self, name: &str) -> bool {
        self.node.child(name).is_some()
    }

    fn has_command(&self, name: &str) -> bool {
        self.node.has_command(name) || self.builtins.get(name).is_some()
    }
}

impl CompletionScope<'_> {
    fn resolve(&self, input: &str) -> Option<NodePath> {
        path::resolve_bookmarked(self.root, self.current, input, self.bookmarks).ok()
    }

    fn node(&self, path: &NodePath) -> Option<&Node> {
        self.root.node_at(path).ok()
    }

    /// Commands usable on `node`: its own and the builtins.
    pub(crate) fn command_names(&self, node: &Node) -> Vec<String> {
        node.list_commands()
            .into_iter()
            .chain(self.builtins.names())
            .map(str::to_string)
            .collect()
    }

    /// Paths extending `text`: children of the node named by everything up
    /// to the last separator, or bookmark references.
    fn paths(&self, text: &str) -> Vec<String> {
        if text.starts_with('@') && !text.contains(SEPARATOR) {
            return self.bookmarks.keys().map(|name| format!("@{}", name)).collect();
        }
        let (basedir, _) = match text.rfind(SEPARATOR) {
            Some(i) => text.split_at(i + 1),
            None => ("", text),
        };
        let target = if basedir.is_empty() {
            Some(self.current.clone())
        } else {
            self.resolve(basedir)
        };
        let Some(node) = target.as_ref().and_then(|p| self.node(p)) else {
            return Vec::new();
        };
        node.list_children()
            .into_iter()
            .map(|name| format!("{}{}", basedir, name))
            .collect()
    }

    fn values(&self, ty: &ParamType, text: &str) -> Vec<String> {
        match ty {
            ParamType::Path => self.paths(text),
            _ => ty.domain().unwrap_or_default(),
        }
    }
}

/// Compute completions for `line` with the cursor at byte offset `pos`.
///
/// Returns the byte offset where the replaced word starts and the sorted,
/// deduplicated candidates that extend it.
pub fn complete(scope: &CompletionScope<'_>, line: &str, pos: usize) -> (usize, Vec<String>) {
    let pos = pos.min(line.len());
    let Some(head) = line.get(..pos) else {
        return (pos, Vec::new());
    };
    let mut partial = lexer::split_partial(head);
    if partial.open_quote {
        return (pos, Vec::new());
    }
    let (start, word) = if partial.trailing_space {
        (pos, String::new())
    } else {
        match partial.tokens.pop() {
            Some(token) => (token.byte_offset, token.text),
            None => (pos, String::new()),
        }
    };

    let candidates = candidates(scope, &partial.tokens, &word);
    let matching: BTreeSet<String> = candidates.into_iter().filter(|c| c.starts_with(&word)).collect();
    log::debug!("completing '{}' at {}: {} candidates", word, start, matching.len());
    (start, matching.into_iter().collect())
}

fn candidates(scope: &CompletionScope<'_>, before: &[Token], word: &str) -> Vec<String> {
    let Some(current) = scope.node(scope.current) else {
        return Vec::new();
    };

    let Some(first) = before.first() else {
        let mut out = scope.paths(word);
        if !word.contains(SEPARATOR) && !word.starts_with('@') {
            out.extend(scope.command_names(current));
        }
        return out;
    };

    let node_scope = NodeScope {
        node: current,
        builtins: scope.builtins,
    };
    let (node, rest) = if parser::is_navigation(first, &node_scope) {
        // with `PATH*`, the first child stands in for all of them
        let (text, all) = path::strip_all_children(&first.text);
        let target = scope.resolve(text).and_then(|p| scope.node(&p));
        let target = if all { target.and_then(|n| n.children().first()) } else { target };
        match target {
            Some(node) => (node, &before[1..]),
            None => return Vec::new(),
        }
    } else {
        (current, before)
    };

    let Some((command, args)) = rest.split_first() else {
        return scope.command_names(node);
    };
    let typed: Vec<String> = args.iter().map(|t| t.text.clone()).collect();
    let (sig, extra) = match node.get_command(&command.text) {
        Ok(cmd) => (cmd.signature(), cmd.complete(node, &typed, word)),
        Err(_) => match scope.builtins.get(&command.text) {
            Some(builtin) => (&builtin.signature, builtin.command.complete(scope, node, &typed, word)),
            None => return Vec::new(),
        },
    };
    let mut out = arguments(scope, sig, args, word);
    out.extend(extra);
    out
}

/// Candidates for the next argument of a command with signature `sig`.
fn arguments(scope: &CompletionScope<'_>, sig: &CommandSignature, typed: &[Token], word: &str) -> Vec<String> {
    if let Some((key, value)) = word.split_once('=') {
        return match sig.param(key) {
            Some(spec) => scope
                .values(&spec.ty, value)
                .into_iter()
                .map(|v| format!("{}={}", key, v))
                .collect(),
            None => Vec::new(),
        };
    }

    let mut given = BTreeSet::new();
    let mut positional_count = 0;
    for token in typed {
        match parser::keyword_of(sig, token) {
            Some((key, _)) => {
                given.insert(key.to_string());
            }
            None => positional_count += 1,
        }
    }

    let mut out = Vec::new();
    let next = sig
        .positionals
        .iter()
        .filter(|p| !given.contains(&p.name))
        .nth(positional_count);
    if let Some(spec) = next {
        out.extend(scope.values(&spec.ty, word));
    }
    for (index, spec) in sig.positionals.iter().enumerate() {
        if index >= positional_count && !given.contains(&spec.name) {
            out.push(format!("{}=", spec.name));
        }
    }
    for spec in &sig.keywords {
        if !given.contains(&spec.name) {
            out.push(format!("{}=", spec.name));
        }
    }
    out
}

/// rustyline helper completing against a shared tree.
///
/// The shell refreshes the location and bookmarks before each prompt.
pub struct ShellHelper {
    tree: Rc<RefCell<Node>>,
    builtins: Rc<Builtins>,
    pub(crate) current: NodePath,
    pub(crate) bookmarks: BTreeMap<String, String>,
}

impl ShellHelper {
    pub fn new(tree: Rc<RefCell<Node>>, builtins: Rc<Builtins>) -> Self {
        Self {
            tree,
            builtins,
            current: NodePath::root(),
            bookmarks: BTreeMap::new(),
        }
    }
}

impl rustyline::Helper for ShellHelper {}

impl Highlighter for ShellHelper {}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Validator for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Ok(root) = self.tree.try_borrow() else {
            return Ok((pos, Vec::new()));
        };
        let scope = CompletionScope {
            root: &root,
            current: &self.current,
            bookmarks: &self.bookmarks,
            builtins: &self.builtins,
        };
        let (start, words) = complete(&scope, line, pos);
        let pairs = words
            .into_iter()
            .map(|word| Pair {
                display: word.rsplit(SEPARATOR).next().unwrap_or(&word).to_string(),
                replacement: word,
            })
            .collect();
        Ok((start, pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandOutput};
    use crate::value::{ParamSpec, Value};
    use std::cell::Cell;

    fn tree(calls: Rc<Cell<usize>>) -> Node {
        let create = Command::from_fn(
            CommandSignature::new("create")
                .required("name", ParamType::String)
                .optional("pool", ParamType::choice(["fast", "slow"]))
                .keyword("size", ParamType::number(), Some(Value::Int(0)))
                .keyword("thin", ParamType::Bool, None),
            move |_node, _args| {
                calls.set(calls.get() + 1);
                Ok(CommandOutput::None)
            },
        );
        let delete = Command::from_fn(
            CommandSignature::new("delete").required("name", ParamType::String),
            |_node, _args| Ok(CommandOutput::None),
        )
        .with_completer(|node, typed, _word| {
            if typed.is_empty() {
                node.list_children().into_iter().map(str::to_string).collect()
            } else {
                Vec::new()
            }
        });
        let storage = Node::new("storage")
            .with_command(create)
            .unwrap()
            .with_command(delete)
            .unwrap()
            .with_child(Node::new("disk0"))
            .unwrap()
            .with_child(Node::new("disk1"))
            .unwrap()
            .with_parameter(ParamSpec::new("mode", ParamType::Bool), true)
            .unwrap();
        Node::root()
            .with_child(storage)
            .unwrap()
            .with_child(Node::new("status"))
            .unwrap()
    }

    fn run(root: &Node, current: &str, line: &str) -> (usize, Vec<String>) {
        let current = NodePath::parse_absolute(current).unwrap();
        let mut bookmarks = BTreeMap::new();
        bookmarks.insert("disks".to_string(), "/storage".to_string());
        let builtins = Builtins::default();
        let scope = CompletionScope {
            root,
            current: &current,
            bookmarks: &bookmarks,
            builtins: &builtins,
        };
        complete(&scope, line, line.len())
    }

    #[test]
    fn first_word_offers_children_and_commands() {
        let root = tree(Rc::new(Cell::new(0)));
        let (start, words) = run(&root, "/", "st");
        assert_eq!(start, 0);
        assert_eq!(words, vec!["status", "storage"]);

        let (_, words) = run(&root, "/storage", "");
        assert!(words.contains(&"disk0".to_string()));
        assert!(words.contains(&"create".to_string()));
        assert!(words.contains(&"cd".to_string()));
        let mut sorted = words.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(words, sorted);
    }

    #[test]
    fn paths_complete_below_their_directory() {
        let root = tree(Rc::new(Cell::new(0)));
        let (start, words) = run(&root, "/", "cd /storage/d");
        assert_eq!(start, 3);
        assert_eq!(words, vec!["/storage/disk0", "/storage/disk1"]);

        let (_, words) = run(&root, "/", "storage/");
        assert_eq!(words, vec!["storage/disk0", "storage/disk1"]);

        let (_, words) = run(&root, "/", "@d");
        assert_eq!(words, vec!["@disks"]);
        let (_, words) = run(&root, "/", "ls @disks/");
        assert_eq!(words, vec!["@disks/disk0", "@disks/disk1"]);
        let (_, words) = run(&root, "/", "cd /nowhere/");
        assert!(words.is_empty());
    }

    #[test]
    fn command_after_path() {
        let root = tree(Rc::new(Cell::new(0)));
        let (start, words) = run(&root, "/", "storage cr");
        assert_eq!(start, 8);
        assert_eq!(words, vec!["create"]);
    }

    #[test]
    fn arguments_offer_parameters_and_values() {
        let calls = Rc::new(Cell::new(0));
        let root = tree(calls.clone());

        let (_, words) = run(&root, "/storage", "create ");
        assert_eq!(words, vec!["name=", "pool=", "size=", "thin="]);

        let (_, words) = run(&root, "/storage", "create disk9 ");
        assert_eq!(words, vec!["fast", "pool=", "size=", "slow", "thin="]);

        let (_, words) = run(&root, "/storage", "create disk9 size=1 thin=");
        assert_eq!(words, vec!["thin=false", "thin=true"]);

        let (_, words) = run(&root, "/storage", "create disk9 size=1 t");
        assert_eq!(words, vec!["thin="]);

        let (_, words) = run(&root, "/", "bookmarks ");
        assert_eq!(words, vec!["action=", "add", "bookmark=", "del", "go", "show"]);

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn command_completer_adds_candidates() {
        let root = tree(Rc::new(Cell::new(0)));
        let (_, words) = run(&root, "/", "storage delete ");
        assert_eq!(words, vec!["disk0", "disk1", "name="]);
        let (_, words) = run(&root, "/", "storage delete disk0 ");
        assert!(words.is_empty());
    }

    #[test]
    fn set_offers_groups_then_parameter_names() {
        let root = tree(Rc::new(Cell::new(0)));
        let (_, words) = run(&root, "/storage", "set ");
        assert_eq!(words, vec!["global", "group=", "parameter"]);

        let (_, words) = run(&root, "/storage", "set global ");
        assert_eq!(
            words,
            vec![
                "loglevel=",
                "prompt_length=",
                "tree_max_depth=",
                "tree_round_nodes=",
                "tree_show_root=",
                "tree_status_mode=",
            ]
        );
        let (_, words) = run(&root, "/storage", "set global prompt");
        assert_eq!(words, vec!["prompt_length="]);
        let (_, words) = run(&root, "/storage", "set global tree_round_nodes=");
        assert_eq!(words, vec!["tree_round_nodes=false", "tree_round_nodes=true"]);
        let (_, words) = run(&root, "/storage", "set global prompt_length=5 p");
        assert!(words.is_empty());

        let (_, words) = run(&root, "/storage", "set parameter ");
        assert_eq!(words, vec!["mode="]);
    }

    #[test]
    fn get_offers_groups_then_parameter_names() {
        let root = tree(Rc::new(Cell::new(0)));
        let (_, words) = run(&root, "/storage", "get ");
        assert_eq!(words, vec!["global", "group=", "parameter"]);

        let (_, words) = run(&root, "/storage", "get global tree_");
        assert_eq!(words, vec!["tree_max_depth", "tree_round_nodes", "tree_show_root", "tree_status_mode"]);
        let (_, words) = run(&root, "/storage", "get global loglevel ");
        assert!(words.contains(&"prompt_length".to_string()));
        assert!(!words.contains(&"loglevel".to_string()));

        let (_, words) = run(&root, "/", "storage get parameter ");
        assert_eq!(words, vec!["mode"]);
        assert!(run(&root, "/", "get colours ").1.is_empty());
    }

    #[test]
    fn help_cd_and_bookmarks_complete_their_arguments() {
        let root = tree(Rc::new(Cell::new(0)));
        let (_, words) = run(&root, "/storage", "help ");
        assert!(words.contains(&"create".to_string()));
        assert!(words.contains(&"bookmarks".to_string()));
        assert!(words.contains(&"topic=".to_string()));
        let (_, words) = run(&root, "/storage", "help cr");
        assert_eq!(words, vec!["create"]);

        let (_, words) = run(&root, "/storage", "cd ");
        assert_eq!(words, vec!["<", ">", "disk0", "disk1", "path="]);

        let (_, words) = run(&root, "/", "bookmarks go ");
        assert_eq!(words, vec!["bookmark=", "disks"]);
        let (_, words) = run(&root, "/", "bookmarks add ");
        assert_eq!(words, vec!["bookmark="]);
    }

    #[test]
    fn all_children_path_completes_commands_of_a_child() {
        let root = tree(Rc::new(Cell::new(0)));
        let (_, words) = run(&root, "/", "storage* ");
        assert!(words.contains(&"ls".to_string()));
        assert!(!words.contains(&"create".to_string()));
    }

    #[test]
    fn unknown_command_or_open_quote_gives_nothing() {
        let root = tree(Rc::new(Cell::new(0)));
        assert!(run(&root, "/", "frob ").1.is_empty());
        assert!(run(&root, "/storage", "create \"dis").1.is_empty());
    }

    #[test]
    fn candidates_come_from_declarations_only() {
        let root = tree(Rc::new(Cell::new(0)));
        let storage = root.child("storage").unwrap();
        let builtins = Builtins::default();
        let (_, words) = run(&root, "/storage", "");
        for word in words {
            let declared = storage.child(&word).is_some()
                || storage.has_command(&word)
                || builtins.get(&word).is_some();
            assert!(declared, "{word}");
        }
    }
}
