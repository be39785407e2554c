//! The shell loop.
//!
//! Every input line walks the same state machine:
//!
//! ```text
//! Reading -> Resolving -> Dispatching -> Rendering -> Reading
//!    |           |                          |
//!    +-----------+----------> Exiting <-----+
//! ```
//!
//! Resolving splits off a leading path and makes it current; Dispatching binds
//! the arguments and runs the command on the current node; Rendering prints
//! the result or the error. Errors of any step end up in Rendering, so a bad
//! line never stops the loop. Only I/O failures on the streams are fatal.
//!
//! A leading `PATH*` dispatches once per child of PATH instead, each child
//! current while its command runs, and prints a `[path]` header before each
//! child's output. The current node is left where it was unless a command
//! navigates. Without a command, the children are listed with `ls`.

use crate::builtin::{Builtins, Context};
use crate::command::CommandOutput;
use crate::completion::{NodeScope, ShellHelper};
use crate::error::{ErrorKind, Result, ShellError};
use crate::lexer::Token;
use crate::node::Node;
use crate::parser;
use crate::path::{self, NodePath};
use crate::prefs::{HISTORY_FILE, Preferences};
use crate::render;
use crate::session::Session;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use std::cell::RefCell;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

/// Marks a comment line in scripts.
const COMMENT: char = '#';
/// Runs on every child of a `PATH*` line that names no command.
const LIST_COMMAND: &str = "ls";

#[derive(Debug)]
enum Step {
    Reading,
    Resolving(String),
    Dispatching { command: Token, args: Vec<Token> },
    DispatchingAll { parent: NodePath, command: Token, args: Vec<Token> },
    /// `shown` holds output of a `PATH*` line produced before `result`.
    Rendering { shown: String, result: Result<CommandOutput> },
    Exiting,
}

impl Step {
    fn render(result: Result<CommandOutput>) -> Self {
        Step::Rendering {
            shown: String::new(),
            result,
        }
    }
}

/// A line after Resolving.
struct Resolved {
    target: Option<NodePath>,
    all_children: bool,
    command: Option<(Token, Vec<Token>)>,
}

/// Where input lines come from.
pub trait LineSource {
    /// The next line, or `None` once the input is exhausted or interrupted.
    fn next_line(&mut self, session: &Session, prefs: &Preferences) -> Result<Option<String>>;
}

/// Lines read from any buffered reader, without prompting.
pub struct ScriptSource<R> {
    reader: R,
}

impl<R: BufRead> ScriptSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ScriptSource<R> {
    fn next_line(&mut self, _session: &Session, _prefs: &Preferences) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Interactive lines from a rustyline editor.
struct EditorSource<'e> {
    editor: &'e mut Editor<ShellHelper, FileHistory>,
}

impl LineSource for EditorSource<'_> {
    fn next_line(&mut self, session: &Session, prefs: &Preferences) -> Result<Option<String>> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.current = session.current().clone();
            helper.bookmarks = prefs.bookmarks.clone();
        }
        let prompt = render::prompt(session.current(), prefs.prompt_length);
        match self.editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// An interactive shell over a configuration tree.
pub struct Shell {
    tree: Rc<RefCell<Node>>,
    session: Session,
    prefs: Preferences,
    saved_prefs: Preferences,
    prefs_dir: Option<PathBuf>,
    builtins: Rc<Builtins>,
}

impl Shell {
    pub fn new(root: Node) -> Self {
        Self {
            tree: Rc::new(RefCell::new(root)),
            session: Session::new(),
            prefs: Preferences::default(),
            saved_prefs: Preferences::default(),
            prefs_dir: None,
            builtins: Rc::new(Builtins::default()),
        }
    }

    /// Load preferences from `dir` and save them back there after changes.
    pub fn with_prefs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("cannot create preferences directory {}: {}", dir.display(), e);
        }
        self.prefs = Preferences::load(&dir);
        let env_filter = env::var(env_logger::DEFAULT_FILTER_ENV).ok();
        self.prefs.apply_saved_loglevel(env_filter.as_deref());
        self.saved_prefs = self.prefs.clone();
        self.prefs_dir = Some(dir);
        self
    }

    /// Shared handle on the tree.
    pub fn tree(&self) -> Rc<RefCell<Node>> {
        Rc::clone(&self.tree)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn current(&self) -> &NodePath {
        self.session.current()
    }

    /// Resolve and dispatch one line without rendering anything.
    ///
    /// For a `PATH*` line the children's outputs come back as one text with
    /// their headers; when a child fails, only its error is returned.
    pub fn execute(&mut self, line: &str) -> Result<CommandOutput> {
        self.retreat_to_existing();
        match self.resolving(line) {
            Step::Dispatching { command, args } => self.dispatching(&command, &args),
            Step::DispatchingAll { parent, command, args } => self.dispatching_all(&parent, &command, &args).1,
            Step::Rendering { result, .. } => result,
            _ => Ok(CommandOutput::None),
        }
    }

    /// Run one line through the whole cycle, rendering into `out`.
    ///
    /// Command-level failures are written to `out`; only a failing `out`
    /// is reported as an error.
    pub fn run_line(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        let mut step = self.accept(line);
        while !matches!(step, Step::Reading | Step::Exiting) {
            step = self.advance(step, out, false)?;
        }
        Ok(())
    }

    /// Execute lines from `reader`, starting at the root node.
    ///
    /// With `exit_on_error`, the first failing line stops the run and its
    /// error is returned.
    pub fn run_script<R: BufRead>(&mut self, reader: R, out: &mut dyn Write, exit_on_error: bool) -> Result<()> {
        self.session.set_current(NodePath::root());
        self.drive(&mut ScriptSource::new(reader), out, exit_on_error)
    }

    /// Interactive loop on the terminal, with completion and line history.
    pub fn repl(&mut self) -> Result<()> {
        let mut editor: Editor<ShellHelper, FileHistory> = Editor::new()?;
        editor.set_helper(Some(ShellHelper::new(Rc::clone(&self.tree), Rc::clone(&self.builtins))));
        let history = self.prefs_dir.as_ref().map(|dir| dir.join(HISTORY_FILE));
        if let Some(file) = &history {
            if let Err(e) = editor.load_history(file) {
                log::debug!("no line history loaded from {}: {}", file.display(), e);
            }
        }

        self.restore_location();
        let result = self.drive(&mut EditorSource { editor: &mut editor }, &mut io::stdout(), false);

        if let Some(file) = &history {
            if let Err(e) = editor.save_history(file) {
                log::warn!("cannot save line history to {}: {}", file.display(), e);
            }
        }
        result
    }

    /// Drive the state machine until the source is exhausted or `exit` runs.
    pub fn drive(&mut self, source: &mut dyn LineSource, out: &mut dyn Write, exit_on_error: bool) -> Result<()> {
        let mut step = Step::Reading;
        loop {
            step = match step {
                Step::Reading => match source.next_line(&self.session, &self.prefs)? {
                    Some(line) => self.accept(&line),
                    None => Step::Exiting,
                },
                Step::Exiting => break,
                other => self.advance(other, out, exit_on_error)?,
            };
        }
        log::debug!("leaving shell at {}", self.session.current());
        self.session.request_exit();
        self.autosave();
        Ok(())
    }

    /// Start at the last visited location, if it still exists.
    fn restore_location(&mut self) {
        let last = self.prefs.path_history.get(self.prefs.path_history_index).cloned();
        let restored = last
            .and_then(|text| NodePath::parse_absolute(&text).ok())
            .filter(|path| self.tree.borrow().node_at(path).is_ok())
            .unwrap_or_default();
        self.session.navigate(restored, &mut self.prefs);
    }

    /// Reading: take a line; blank lines and comments go straight back to Reading.
    fn accept(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
            return Step::Reading;
        }
        self.session.push_history(line);
        self.retreat_to_existing();
        Step::Resolving(line.to_string())
    }

    fn advance(&mut self, step: Step, out: &mut dyn Write, exit_on_error: bool) -> Result<Step> {
        match step {
            Step::Resolving(line) => Ok(self.resolving(&line)),
            Step::Dispatching { command, args } => Ok(Step::render(self.dispatching(&command, &args))),
            Step::DispatchingAll { parent, command, args } => {
                let (shown, result) = self.dispatching_all(&parent, &command, &args);
                Ok(Step::Rendering { shown, result })
            }
            Step::Rendering { shown, result } => self.rendering(shown, result, out, exit_on_error),
            other => Ok(other),
        }
    }

    /// Resolving: split the line and enter a leading path.
    ///
    /// A failure leaves the current node unchanged. A `PATH*` target is not
    /// entered; its children are dispatched on instead.
    fn resolving(&mut self, line: &str) -> Step {
        let resolved = match self.split(line) {
            Ok(resolved) => resolved,
            Err(e) => return Step::render(Err(e)),
        };
        if resolved.all_children {
            let parent = resolved.target.unwrap_or_else(|| self.session.current().clone());
            return match resolved.command {
                Some((command, args)) => Step::DispatchingAll { parent, command, args },
                None => Step::render(Ok(CommandOutput::None)),
            };
        }
        if let Some(target) = resolved.target {
            self.session.navigate(target, &mut self.prefs);
        }
        match resolved.command {
            Some((command, args)) => Step::Dispatching { command, args },
            None => Step::render(Ok(CommandOutput::None)),
        }
    }

    fn split(&self, line: &str) -> Result<Resolved> {
        let tree = self.tree.borrow();
        let node = tree.node_at(self.session.current())?;
        let scope = NodeScope {
            node,
            builtins: &self.builtins,
        };
        let parsed = parser::parse_line(line, &scope)?;
        let target = match &parsed.path {
            Some(token) => Some(path::resolve_bookmarked(
                &tree,
                self.session.current(),
                &token.text,
                &self.prefs.bookmarks,
            )?),
            None => None,
        };
        let all_children = parsed.all_children;
        let command = match parsed.command {
            Some(command) => Some((command, parsed.args)),
            None if all_children => parsed.path.map(|at| (listing(&at), Vec::new())),
            None => None,
        };
        Ok(Resolved {
            target,
            all_children,
            command,
        })
    }

    /// Dispatching: node commands first, then builtins.
    fn dispatching(&mut self, command: &Token, args: &[Token]) -> Result<CommandOutput> {
        let output = self.invoke(command, args)?;
        match &output {
            CommandOutput::Navigate(target) => {
                self.tree.borrow().node_at(target)?;
                self.session.navigate(target.clone(), &mut self.prefs);
            }
            CommandOutput::Exit => self.session.request_exit(),
            _ => {}
        }
        Ok(output)
    }

    /// Dispatching for `PATH*`: run the command on each child of `parent`.
    ///
    /// Stops at the first failing child. Returns the sections written so far
    /// along with the outcome, which on success is all sections as one text.
    fn dispatching_all(&mut self, parent: &NodePath, command: &Token, args: &[Token]) -> (String, Result<CommandOutput>) {
        let tree = self.tree.borrow();
        let children: Vec<NodePath> = match tree.node_at(parent) {
            Ok(node) => node.list_children().into_iter().map(|name| parent.child(name)).collect(),
            Err(e) => return (String::new(), Err(e)),
        };
        drop(tree);
        log::debug!("running {} on {} children of {}", command.text, children.len(), parent);

        let home = self.session.current().clone();
        let mut sections = Vec::new();
        let mut moved = false;
        for child in children {
            sections.push(format!("[{}]", child));
            self.session.set_current(child);
            match self.dispatching(command, args) {
                Ok(CommandOutput::Navigate(_)) => moved = true,
                Ok(CommandOutput::Exit) => return (sections.join("\n"), Ok(CommandOutput::Exit)),
                Ok(output) => sections.extend(display_text(&output)),
                Err(e) => {
                    self.session.set_current(home);
                    return (sections.join("\n"), Err(e));
                }
            }
        }
        if !moved {
            self.session.set_current(home);
        }
        (String::new(), Ok(CommandOutput::Text(sections.join("\n"))))
    }

    fn invoke(&mut self, command: &Token, args: &[Token]) -> Result<CommandOutput> {
        let mut tree = self.tree.borrow_mut();
        let current = self.session.current().clone();
        let node = tree.node_at_mut(&current)?;
        if node.has_command(&command.text) {
            let signature = node.get_command(&command.text)?.signature().clone();
            let bound = parser::bind(&signature, args)?;
            return node.invoke(&command.text, &bound);
        }

        let Some(builtin) = self.builtins.get(&command.text) else {
            return Err(ShellError::CommandNotFound {
                name: command.text.clone(),
                position: Some(command.offset),
            });
        };
        let bound = parser::bind(&builtin.signature, args)?;
        log::debug!("running builtin {} at {}", command.text, current);
        let mut ctx = Context {
            root: &mut *tree,
            session: &mut self.session,
            prefs: &mut self.prefs,
            builtins: &self.builtins,
        };
        builtin.command.execute(&bound, &mut ctx)
    }

    /// Rendering: print the outcome, then go back to Reading.
    fn rendering(
        &mut self,
        shown: String,
        result: Result<CommandOutput>,
        out: &mut dyn Write,
        exit_on_error: bool,
    ) -> Result<Step> {
        self.retreat_to_existing();
        self.autosave();
        if !shown.is_empty() {
            writeln!(out, "{}", shown)?;
        }
        match result {
            Ok(CommandOutput::Exit) => {
                out.flush()?;
                return Ok(Step::Exiting);
            }
            Ok(output) => {
                if let Some(text) = display_text(&output) {
                    writeln!(out, "{}", text)?;
                }
            }
            Err(e) if e.kind() == ErrorKind::Fatal => return Err(e),
            Err(e) => {
                log::debug!("line failed ({:?}): {}", e.kind(), e);
                writeln!(out, "{}", e)?;
                if exit_on_error {
                    return Err(e);
                }
            }
        }
        out.flush()?;
        Ok(Step::Reading)
    }

    /// Handlers may delete nodes; fall back to the nearest ancestor that exists.
    fn retreat_to_existing(&mut self) {
        let tree = self.tree.borrow();
        let mut path = self.session.current().clone();
        while tree.node_at(&path).is_err() {
            match path.parent() {
                Some(parent) => path = parent,
                None => break,
            }
        }
        drop(tree);
        if &path != self.session.current() {
            log::warn!("{} no longer exists, moving to {}", self.session.current(), path);
            self.session.set_current(path);
        }
    }

    fn autosave(&mut self) {
        let Some(dir) = &self.prefs_dir else {
            return;
        };
        if self.prefs == self.saved_prefs {
            return;
        }
        match self.prefs.save(dir) {
            Ok(()) => self.saved_prefs = self.prefs.clone(),
            Err(e) => log::warn!("cannot save preferences: {}", e),
        }
    }
}

/// Printable form of a command result, if it has one.
fn display_text(output: &CommandOutput) -> Option<String> {
    match output {
        CommandOutput::Text(text) if !text.is_empty() => Some(text.clone()),
        CommandOutput::Value(value) => Some(value.to_string()),
        _ => None,
    }
}

/// The implicit `ls` of a bare `PATH*` line, placed where the path was typed.
fn listing(at: &Token) -> Token {
    Token {
        text: LIST_COMMAND.to_string(),
        offset: at.offset,
        byte_offset: at.byte_offset,
        eq: None,
        quoted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::io_adapters::MemWriter;
    use crate::prefs::PREFS_FILE;
    use crate::value::{Arguments, CommandSignature, ParamType, Value};

    type Calls = Rc<RefCell<Vec<Arguments>>>;

    fn storage(calls: Calls) -> Node {
        let create = Command::from_fn(
            CommandSignature::new("create")
                .required("name", ParamType::String)
                .keyword("size", ParamType::number(), Some(Value::Int(0))),
            move |node, args| {
                calls.borrow_mut().push(args.clone());
                let name = args.get_str("name").unwrap_or_default().to_string();
                node.add_child(Node::new(name.clone()))?;
                Ok(CommandOutput::Text(format!("Created {}.", name)))
            },
        )
        .describe("Create a disk.");
        let delete = Command::from_fn(
            CommandSignature::new("delete").required("name", ParamType::String),
            |node, args| {
                node.remove_child(args.get_str("name").unwrap_or_default())?;
                Ok(CommandOutput::None)
            },
        );
        let fill = Command::from_fn(CommandSignature::new("fill"), |node, _args| {
            node.add_child(Node::new("partial"))?;
            anyhow::bail!("disk full after partial write")
        });
        Node::new("storage")
            .with_command(create)
            .unwrap()
            .with_command(delete)
            .unwrap()
            .with_command(fill)
            .unwrap()
    }

    fn shell() -> (Shell, Calls) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let jump = Command::from_fn(CommandSignature::new("jump"), |_node, _args| {
            Ok(CommandOutput::Navigate(NodePath::root().child("storage")))
        });
        let root = Node::root()
            .with_child(storage(calls.clone()))
            .unwrap()
            .with_child(Node::new("net").with_command(jump).unwrap())
            .unwrap();
        (Shell::new(root), calls)
    }

    fn at(shell: &Shell) -> String {
        shell.current().to_string()
    }

    #[test]
    fn path_then_command_dispatches_bound_arguments() {
        let (mut sh, calls) = shell();
        let out = sh.execute("storage create disk1 size=10").unwrap();
        assert_eq!(out, CommandOutput::Text("Created disk1.".into()));
        let call = calls.borrow()[0].clone();
        assert_eq!(call.positional(), &[Value::from("disk1")]);
        assert_eq!(call.keyword()["size"], Value::Int(10));
        assert_eq!(at(&sh), "/storage");
    }

    #[test]
    fn misspelled_command_is_not_found_at_its_offset() {
        let (mut sh, calls) = shell();
        let err = sh.execute("storage creat disk1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.position(), Some(8));
        assert_eq!(format!("{err}"), "No command named 'creat'");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn ascending_above_root_leaves_session_unchanged() {
        let (mut sh, _) = shell();
        let err = sh.execute("../../x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert_eq!(at(&sh), "/");

        sh.execute("storage").unwrap();
        let err = sh.execute("/nope ls").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(at(&sh), "/storage");
    }

    #[test]
    fn path_only_lines_navigate() {
        let (mut sh, _) = shell();
        sh.execute("storage").unwrap();
        assert_eq!(at(&sh), "/storage");
        sh.execute("..").unwrap();
        assert_eq!(at(&sh), "/");
        sh.execute("/net").unwrap();
        sh.execute("cd ../storage").unwrap();
        assert_eq!(at(&sh), "/storage");
    }

    #[test]
    fn handler_navigation_and_exit() {
        let (mut sh, _) = shell();
        sh.execute("net jump").unwrap();
        assert_eq!(at(&sh), "/storage");
        assert_eq!(sh.execute("exit").unwrap(), CommandOutput::Exit);
        assert!(sh.session().should_exit());
    }

    #[test]
    fn failed_handler_keeps_its_partial_changes() {
        let (mut sh, _) = shell();
        let err = sh.execute("/storage fill").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Command);
        assert_eq!(format!("{err}"), "disk full after partial write");
        let tree = sh.tree();
        assert!(tree.borrow().child("storage").unwrap().child("partial").is_some());
    }

    #[test]
    fn errors_are_rendered_and_loop_continues() {
        let (mut sh, calls) = shell();
        let mut out = MemWriter::new();
        sh.run_line("storage create", &mut out).unwrap();
        sh.run_line("pwd", &mut out).unwrap();
        sh.run_line("create \"disk 2", &mut out).unwrap();
        assert_eq!(
            out.contents(),
            "Invalid value for 'name': missing required parameter\n/storage\nSyntax error at position 7: unterminated quote\n"
        );
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn invalid_arguments_never_reach_the_handler() {
        let (mut sh, calls) = shell();
        let err = sh.execute("storage create d size=big").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(format!("{err}"), "Invalid value for 'size': 'big' is not a NUMBER");

        let mut out = MemWriter::new();
        sh.run_line("create d size=big", &mut out).unwrap();
        sh.run_line("create d e", &mut out).unwrap();
        assert!(out.contents().contains("'big' is not a NUMBER"));
        assert!(calls.borrow().is_empty());
        assert!(sh.tree().borrow().child("storage").unwrap().children().is_empty());
    }

    #[test]
    fn execute_recovers_after_the_current_node_is_removed() {
        let (mut sh, _) = shell();
        sh.execute("storage").unwrap();
        sh.tree().borrow_mut().remove_child("storage").unwrap();
        assert_eq!(sh.execute("pwd").unwrap(), CommandOutput::Text("/".into()));
        assert_eq!(at(&sh), "/");
        sh.execute("/net").unwrap();
        assert_eq!(at(&sh), "/net");
    }

    #[test]
    fn star_path_runs_the_command_on_every_child() {
        let (mut sh, calls) = shell();
        sh.execute("storage create a").unwrap();
        sh.execute("create b").unwrap();
        sh.execute("/").unwrap();

        let out = sh.execute("storage* pwd").unwrap();
        assert_eq!(out, CommandOutput::Text("[/storage/a]\n/storage/a\n[/storage/b]\n/storage/b".into()));
        assert_eq!(at(&sh), "/");

        let mut out = MemWriter::new();
        sh.run_line("storage*", &mut out).unwrap();
        let text = out.contents();
        assert!(text.starts_with("[/storage/a]\no- a"));
        assert!(text.contains("[/storage/b]\no- b"));
        assert_eq!(at(&sh), "/");

        // the first failing child stops the run, after the output so far
        let mut out = MemWriter::new();
        sh.run_line("* fill", &mut out).unwrap();
        assert_eq!(out.contents(), "[/storage]\ndisk full after partial write\n");
        assert_eq!(at(&sh), "/");
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn star_path_keeps_navigation_done_by_a_child() {
        let (mut sh, _) = shell();
        sh.execute("storage").unwrap();
        let out = sh.execute("/* pwd").unwrap();
        assert_eq!(out, CommandOutput::Text("[/storage]\n/storage\n[/net]\n/net".into()));
        assert_eq!(at(&sh), "/storage");

        sh.execute("/net").unwrap();
        sh.execute("../* cd /storage").unwrap();
        assert_eq!(at(&sh), "/storage");
    }

    #[test]
    fn script_runs_from_root_and_skips_comments() {
        let (mut sh, calls) = shell();
        sh.execute("net").unwrap();
        let script = "# build disks\nstorage create a\n\ncreate b size=2\nbogus\nls / 1\n";
        let mut out = MemWriter::new();
        sh.run_script(script.as_bytes(), &mut out, false).unwrap();
        assert_eq!(calls.borrow().len(), 2);
        let text = out.contents();
        assert!(text.contains("Created a.\nCreated b.\nNo command named 'bogus'\n"));
        assert!(text.contains("o- storage"));
        assert_eq!(sh.session().history().len(), 4);
    }

    #[test]
    fn script_stops_at_first_error_when_asked() {
        let (mut sh, calls) = shell();
        let script = "storage create a\ncreate a\ncreate c\n";
        let mut out = MemWriter::new();
        let err = sh.run_script(script.as_bytes(), &mut out, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn exit_ends_script() {
        let (mut sh, calls) = shell();
        let mut out = MemWriter::new();
        sh.run_script("exit\nstorage create a\n".as_bytes(), &mut out, false).unwrap();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn deleted_current_node_falls_back_to_parent() {
        let (mut sh, _) = shell();
        let mut out = MemWriter::new();
        sh.run_line("storage create d0", &mut out).unwrap();
        sh.run_line("d0", &mut out).unwrap();
        assert_eq!(at(&sh), "/storage/d0");
        sh.run_line(".. delete d0", &mut out).unwrap();
        assert_eq!(at(&sh), "/storage");
        sh.tree().borrow_mut().remove_child("storage").unwrap();
        sh.run_line("pwd", &mut out).unwrap();
        assert_eq!(at(&sh), "/");
    }

    #[test]
    fn preferences_are_saved_after_changes() {
        let dir = tempfile::tempdir().unwrap();
        let (sh, _) = shell();
        let mut sh = sh.with_prefs_dir(dir.path());
        let mut out = MemWriter::new();
        sh.run_line("set global prompt_length=12", &mut out).unwrap();
        sh.run_line("storage", &mut out).unwrap();
        sh.run_line("bookmarks add disks", &mut out).unwrap();

        let saved = Preferences::load(dir.path());
        assert_eq!(saved.prompt_length, 12);
        assert_eq!(saved.bookmark("disks").unwrap().to_string(), "/storage");
        assert!(dir.path().join(PREFS_FILE).exists());

        sh.run_line("/", &mut out).unwrap();
        sh.run_line("@disks create x", &mut out).unwrap();
        assert_eq!(at(&sh), "/storage");
        assert!(out.contents().ends_with("Created x.\n"));
    }
}
