use crate::node::Node;
use crate::path::NodePath;
use crate::value::{Arguments, CommandSignature, Value};
use anyhow::Result;
use std::fmt;
use std::rc::Rc;

/// What a command handler hands back to the shell loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// Nothing to display.
    None,
    /// Human-readable text, printed as-is.
    Text(String),
    /// A structured value, printed with its `Display` form.
    Value(Value),
    /// Make the given node the current one.
    Navigate(NodePath),
    /// Leave the shell loop.
    Exit,
}

/// Capability invoked when a node command runs.
///
/// A handler receives the node the command was issued on and the arguments
/// already bound and validated against the command's signature. It may mutate
/// that node (its parameters or children). A blanket implementation exists for
/// closures with the matching signature.
pub trait CommandHandler {
    fn call(&self, node: &mut Node, args: &Arguments) -> Result<CommandOutput>;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut Node, &Arguments) -> Result<CommandOutput>,
{
    fn call(&self, node: &mut Node, args: &Arguments) -> Result<CommandOutput> {
        self(node, args)
    }
}

/// Extra completion candidates for a command's arguments.
///
/// Called with the node the command would run on, the argument words typed so
/// far and the word under the cursor. It must only read the node; completion
/// never runs handlers.
pub type ArgumentCompleter = dyn Fn(&Node, &[String], &str) -> Vec<String>;

/// A command registered on a node: its signature, help text and handler.
#[derive(Clone)]
pub struct Command {
    signature: CommandSignature,
    description: String,
    handler: Rc<dyn CommandHandler>,
    completer: Option<Rc<ArgumentCompleter>>,
}

impl Command {
    pub fn new(signature: CommandSignature, handler: impl CommandHandler + 'static) -> Self {
        Self {
            signature,
            description: String::new(),
            handler: Rc::new(handler),
            completer: None,
        }
    }

    /// Like [`Command::new`], but lets the closure's argument types be inferred.
    pub fn from_fn<F>(signature: CommandSignature, f: F) -> Self
    where
        F: Fn(&mut Node, &Arguments) -> Result<CommandOutput> + 'static,
    {
        Self::new(signature, f)
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Offer candidates beyond those derived from the signature, such as the
    /// names of existing children for a `delete` command.
    pub fn with_completer(mut self, f: impl Fn(&Node, &[String], &str) -> Vec<String> + 'static) -> Self {
        self.completer = Some(Rc::new(f));
        self
    }

    /// Candidates from the completer, if one is installed.
    pub fn complete(&self, node: &Node, typed: &[String], word: &str) -> Vec<String> {
        match &self.completer {
            Some(f) => f(node, typed, word),
            None => Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &CommandSignature {
        &self.signature
    }

    pub fn description(&self) -> &str {
        if self.description.is_empty() {
            "No description available."
        } else {
            &self.description
        }
    }

    /// Shared handle on the handler, so it can run while its node is borrowed mutably.
    pub(crate) fn handler(&self) -> Rc<dyn CommandHandler> {
        Rc::clone(&self.handler)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("signature", &self.signature)
            .field("description", &self.description)
            .field("completer", &self.completer.is_some())
            .finish_non_exhaustive()
    }
}
