//! Configuration tree nodes.
//!
//! A [`Node`] owns its children outright, so the tree can never contain a
//! cycle and every non-root node has exactly one parent. Commands and typed
//! parameters are registered on a node before the shell starts; the shell
//! only dispatches to them.

use crate::command::{Command, CommandOutput};
use crate::error::{Result, ShellError};
use crate::path::NodePath;
use crate::value::{Arguments, ParamSpec, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

static NODE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:\-]+$").expect("node name pattern"));

/// Group name under which `get`/`set` expose a node's own parameters.
pub const PARAMETER_GROUP: &str = "parameter";

/// Status line shown next to a node in tree listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub description: String,
    /// `Some(true)` healthy, `Some(false)` failing, `None` unknown.
    pub healthy: Option<bool>,
}

impl Summary {
    pub fn new(description: impl Into<String>, healthy: Option<bool>) -> Self {
        Self {
            description: description.into(),
            healthy,
        }
    }
}

/// A typed, settable node parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub spec: ParamSpec,
    pub value: Value,
}

type SummaryFn = Rc<dyn Fn(&Node) -> Summary>;

pub struct Node {
    name: String,
    children: Vec<Node>,
    commands: BTreeMap<String, Command>,
    parameters: BTreeMap<String, Parameter>,
    summary: Option<SummaryFn>,
}

impl Node {
    /// An empty node: no children, commands or parameters.
    ///
    /// The name is checked when the node is attached with [`Node::add_child`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            commands: BTreeMap::new(),
            parameters: BTreeMap::new(),
            summary: None,
        }
    }

    /// A node suitable as the tree root, named `/`.
    pub fn root() -> Self {
        Self::new("/")
    }

    /// Name of the node, unique among its siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Names of the children, in insertion order.
    pub fn list_children(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    /// The direct child called `name`, matched exactly.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Attach `child`, returning a handle on it in its new place.
    ///
    /// Fails if the name is not a valid node name or a sibling already uses it.
    pub fn add_child(&mut self, child: Node) -> Result<&mut Node> {
        if !NODE_NAME.is_match(&child.name) || child.name == "." || child.name == ".." {
            return Err(ShellError::InvalidNode(format!("'{}' is not a valid node name", child.name)));
        }
        if self.child(&child.name).is_some() {
            return Err(ShellError::InvalidNode(format!(
                "node {} already has a child named {}",
                self.name, child.name
            )));
        }
        self.children.push(child);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    pub fn with_child(mut self, child: Node) -> Result<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Detach the child called `name` with its whole subtree.
    ///
    /// # Returns
    ///
    /// The detached node, or `InvalidNode` if there is no such child.
    pub fn remove_child(&mut self, name: &str) -> Result<Node> {
        match self.children.iter().position(|c| c.name == name) {
            Some(index) => Ok(self.children.remove(index)),
            None => Err(ShellError::InvalidNode(format!("cannot delete: {} has no child {}", self.name, name))),
        }
    }

    /// Register `command` on this node, replacing one with the same name.
    ///
    /// # Arguments
    ///
    /// * `command` - signature, handler and optional completer.
    ///
    /// # Returns
    ///
    /// An error if the signature is malformed, e.g. a required positional
    /// declared after an optional one.
    pub fn add_command(&mut self, command: Command) -> Result<()> {
        command.signature().validate()?;
        self.commands.insert(command.name().to_string(), command);
        Ok(())
    }

    pub fn with_command(mut self, command: Command) -> Result<Self> {
        self.add_command(command)?;
        Ok(self)
    }

    /// Names of the node's own commands, sorted. Builtins are not included.
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// The command called `name`, or `CommandNotFound` without a position.
    pub fn get_command(&self, name: &str) -> Result<&Command> {
        self.commands.get(name).ok_or_else(|| ShellError::CommandNotFound {
            name: name.to_string(),
            position: None,
        })
    }

    /// Run a command with already validated arguments.
    ///
    /// The framework performs no mutation of its own; whatever the handler
    /// changed before failing stays changed.
    pub fn invoke(&mut self, name: &str, args: &Arguments) -> Result<CommandOutput> {
        let handler = self.get_command(name)?.handler();
        log::debug!("invoking {} on node {} with {:?}", name, self.name, args);
        handler.call(self, args).map_err(ShellError::from_handler)
    }

    /// Declare a parameter with its initial value, which must satisfy the type.
    pub fn add_parameter(&mut self, spec: ParamSpec, initial: impl Into<Value>) -> Result<()> {
        let initial = initial.into();
        let value = spec.ty.coerce(&spec.name, &initial.to_string())?;
        self.parameters.insert(spec.name.clone(), Parameter { spec, value });
        Ok(())
    }

    pub fn with_parameter(mut self, spec: ParamSpec, initial: impl Into<Value>) -> Result<Self> {
        self.add_parameter(spec, initial)?;
        Ok(self)
    }

    /// Current value of the parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).map(|p| &p.value)
    }

    /// Declared parameters, sorted by name.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn parameter_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.get(name).map(|p| &p.spec)
    }

    /// Validate `raw` against the parameter's type and store it.
    ///
    /// Nothing is written when validation fails.
    pub fn set_parameter(&mut self, name: &str, raw: &str) -> Result<&Value> {
        let param = self.parameters.get_mut(name).ok_or_else(|| ShellError::ParameterNotFound {
            group: PARAMETER_GROUP.to_string(),
            name: name.to_string(),
        })?;
        param.value = param.spec.ty.coerce(name, raw)?;
        Ok(&param.value)
    }

    /// Install the function computing this node's status line for `ls`.
    pub fn set_summary(&mut self, f: impl Fn(&Node) -> Summary + 'static) {
        self.summary = Some(Rc::new(f));
    }

    pub fn with_summary(mut self, f: impl Fn(&Node) -> Summary + 'static) -> Self {
        self.set_summary(f);
        self
    }

    /// The node's status line; an empty, unknown-health summary if none is installed.
    pub fn summary(&self) -> Summary {
        match &self.summary {
            Some(f) => f(self),
            None => Summary::default(),
        }
    }

    /// Look up the node at `path`, treating `self` as the root.
    pub fn node_at(&self, path: &NodePath) -> Result<&Node> {
        let mut node = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            node = node.child(segment).ok_or_else(|| not_found(path, depth))?;
        }
        Ok(node)
    }

    pub fn node_at_mut(&mut self, path: &NodePath) -> Result<&mut Node> {
        let mut node = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            node = node.child_mut(segment).ok_or_else(|| not_found(path, depth))?;
        }
        Ok(node)
    }
}

fn not_found(path: &NodePath, depth: usize) -> ShellError {
    let partial = path.segments()[..=depth].join("/");
    ShellError::PathNotFound {
        path: format!("/{}", partial),
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("children", &self.children)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
