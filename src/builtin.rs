use crate::command::CommandOutput;
use crate::completion::CompletionScope;
use crate::error::{Result, ShellError};
use crate::node::{Node, PARAMETER_GROUP};
use crate::path::{self, NodePath};
use crate::prefs::{GLOBAL_GROUP, Preferences};
use crate::render::{self, TreeStyle};
use crate::session::Session;
use crate::value::{Arguments, CommandSignature, ParamSpec, ParamType, Value};

/// Everything a builtin may look at or change while it runs.
pub(crate) struct Context<'a> {
    pub root: &'a mut Node,
    pub session: &'a mut Session,
    pub prefs: &'a mut Preferences,
    pub builtins: &'a Builtins,
}

impl Context<'_> {
    fn current(&self) -> &NodePath {
        self.session.current()
    }

    fn current_node(&self) -> Result<&Node> {
        self.root.node_at(self.session.current())
    }

    fn resolve(&self, input: &str) -> Result<NodePath> {
        path::resolve_bookmarked(&*self.root, self.session.current(), input, &self.prefs.bookmarks)
    }
}

/// Commands available on every node.
///
/// Builtins are matched against their signature like node commands and run
/// directly against the shell state. A node command with the same name hides
/// the builtin on that node.
pub(crate) trait BuiltinCommand {
    fn signature(&self) -> CommandSignature;

    fn description(&self) -> &'static str;

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput>;

    /// Candidates for the word under the cursor beyond those the signature
    /// yields. `typed` holds the argument words before it, `node` is where
    /// the command would run.
    fn complete(&self, _scope: &CompletionScope<'_>, _node: &Node, _typed: &[String], _word: &str) -> Vec<String> {
        Vec::new()
    }
}

pub(crate) struct Builtin {
    pub signature: CommandSignature,
    pub command: Box<dyn BuiltinCommand>,
}

/// The set of builtins known to a shell.
pub struct Builtins {
    commands: Vec<Builtin>,
}

impl Default for Builtins {
    fn default() -> Self {
        let commands: Vec<Box<dyn BuiltinCommand>> = vec![
            Box::new(Bookmarks),
            Box::new(Cd),
            Box::new(Exit),
            Box::new(Get),
            Box::new(Help),
            Box::new(Ls),
            Box::new(Pwd),
            Box::new(Set),
        ];
        Self {
            commands: commands
                .into_iter()
                .map(|command| Builtin {
                    signature: command.signature(),
                    command,
                })
                .collect(),
        }
    }
}

impl Builtins {
    /// Names of all builtins, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|b| b.signature.name.as_str())
    }

    /// Signature of the builtin `name`, used for binding, `help` and completion.
    pub fn signature(&self, name: &str) -> Option<&CommandSignature> {
        self.get(name).map(|b| &b.signature)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Builtin> {
        self.commands.iter().find(|b| b.signature.name == name)
    }
}

struct Cd;

impl BuiltinCommand for Cd {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("cd").optional("path", ParamType::Path)
    }

    fn description(&self) -> &'static str {
        "Change the current node. Without a path, go to the root node. \
         'cd <' and 'cd >' move back and forward through previously visited nodes."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        match args.get_str("path") {
            None => Ok(CommandOutput::Navigate(NodePath::root())),
            Some("<") => step_history(ctx, true),
            Some(">") => step_history(ctx, false),
            Some(input) => Ok(CommandOutput::Navigate(ctx.resolve(input)?)),
        }
    }

    fn complete(&self, _scope: &CompletionScope<'_>, _node: &Node, typed: &[String], _word: &str) -> Vec<String> {
        if typed.is_empty() {
            vec!["<".to_string(), ">".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Move through the path history, skipping entries that no longer exist.
fn step_history(ctx: &mut Context<'_>, back: bool) -> Result<CommandOutput> {
    let found = ctx
        .prefs
        .history_candidates(back)
        .into_iter()
        .find_map(|(index, text)| {
            let path = NodePath::parse_absolute(text).ok()?;
            ctx.root.node_at(&path).ok()?;
            Some((index, path))
        });
    match found {
        Some((index, path)) => {
            ctx.prefs.path_history_index = index;
            ctx.session.set_current(path);
            Ok(CommandOutput::None)
        }
        None => {
            let edge = if back { "beginning" } else { "end" };
            Err(ShellError::Command(format!("Reached the {} of the path history", edge)))
        }
    }
}

struct Ls;

impl BuiltinCommand for Ls {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("ls")
            .optional_with_default("path", ParamType::Path, ".")
            .optional_with_default("depth", ParamType::Number { min: Some(0), max: None }, 0)
    }

    fn description(&self) -> &'static str {
        "Display the tree below a node. A depth of 0 uses the tree_max_depth preference."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        let target = ctx.resolve(args.get_str("path").unwrap_or("."))?;
        let style = TreeStyle::from_prefs(ctx.prefs, args.get_int("depth").unwrap_or(0));
        let node = ctx.root.node_at(&target)?;
        Ok(CommandOutput::Text(render::render_tree(node, &style)))
    }
}

struct Pwd;

impl BuiltinCommand for Pwd {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("pwd")
    }

    fn description(&self) -> &'static str {
        "Display the path of the current node."
    }

    fn execute(&self, _args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        Ok(CommandOutput::Text(ctx.current().to_string()))
    }
}

struct Exit;

impl BuiltinCommand for Exit {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("exit")
    }

    fn description(&self) -> &'static str {
        "Leave the shell."
    }

    fn execute(&self, _args: &Arguments, _ctx: &mut Context<'_>) -> Result<CommandOutput> {
        Ok(CommandOutput::Exit)
    }
}

const GENERAL_HELP: &str = "\
GENERAL SYNTAX
==============
[PATH] COMMAND [POSITIONAL_PARAMETER]... [PARAMETER=VALUE]...

PATH addresses a node, either absolute (/storage/disks), relative (disks,
../net) or from a bookmark (@name). Given alone, it makes that node current;
given before a command, it makes the node current and runs the command there.
Parameters are matched by position or set with PARAMETER=VALUE in any order.
Use quotes for values containing spaces. Press TAB to complete.";

struct Help;

impl BuiltinCommand for Help {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("help").optional("topic", ParamType::String)
    }

    fn description(&self) -> &'static str {
        "Display general help, or the syntax and description of a command."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        let node = ctx.current_node()?;
        let Some(topic) = args.get_str("topic") else {
            let mut syntaxes: Vec<String> = node
                .list_commands()
                .into_iter()
                .filter_map(|name| node.get_command(name).ok())
                .map(|c| c.signature().syntax())
                .collect();
            syntaxes.extend(
                ctx.builtins
                    .commands
                    .iter()
                    .filter(|b| !node.has_command(&b.signature.name))
                    .map(|b| b.signature.syntax()),
            );
            syntaxes.sort();
            let listing: Vec<String> = syntaxes.iter().map(|s| format!("  - {}", s)).collect();
            return Ok(CommandOutput::Text(format!(
                "{}\n\nAVAILABLE COMMANDS\n==================\n{}",
                GENERAL_HELP,
                listing.join("\n")
            )));
        };

        let (signature, description) = if let Ok(command) = node.get_command(topic) {
            (command.signature().clone(), command.description().to_string())
        } else if let Some(builtin) = ctx.builtins.get(topic) {
            (builtin.signature.clone(), builtin.command.description().to_string())
        } else {
            return Err(ShellError::TopicNotFound(topic.to_string()));
        };

        let mut text = format!("SYNTAX\n======\n{}\n", signature.syntax());
        let defaults = signature.defaults();
        if !defaults.is_empty() {
            text.push_str(&format!("\nDEFAULT VALUES\n==============\n{}\n", defaults.join(" ")));
        }
        text.push_str(&format!("\nDESCRIPTION\n===========\n{}", description));
        Ok(CommandOutput::Text(text))
    }

    fn complete(&self, scope: &CompletionScope<'_>, node: &Node, typed: &[String], _word: &str) -> Vec<String> {
        if typed.is_empty() {
            scope.command_names(node)
        } else {
            Vec::new()
        }
    }
}

struct Bookmarks;

impl BuiltinCommand for Bookmarks {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("bookmarks")
            .required("action", ParamType::choice(["add", "del", "go", "show"]))
            .optional("bookmark", ParamType::String)
    }

    fn description(&self) -> &'static str {
        "Manage bookmarks. 'add' stores the current node under a name, 'del' removes \
         a bookmark, 'go' makes a bookmarked node current and 'show' lists bookmarks. \
         A bookmark can also be used as a path: @name."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        let action = args.get_str("action").unwrap_or("show");
        if action == "show" {
            if ctx.prefs.bookmarks.is_empty() {
                return Ok(CommandOutput::Text("No bookmarks yet.".to_string()));
            }
            let lines: Vec<String> = ctx
                .prefs
                .bookmarks
                .iter()
                .map(|(name, path)| format!("{} {}", name, path))
                .collect();
            return Ok(CommandOutput::Text(lines.join("\n")));
        }

        let name = args
            .get_str("bookmark")
            .ok_or_else(|| ShellError::validation("bookmark", format!("a bookmark name is required to {}", action)))?;
        match action {
            "add" => {
                let current = ctx.current().clone();
                ctx.prefs.add_bookmark(name, &current)?;
                Ok(CommandOutput::Text(format!("Bookmarked {} as {}.", current, name)))
            }
            "del" => {
                ctx.prefs.remove_bookmark(name)?;
                Ok(CommandOutput::Text(format!("Deleted bookmark {}.", name)))
            }
            _ => {
                let target = ctx.prefs.bookmark(name)?;
                ctx.root.node_at(&target)?;
                Ok(CommandOutput::Navigate(target))
            }
        }
    }

    fn complete(&self, scope: &CompletionScope<'_>, _node: &Node, typed: &[String], _word: &str) -> Vec<String> {
        match typed {
            [action] if action == "del" || action == "go" => scope.bookmarks.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

const GROUPS: [&str; 2] = [GLOBAL_GROUP, PARAMETER_GROUP];

fn list_groups() -> CommandOutput {
    let lines: Vec<String> = GROUPS.iter().map(|g| format!("  - {}", g)).collect();
    CommandOutput::Text(format!("AVAILABLE CONFIGURATION GROUPS\n{}", lines.join("\n")))
}

/// Parameter declarations of a group as seen from `node`; empty for unknown groups.
fn group_specs(node: &Node, group: &str) -> Vec<ParamSpec> {
    match group {
        GLOBAL_GROUP => Preferences::global_specs(),
        PARAMETER_GROUP => node.parameters().map(|p| p.spec.clone()).collect(),
        _ => Vec::new(),
    }
}

/// Declared parameters of a group on the current node, with their current values.
fn group_params(ctx: &Context<'_>, group: &str) -> Result<Vec<(ParamSpec, Value)>> {
    match group {
        GLOBAL_GROUP => Preferences::global_specs()
            .into_iter()
            .map(|spec| {
                let value = ctx.prefs.get_global(&spec.name)?;
                Ok((spec, value))
            })
            .collect(),
        PARAMETER_GROUP => Ok(ctx
            .current_node()?
            .parameters()
            .map(|p| (p.spec.clone(), p.value.clone()))
            .collect()),
        _ => Err(ShellError::GroupNotFound(group.to_string())),
    }
}

struct Get;

impl BuiltinCommand for Get {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("get")
            .optional("group", ParamType::String)
            .variadic("parameter")
    }

    fn description(&self) -> &'static str {
        "Show configuration parameters. Without a group, list the groups; \
         without parameter names, show every parameter of the group."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        let Some(group) = args.get_str("group") else {
            return Ok(list_groups());
        };
        let params = group_params(ctx, group)?;
        let wanted: Vec<String> = args.rest().iter().map(Value::to_string).collect();
        let mut lines = Vec::new();
        if wanted.is_empty() {
            if params.is_empty() {
                return Ok(CommandOutput::Text(format!("No parameters in group {}.", group)));
            }
            lines.push(format!("{} CONFIG GROUP", group.to_uppercase()));
            for (spec, value) in &params {
                lines.push(format!("{}={}", spec.name, value));
            }
        } else {
            for name in &wanted {
                let (spec, value) = params
                    .iter()
                    .find(|(spec, _)| &spec.name == name)
                    .ok_or_else(|| ShellError::ParameterNotFound {
                        group: group.to_string(),
                        name: name.clone(),
                    })?;
                lines.push(format!("{}={}", spec.name, value));
            }
        }
        Ok(CommandOutput::Text(lines.join("\n")))
    }

    fn complete(&self, _scope: &CompletionScope<'_>, node: &Node, typed: &[String], _word: &str) -> Vec<String> {
        let Some((group, wanted)) = typed.split_first() else {
            return GROUPS.iter().map(|g| g.to_string()).collect();
        };
        group_specs(node, group)
            .into_iter()
            .map(|spec| spec.name)
            .filter(|name| !wanted.contains(name))
            .collect()
    }
}

struct Set;

impl BuiltinCommand for Set {
    fn signature(&self) -> CommandSignature {
        CommandSignature::new("set")
            .optional("group", ParamType::String)
            .free_keywords()
    }

    fn description(&self) -> &'static str {
        "Set configuration parameters. Every value is checked against the \
         parameter's type; if any check fails, nothing is written."
    }

    fn execute(&self, args: &Arguments, ctx: &mut Context<'_>) -> Result<CommandOutput> {
        let Some(group) = args.get_str("group") else {
            return Ok(list_groups());
        };
        let params = group_params(ctx, group)?;
        let assignments: Vec<(String, String)> = args
            .keyword()
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        if assignments.is_empty() {
            let lines: Vec<String> = params
                .iter()
                .map(|(spec, _)| format!("{}={} {}", spec.name, spec.ty.syntax(), spec.description))
                .map(|line| line.trim_end().to_string())
                .collect();
            return Ok(CommandOutput::Text(lines.join("\n")));
        }

        for (name, raw) in &assignments {
            let (spec, _) = params
                .iter()
                .find(|(spec, _)| spec.name == *name)
                .ok_or_else(|| ShellError::ParameterNotFound {
                    group: group.to_string(),
                    name: name.clone(),
                })?;
            spec.ty.coerce(name, raw)?;
        }

        let mut lines = Vec::new();
        for (name, raw) in &assignments {
            let value = if group == GLOBAL_GROUP {
                ctx.prefs.set_global(name, raw)?
            } else {
                let path = ctx.current().clone();
                ctx.root.node_at_mut(&path)?.set_parameter(name, raw)?.clone()
            };
            lines.push(format!("Parameter {} is now '{}'.", name, value));
        }
        Ok(CommandOutput::Text(lines.join("\n")))
    }

    fn complete(&self, _scope: &CompletionScope<'_>, node: &Node, typed: &[String], word: &str) -> Vec<String> {
        let Some((group, assigned)) = typed.split_first() else {
            return GROUPS.iter().map(|g| g.to_string()).collect();
        };
        let specs = group_specs(node, group);
        if let Some((key, _)) = word.split_once('=') {
            return specs
                .iter()
                .filter(|spec| spec.name == key)
                .flat_map(|spec| spec.ty.domain().unwrap_or_default())
                .map(|value| format!("{}={}", key, value))
                .collect();
        }
        let taken: Vec<&str> = assigned
            .iter()
            .filter_map(|a| a.split_once('=').map(|(key, _)| key))
            .collect();
        specs
            .into_iter()
            .filter(|spec| !taken.contains(&spec.name.as_str()))
            .map(|spec| format!("{}=", spec.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lexer;
    use crate::parser;

    struct Fixture {
        root: Node,
        session: Session,
        prefs: Preferences,
        builtins: Builtins,
    }

    impl Fixture {
        fn new() -> Self {
            let disk = Node::new("disk0")
                .with_parameter(ParamSpec::new("size", ParamType::range(1, 100)), 10)
                .unwrap()
                .with_parameter(ParamSpec::new("label", ParamType::String), "data")
                .unwrap();
            let root = Node::root()
                .with_child(Node::new("storage").with_child(disk).unwrap())
                .unwrap()
                .with_child(Node::new("net"))
                .unwrap();
            Self {
                root,
                session: Session::new(),
                prefs: Preferences::default(),
                builtins: Builtins::default(),
            }
        }

        fn at(mut self, path: &str) -> Self {
            self.session.set_current(NodePath::parse_absolute(path).unwrap());
            self
        }

        fn run(&mut self, name: &str, line: &str) -> Result<CommandOutput> {
            let builtin = self.builtins.get(name).unwrap();
            let tokens = lexer::split_into_tokens(line)?;
            let args = parser::bind(&builtin.signature, &tokens)?;
            let mut ctx = Context {
                root: &mut self.root,
                session: &mut self.session,
                prefs: &mut self.prefs,
                builtins: &self.builtins,
            };
            builtin.command.execute(&args, &mut ctx)
        }

        fn text(&mut self, name: &str, line: &str) -> String {
            match self.run(name, line).unwrap() {
                CommandOutput::Text(text) => text,
                other => panic!("expected text, got {other:?}"),
            }
        }
    }

    fn navigate_to(out: CommandOutput) -> String {
        match out {
            CommandOutput::Navigate(path) => path.to_string(),
            other => panic!("expected navigation, got {other:?}"),
        }
    }

    #[test]
    fn cd_resolves_relative_to_current() {
        let mut fx = Fixture::new().at("/storage");
        assert_eq!(navigate_to(fx.run("cd", "disk0").unwrap()), "/storage/disk0");
        assert_eq!(navigate_to(fx.run("cd", "").unwrap()), "/");
        assert_eq!(fx.run("cd", "nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn cd_walks_path_history() {
        let mut fx = Fixture::new();
        for path in ["/", "/storage", "/storage/disk0", "/net"] {
            let path = NodePath::parse_absolute(path).unwrap();
            fx.session.navigate(path, &mut fx.prefs);
        }
        fx.run("cd", "<").unwrap();
        assert_eq!(fx.session.current().to_string(), "/storage/disk0");
        fx.run("cd", "<").unwrap();
        assert_eq!(fx.session.current().to_string(), "/storage");
        fx.run("cd", ">").unwrap();
        assert_eq!(fx.session.current().to_string(), "/storage/disk0");

        // entries that no longer exist are skipped
        fx.root.child_mut("storage").unwrap().remove_child("disk0").unwrap();
        fx.run("cd", ">").unwrap();
        assert_eq!(fx.session.current().to_string(), "/net");
        assert_eq!(fx.run("cd", ">").unwrap_err().kind(), ErrorKind::Command);
    }

    #[test]
    fn pwd_and_ls() {
        let mut fx = Fixture::new().at("/storage");
        assert_eq!(fx.text("pwd", ""), "/storage");
        fx.prefs.tree_status_mode = false;
        assert_eq!(fx.text("ls", ""), "o- storage\n  o- disk0");
        assert_eq!(fx.text("ls", "/ 1"), "o- /\n  o- net\n  o- storage");
    }

    #[test]
    fn help_lists_and_describes_commands() {
        let mut fx = Fixture::new();
        let general = fx.text("help", "");
        assert!(general.contains("GENERAL SYNTAX"));
        assert!(general.contains("  - bookmarks action [bookmark]"));
        let ls = fx.text("help", "ls");
        assert!(ls.contains("ls [path] [depth]"));
        assert!(ls.contains("path=. depth=0"));
        assert_eq!(fx.run("help", "nothing").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bookmarks_add_go_and_delete() {
        let mut fx = Fixture::new().at("/storage/disk0");
        fx.run("bookmarks", "add disk").unwrap();
        assert_eq!(fx.text("bookmarks", "show"), "disk /storage/disk0");
        assert!(fx.run("bookmarks", "add disk").is_err());
        assert_eq!(navigate_to(fx.run("bookmarks", "go disk").unwrap()), "/storage/disk0");
        fx.run("bookmarks", "del disk").unwrap();
        assert_eq!(fx.run("bookmarks", "go disk").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(fx.run("bookmarks", "add").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(fx.run("bookmarks", "rename x").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn get_reads_groups_and_parameters() {
        let mut fx = Fixture::new().at("/storage/disk0");
        assert!(fx.text("get", "").contains("- parameter"));
        assert_eq!(fx.text("get", "parameter size"), "size=10");
        assert_eq!(fx.text("get", "global prompt_length tree_round_nodes"), "prompt_length=30\ntree_round_nodes=true");
        assert!(fx.text("get", "parameter").contains("label=data"));
        assert_eq!(fx.run("get", "colours").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(fx.run("get", "parameter colour").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn set_validates_every_value_before_writing() {
        let mut fx = Fixture::new().at("/storage/disk0");
        assert_eq!(fx.text("set", "parameter size=20"), "Parameter size is now '20'.");

        let err = fx.run("set", "parameter label=backup size=500").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let disk = NodePath::parse_absolute("/storage/disk0").unwrap();
        let node = fx.root.node_at(&disk).unwrap();
        assert_eq!(node.parameter("size"), Some(&Value::Int(20)));
        assert_eq!(node.parameter("label"), Some(&Value::from("data")));

        fx.text("set", "global tree_max_depth=2");
        assert_eq!(fx.prefs.tree_max_depth, 2);
        assert!(fx.text("set", "global").contains("prompt_length=NUMBER"));
    }
}
