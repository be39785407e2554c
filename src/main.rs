use anyhow::{Context, Result};
use argh::FromArgs;
use configshell::{
    Command, CommandOutput, CommandSignature, Node, ParamSpec, ParamType, Shell, Summary, Value,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Interactive shell over a sample configuration tree.
struct Args {
    /// directory holding prefs.toml and the line history
    #[argh(option)]
    prefs_dir: Option<PathBuf>,

    /// run the commands in this file instead of starting interactively
    #[argh(option)]
    script: Option<PathBuf>,

    /// in script mode, keep going after a failing line
    #[argh(switch)]
    keep_going: bool,

    /// run a single command line and exit
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn disk(name: &str, size: i64) -> Result<Node> {
    let node = Node::new(name)
        .with_parameter(ParamSpec::new("size", ParamType::Number { min: Some(0), max: None }).describe("Size in MiB."), size)?
        .with_parameter(ParamSpec::new("readonly", ParamType::Bool).describe("Reject writes."), false)?
        .with_summary(|node| {
            let size = node.parameter("size").and_then(Value::as_int).unwrap_or(0);
            Summary::new(format!("{} MiB", size), Some(size > 0))
        });
    Ok(node)
}

fn storage() -> Result<Node> {
    let create = Command::from_fn(
        CommandSignature::new("create")
            .required("name", ParamType::String)
            .keyword("size", ParamType::Number { min: Some(0), max: None }, Some(Value::Int(0))),
        |node, args| {
            let name = args.get_str("name").unwrap_or_default();
            let size = args.get_int("size").unwrap_or(0);
            node.add_child(disk(name, size)?)?;
            Ok(CommandOutput::Text(format!("Created disk {}.", name)))
        },
    )
    .describe("Create a disk of the given size.");

    let delete = Command::from_fn(
        CommandSignature::new("delete").required("name", ParamType::String),
        |node, args| {
            let name = args.get_str("name").unwrap_or_default();
            node.remove_child(name)?;
            Ok(CommandOutput::Text(format!("Deleted disk {}.", name)))
        },
    )
    .describe("Delete a disk.")
    .with_completer(|node, typed, _word| {
        if typed.is_empty() {
            node.list_children().into_iter().map(str::to_string).collect()
        } else {
            Vec::new()
        }
    });

    let total = Command::from_fn(CommandSignature::new("total"), |node, _args| {
        let sum: i64 = node
            .children()
            .iter()
            .filter_map(|c| c.parameter("size").and_then(Value::as_int))
            .sum();
        Ok(CommandOutput::Value(Value::Int(sum)))
    })
    .describe("Total size of all disks, in MiB.");

    let storage = Node::new("storage")
        .with_command(create)?
        .with_command(delete)?
        .with_command(total)?
        .with_child(disk("disk0", 512)?)?
        .with_summary(|node| Summary::new(format!("{} disks", node.children().len()), None));
    Ok(storage)
}

fn network() -> Result<Node> {
    let mode = ParamType::choice(["dhcp", "static"]);
    let iface = Node::new("eth0")
        .with_parameter(ParamSpec::new("mode", mode).describe("Address assignment."), "dhcp")?
        .with_parameter(ParamSpec::new("mtu", ParamType::range(576, 9000)), 1500)?
        .with_summary(|node| {
            let mode = node.parameter("mode").map(Value::to_string).unwrap_or_default();
            Summary::new(mode, Some(true))
        });
    Ok(Node::new("network").with_child(iface)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();

    let root = Node::root().with_child(storage()?)?.with_child(network()?)?;
    let mut shell = Shell::new(root);
    if let Some(dir) = args.prefs_dir {
        shell = shell.with_prefs_dir(dir);
    }

    let stdout = &mut io::stdout();
    if let Some(line) = args.command {
        shell.run_script(line.as_bytes(), stdout, true)?;
    } else if let Some(path) = args.script {
        let file = File::open(&path).with_context(|| format!("cannot open script {}", path.display()))?;
        shell.run_script(BufReader::new(file), stdout, !args.keep_going)?;
    } else {
        shell.repl()?;
    }
    Ok(())
}
