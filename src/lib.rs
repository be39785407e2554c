//! Building blocks for filesystem-like interactive configuration shells.
//!
//! An application describes its configuration as a tree of [`Node`]s, each
//! with children, commands and typed parameters, and hands the root to a
//! [`Shell`]. The shell lets the user move around the tree like a directory
//! hierarchy, run commands with positional and `key=value` arguments, and
//! complete names with TAB.
//!
//! ```
//! use configshell::{Command, CommandOutput, CommandSignature, Node, ParamType, Shell};
//!
//! let hello = Command::from_fn(
//!     CommandSignature::new("hello").required("who", ParamType::String),
//!     |_node, args| Ok(CommandOutput::Text(format!("hello {}", args.get_str("who").unwrap_or("?")))),
//! );
//! let root = Node::root().with_child(Node::new("greeter").with_command(hello)?)?;
//! let mut shell = Shell::new(root);
//! assert_eq!(shell.execute("greeter hello world")?, CommandOutput::Text("hello world".into()));
//! assert_eq!(shell.current().to_string(), "/greeter");
//! # Ok::<(), configshell::ShellError>(())
//! ```

pub mod builtin;
pub mod command;
pub mod completion;
pub mod error;
pub mod io_adapters;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod path;
pub mod prefs;
pub mod render;
pub mod session;
pub mod shell;
pub mod value;

pub use command::{ArgumentCompleter, Command, CommandHandler, CommandOutput};
pub use error::{ErrorKind, ShellError};
pub use node::{Node, Summary};
pub use path::NodePath;
pub use prefs::Preferences;
pub use shell::Shell;
pub use value::{Arguments, CommandSignature, ParamSpec, ParamType, Value};
