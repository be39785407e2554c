//! Command grammar: `[PATH[*]] COMMAND [POSITIONAL...] [KEYWORD=VALUE...]`.
//!
//! Parsing happens in two stages. [`split_line`] separates an optional leading
//! navigation target and the command name from the argument tokens, using the
//! current node to settle whether a bare first word is a child to navigate to
//! or a command. [`bind`] then matches argument tokens against the command's
//! signature, coercing and validating every value before anything runs.

use crate::error::{Result, ShellError};
use crate::lexer::{self, Token};
use crate::path;
use crate::value::{Arguments, CommandSignature, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static COMMAND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("command name pattern"));
static KEYWORD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("keyword name pattern"));

/// What the parser needs to know about the node a line is typed on.
pub trait Scope {
    fn has_child(&self, name: &str) -> bool;
    fn has_command(&self, name: &str) -> bool;
}

/// A line split into its grammatical parts, before binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Navigation target typed before the command, if any, without the
    /// all-children suffix.
    pub path: Option<Token>,
    /// Set when the path ended in `*`: the command runs on each child of the
    /// path instead of on the path itself.
    pub all_children: bool,
    pub command: Option<Token>,
    pub args: Vec<Token>,
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.command.is_none()
    }
}

/// Whether the first token of a line is a navigation target.
///
/// Path-like words (`/x`, `./x`, `../x`, `.`, `..`, `@bookmark`, `a/b`) always
/// navigate. A bare word navigates only when it names a child of the current
/// node and no command of that name exists there, unless it carries the
/// all-children suffix (`storage*`, `*`). Quoted words never navigate.
pub fn is_navigation(token: &Token, scope: &dyn Scope) -> bool {
    let Some(text) = token.bare() else {
        return false;
    };
    let (text, all) = path::strip_all_children(text);
    if path::is_path_like(text) {
        return true;
    }
    scope.has_child(text) && (all || !scope.has_command(text))
}

/// Tokenize and split a full line.
pub fn parse_line(line: &str, scope: &dyn Scope) -> Result<CommandLine> {
    let tokens = lexer::split_into_tokens(line)?;
    split_line(tokens, scope)
}

pub fn split_line(tokens: Vec<Token>, scope: &dyn Scope) -> Result<CommandLine> {
    let mut tokens = tokens.into_iter();
    let mut path = None;
    let mut command = None;
    let mut all_children = false;

    if let Some(first) = tokens.next() {
        if is_navigation(&first, scope) {
            let (text, all) = path::strip_all_children(&first.text);
            let text = text.to_string();
            all_children = all;
            path = Some(Token { text, ..first });
            command = tokens.next();
        } else {
            command = Some(first);
        }
    }

    if let Some(cmd) = &command {
        let valid = cmd.bare().is_some_and(|text| COMMAND_NAME.is_match(text));
        if !valid {
            return Err(ShellError::parse(
                cmd.offset,
                format!("'{}' is not a valid command name", cmd.text),
            ));
        }
    }

    let line = CommandLine {
        path,
        all_children,
        command,
        args: tokens.collect(),
    };
    log::debug!(
        "split line: path={:?}{} command={:?} args={}",
        line.path.as_ref().map(|t| &t.text),
        if line.all_children { "*" } else { "" },
        line.command.as_ref().map(|t| &t.text),
        line.args.len()
    );
    Ok(line)
}

/// The `key=value` reading of a token, when `key` is a keyword the signature
/// recognizes. Any other token, `=` included, is a literal word.
pub fn keyword_of<'t>(sig: &CommandSignature, token: &'t Token) -> Option<(&'t str, &'t str)> {
    let (key, value) = token.key_value()?;
    if !KEYWORD_NAME.is_match(key) {
        return None;
    }
    if sig.param(key).is_some() || sig.free_keywords {
        Some((key, value))
    } else {
        None
    }
}

/// Match argument tokens against `sig`.
///
/// Grammar problems (extra arguments, a parameter given twice) are parse
/// errors at the offending token. Missing required parameters and values
/// that fail their type checks are validation errors naming the field.
pub fn bind(sig: &CommandSignature, args: &[Token]) -> Result<Arguments> {
    let mut raw_positional: Vec<&Token> = Vec::new();
    let mut raw_keywords: Vec<(&Token, &str, &str)> = Vec::new();

    for token in args {
        match keyword_of(sig, token) {
            Some((key, value)) => {
                if raw_keywords.iter().any(|(_, k, _)| *k == key) {
                    return Err(ShellError::parse(token.offset, format!("parameter '{}' given twice", key)));
                }
                raw_keywords.push((token, key, value));
            }
            None => raw_positional.push(token),
        }
    }

    let declared = sig.positionals.len();
    if raw_positional.len() > declared && sig.variadic.is_none() {
        let extra = raw_positional[declared];
        return Err(ShellError::parse(
            extra.offset,
            format!("unexpected argument '{}' for {}", extra.text, sig.name),
        ));
    }

    let mut slots: Vec<Option<&str>> = vec![None; declared];
    for (slot, token) in slots.iter_mut().zip(raw_positional.iter()) {
        *slot = Some(token.text.as_str());
    }
    let mut keyword_raw: Vec<(&str, &str)> = Vec::new();
    for (token, key, value) in &raw_keywords {
        match sig.positionals.iter().position(|p| p.name == *key) {
            Some(index) => {
                if slots[index].is_some() {
                    return Err(ShellError::parse(token.offset, format!("parameter '{}' given twice", key)));
                }
                slots[index] = Some(value);
            }
            None => keyword_raw.push((key, value)),
        }
    }

    let mut positional = Vec::new();
    let mut names = Vec::new();
    for (index, spec) in sig.positionals.iter().enumerate() {
        match slots[index] {
            Some(raw) => positional.push(spec.ty.coerce(&spec.name, raw)?),
            None if spec.required => {
                return Err(ShellError::validation(&spec.name, "missing required parameter"));
            }
            None => {
                let later_given = slots[index + 1..].iter().any(Option::is_some);
                match (&spec.default, later_given) {
                    (Some(default), _) => positional.push(default.clone()),
                    (None, true) => {
                        return Err(ShellError::validation(
                            &spec.name,
                            "must be given when later parameters are",
                        ));
                    }
                    (None, false) => break,
                }
            }
        }
        names.push(spec.name.clone());
    }
    for token in raw_positional.iter().skip(declared) {
        positional.push(Value::Str(token.text.clone()));
    }

    let mut keyword = BTreeMap::new();
    for (key, raw) in keyword_raw {
        let value = match sig.keywords.iter().find(|k| k.name == key) {
            Some(spec) => spec.ty.coerce(key, raw)?,
            None => Value::Str(raw.to_string()),
        };
        keyword.insert(key.to_string(), value);
    }
    for spec in &sig.keywords {
        if let Some(default) = &spec.default {
            keyword.entry(spec.name.clone()).or_insert_with(|| default.clone());
        }
    }

    Ok(Arguments::new(positional, keyword, names))
}
