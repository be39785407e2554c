//! Typed parameter values and command signatures.

use crate::error::{Result, ShellError};
use std::collections::BTreeMap;
use std::fmt;

/// A value after type coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// The declared type of a parameter, with its validation rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    /// Integer, optionally bounded (inclusive).
    Number { min: Option<i64>, max: Option<i64> },
    /// `true` or `false`.
    Bool,
    /// One of an enumerated set of words.
    Choice(Vec<String>),
    /// A node path; kept as text, completed against the tree.
    Path,
}

impl ParamType {
    pub fn number() -> Self {
        ParamType::Number {
            min: None,
            max: None,
        }
    }

    pub fn range(min: i64, max: i64) -> Self {
        ParamType::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn choice<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Choice(values.into_iter().map(Into::into).collect())
    }

    /// Short syntax description used in help output, e.g. `NUMBER` or `true|false`.
    pub fn syntax(&self) -> String {
        match self {
            ParamType::String => "STRING".to_string(),
            ParamType::Number { min: Some(lo), max: Some(hi) } => format!("NUMBER({}..{})", lo, hi),
            ParamType::Number { .. } => "NUMBER".to_string(),
            ParamType::Path => "PATH".to_string(),
            ParamType::Bool | ParamType::Choice(_) => self.domain().unwrap_or_default().join("|"),
        }
    }

    /// Legal values for enumerated types.
    pub fn domain(&self) -> Option<Vec<String>> {
        match self {
            ParamType::Bool => Some(vec!["true".to_string(), "false".to_string()]),
            ParamType::Choice(values) => Some(values.clone()),
            _ => None,
        }
    }

    /// Coerce raw input text into a typed value, checking the type's rules.
    ///
    /// `field` names the parameter in the resulting validation error.
    pub fn coerce(&self, field: &str, raw: &str) -> Result<Value> {
        match self {
            ParamType::String | ParamType::Path => Ok(Value::Str(raw.to_string())),
            ParamType::Number { min, max } => {
                let n: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ShellError::validation(field, format!("'{}' is not a NUMBER", raw)))?;
                if let Some(lo) = min {
                    if n < *lo {
                        return Err(ShellError::validation(field, format!("{} is below the minimum {}", n, lo)));
                    }
                }
                if let Some(hi) = max {
                    if n > *hi {
                        return Err(ShellError::validation(field, format!("{} is above the maximum {}", n, hi)));
                    }
                }
                Ok(Value::Int(n))
            }
            ParamType::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(ShellError::validation(field, format!("'{}' is not true|false", raw))),
            },
            ParamType::Choice(values) => {
                if values.iter().any(|v| v == raw) {
                    Ok(Value::Str(raw.to_string()))
                } else {
                    Err(ShellError::validation(field, format!("'{}' is not {}", raw, values.join("|"))))
                }
            }
        }
    }
}

/// Declaration of a single command or node parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// The declared shape of an invocable command.
///
/// Required positionals always precede optional ones; [`CommandSignature::validate`]
/// enforces this when the command is registered on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSignature {
    pub name: String,
    pub positionals: Vec<ParamSpec>,
    pub keywords: Vec<ParamSpec>,
    /// Name of a catch-all for extra positional arguments, if accepted.
    pub variadic: Option<String>,
    /// Whether arbitrary `key=value` arguments are accepted.
    pub free_keywords: bool,
}

impl CommandSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            positionals: Vec::new(),
            keywords: Vec::new(),
            variadic: None,
            free_keywords: false,
        }
    }

    /// Append a required positional parameter.
    pub fn required(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        let mut spec = ParamSpec::new(name, ty);
        spec.required = true;
        self.positionals.push(spec);
        self
    }

    /// Append an optional positional parameter.
    pub fn optional(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.positionals.push(ParamSpec::new(name, ty));
        self
    }

    /// Append an optional positional parameter with a default value.
    pub fn optional_with_default(mut self, name: impl Into<String>, ty: ParamType, default: impl Into<Value>) -> Self {
        let mut spec = ParamSpec::new(name, ty);
        spec.default = Some(default.into());
        self.positionals.push(spec);
        self
    }

    /// Add a keyword parameter. Keyword parameters are only set with `name=value`.
    pub fn keyword(mut self, name: impl Into<String>, ty: ParamType, default: Option<Value>) -> Self {
        let mut spec = ParamSpec::new(name, ty);
        spec.default = default;
        self.keywords.push(spec);
        self
    }

    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.variadic = Some(name.into());
        self
    }

    pub fn free_keywords(mut self) -> Self {
        self.free_keywords = true;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.positionals
            .iter()
            .chain(self.keywords.iter())
            .find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen_optional = false;
        for spec in &self.positionals {
            if spec.required && seen_optional {
                return Err(ShellError::InvalidSignature(format!(
                    "{}: required parameter '{}' follows an optional one",
                    self.name, spec.name
                )));
            }
            seen_optional |= !spec.required;
        }
        let mut names: Vec<&str> = self
            .positionals
            .iter()
            .chain(self.keywords.iter())
            .map(|p| p.name.as_str())
            .collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ShellError::InvalidSignature(format!(
                "{}: parameter '{}' declared twice",
                self.name, w[0]
            )));
        }
        Ok(())
    }

    /// One-line syntax summary, e.g. `create name [size] [size=NUMBER]`.
    pub fn syntax(&self) -> String {
        let mut parts = vec![self.name.clone()];
        for p in &self.positionals {
            if p.required {
                parts.push(p.name.clone());
            } else {
                parts.push(format!("[{}]", p.name));
            }
        }
        if let Some(rest) = &self.variadic {
            parts.push(format!("[{}...]", rest));
        }
        for k in &self.keywords {
            parts.push(format!("[{}={}]", k.name, k.ty.syntax()));
        }
        if self.free_keywords {
            parts.push("[parameter=value...]".to_string());
        }
        parts.join(" ")
    }

    /// Default values rendered as `name=value` pairs.
    pub fn defaults(&self) -> Vec<String> {
        self.positionals
            .iter()
            .chain(self.keywords.iter())
            .filter_map(|p| p.default.as_ref().map(|d| format!("{}={}", p.name, d)))
            .collect()
    }
}

/// Arguments bound to a command signature, ready for a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
    positional_names: Vec<String>,
}

impl Arguments {
    pub(crate) fn new(positional: Vec<Value>, keyword: BTreeMap<String, Value>, positional_names: Vec<String>) -> Self {
        Self {
            positional,
            keyword,
            positional_names,
        }
    }

    /// Positional values in order, including any variadic tail.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    /// Values beyond the declared positional parameters.
    pub fn rest(&self) -> &[Value] {
        let declared = self.positional_names.len().min(self.positional.len());
        &self.positional[declared..]
    }

    /// Look up a parameter by name, positional or keyword.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.positional_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.positional.get(i))
            .or_else(|| self.keyword.get(name))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }
}
