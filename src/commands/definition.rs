//! Declarative shapes for slash-command syntax.

use std::fmt;

use serde_json::{json, Value};

use crate::config::ConfigError;

/// Value types that command args and opts can be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Str => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positional argument, bound in declaration order.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
    pub description: String,
}

impl ArgSpec {
    /// Usage fragment, e.g. `<count:int>` or `[<label:string>]`.
    fn format(&self) -> String {
        let inner = format!("<{}:{}>", self.name, self.value_type);
        if self.required {
            inner
        } else {
            format!("[{inner}]")
        }
    }
}

/// A named option, matched by `--name` or its short form.
#[derive(Debug, Clone)]
pub struct OptSpec {
    pub name: String,
    pub short: Option<char>,
    pub value_type: ValueType,
    pub multiple: bool,
    pub description: String,
}

impl OptSpec {
    /// Usage fragment, e.g. `[--count|-c <int>]` or `[--tag <string>]...`.
    fn format(&self) -> String {
        let mut format = format!("[--{}", self.name);
        if let Some(short) = self.short {
            format.push_str(&format!("|-{short}"));
        }
        match (self.value_type, self.multiple) {
            (ValueType::Bool, _) => format.push(']'),
            (vt, false) => format.push_str(&format!(" <{vt}>]")),
            (vt, true) => format.push_str(&format!(" <{vt}>]...")),
        }
        format
    }
}

/// The complete syntax of one command (or sub-command): its name, args,
/// and opts. Built with [`DefinitionBuilder`].
#[derive(Debug, Clone)]
pub struct Definition {
    name: String,
    sub_command: Option<String>,
    description: String,
    args: Vec<ArgSpec>,
    opts: Vec<OptSpec>,
}

impl Definition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.sub_command.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn opts(&self) -> &[OptSpec] {
        &self.opts
    }

    /// One-line-per-opt usage string, e.g.
    /// `/deploy <env:string>` followed by indented opt lines.
    pub fn usage(&self) -> String {
        let mut parts = vec![format!("/{}", self.name)];
        if let Some(sub) = &self.sub_command {
            parts.push(sub.clone());
        }
        for arg in &self.args {
            parts.push(arg.format());
        }

        let mut usage = parts.join(" ");
        for opt in &self.opts {
            usage.push_str(&format!("\n  {}", opt.format()));
        }
        usage
    }

    /// An ephemeral message explaining the command's usage, optionally
    /// prefixed with the error that triggered it.
    pub fn help_message(&self, error: Option<&str>) -> Value {
        let mut text = String::new();
        if let Some(error) = error {
            text.push_str(&format!(":warning: *Command Error*\n> {error}\n"));
        }
        text.push_str(&format!("*Command Usage*:\n```{}```", self.usage()));

        json!({ "response_type": "ephemeral", "text": text })
    }
}

/// Fluent builder for [`Definition`].
#[derive(Debug, Default)]
pub struct DefinitionBuilder {
    name: Option<String>,
    sub_command: Option<String>,
    description: String,
    args: Vec<ArgSpec>,
    opts: Vec<OptSpec>,
}

impl DefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.trim_start_matches('/').to_string());
        self
    }

    pub fn sub_command(mut self, sub_command: &str) -> Self {
        self.sub_command = Some(sub_command.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn arg(mut self, name: &str, value_type: ValueType, required: bool) -> Self {
        self.args.push(ArgSpec {
            name: name.to_string(),
            value_type,
            required,
            description: String::new(),
        });
        self
    }

    pub fn opt(mut self, name: &str, value_type: ValueType, short: Option<char>) -> Self {
        self.opts.push(OptSpec {
            name: name.to_string(),
            short,
            value_type,
            multiple: false,
            description: String::new(),
        });
        self
    }

    /// A repeatable opt whose values accumulate into a list.
    pub fn multi_opt(mut self, name: &str, value_type: ValueType, short: Option<char>) -> Self {
        self.opts.push(OptSpec {
            name: name.to_string(),
            short,
            value_type,
            multiple: true,
            description: String::new(),
        });
        self
    }

    pub fn build(self) -> Result<Definition, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingCommandName)?;
        Ok(Definition {
            name,
            sub_command: self.sub_command,
            description: self.description,
            args: self.args,
            opts: self.opts,
        })
    }
}
