//! Typed access to parsed command text.

use std::collections::HashMap;

use super::definition::Definition;
use super::parser::{ParseError, Parser};

/// A coerced arg or opt value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::List(list) => Some(list),
            _ => None,
        }
    }
}

/// The parsed args and opts of one command invocation.
#[derive(Debug, Clone)]
pub struct Input {
    values: HashMap<String, ArgValue>,
}

impl Input {
    pub fn parse(text: &str, definition: &Definition) -> Result<Self, ParseError> {
        Ok(Input { values: Parser::new(definition).parse(text)? })
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(ArgValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(ArgValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ArgValue::as_float)
    }

    /// Whether a bool opt was set. Missing bool opts parse as `false`, so
    /// this is `false` rather than `None` for flags the user left off.
    pub fn get_bool(&self, name: &str) -> bool {
        self.values.get(name).and_then(ArgValue::as_bool).unwrap_or(false)
    }

    pub fn get_list(&self, name: &str) -> Option<&[ArgValue]> {
        self.values.get(name).and_then(ArgValue::as_list)
    }
}
