//! Tokenizer and binder for command text.
//!
//! Parsing happens in two stages: [`tokenize`] splits raw text into
//! shell-style tokens (honoring quotes, escapes, and smart quotes pasted
//! from chat clients), then [`Parser`] binds the tokens to a
//! [`Definition`], coercing values to their declared types.

use std::collections::HashMap;

use thiserror::Error;

use super::definition::{Definition, OptSpec, ValueType};
use super::input::ArgValue;
use super::token::Token;

/// Why command text failed to parse. The message of each variant is
/// user-facing: it ends up in the help message sent back to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated quote in command text")]
    UnterminatedQuote,

    #[error("input does not match the defined sub-command: `{0}`")]
    SubCommandMismatch(String),

    #[error("missing required arg: `{0}`")]
    MissingRequiredArg(String),

    #[error("too many args provided: no arg defined for `{0}`")]
    TooManyArgs(String),

    #[error("invalid opt provided: `{0}`")]
    UnknownOpt(String),

    #[error("expected value for opt `{0}`")]
    MissingOptValue(String),

    #[error("invalid value (`{value}`) for `{name}`; should be type: `{expected}`")]
    InvalidValue {
        name: String,
        expected: ValueType,
        value: String,
    },
}

/// Splits command text into `(token, quoted)` pairs. A token is `quoted`
/// only when it starts with a quote character; quoting anywhere keeps the
/// quoted content in the same token, so `--msg="a b"` is one token.
pub fn tokenize(input: &str) -> Result<Vec<(String, bool)>, ParseError> {
    // Chat clients routinely replace typed quotes with smart quotes.
    let normalized: String = input
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    let mut tokens = Vec::new();
    let mut chars = normalized.chars().peekable();
    while let Some(&first) = chars.peek() {
        if first.is_whitespace() {
            chars.next();
            continue;
        }

        let quoted = first == '"' || first == '\'';
        let mut buf = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' | '\'' => {
                    let mut closed = false;
                    while let Some(inner) = chars.next() {
                        if inner == c {
                            closed = true;
                            break;
                        }
                        if inner == '\\' {
                            match chars.next() {
                                Some(escaped) => buf.push(escaped),
                                None => break,
                            }
                        } else {
                            buf.push(inner);
                        }
                    }
                    if !closed {
                        return Err(ParseError::UnterminatedQuote);
                    }
                }
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        buf.push(escaped);
                    }
                }
                _ => buf.push(c),
            }
        }
        tokens.push((buf, quoted));
    }

    Ok(tokens)
}

/// Binds tokenized command text to a [`Definition`].
pub struct Parser<'a> {
    definition: &'a Definition,
    opt_map: HashMap<String, &'a OptSpec>,
}

impl<'a> Parser<'a> {
    pub fn new(definition: &'a Definition) -> Self {
        let mut opt_map = HashMap::new();
        for opt in definition.opts() {
            opt_map.insert(opt.name.clone(), opt);
            if let Some(short) = opt.short {
                opt_map.insert(short.to_string(), opt);
            }
        }
        Parser { definition, opt_map }
    }

    pub fn parse(&self, text: &str) -> Result<HashMap<String, ArgValue>, ParseError> {
        let mut text = text.trim();
        if let Some(sub) = self.definition.sub_command() {
            match text.strip_prefix(sub) {
                Some(rest) => text = rest.trim_start(),
                None => return Err(ParseError::SubCommandMismatch(sub.to_string())),
            }
        }

        let mut values: HashMap<String, ArgValue> = HashMap::new();
        let mut arg_index = 0;
        let mut pending: Option<&OptSpec> = None;

        for (raw, quoted) in tokenize(text)? {
            match Token::classify(raw, quoted) {
                Token::Opt { key, value } => {
                    if let Some(prev) = pending {
                        return Err(ParseError::MissingOptValue(prev.name.clone()));
                    }
                    let spec = self
                        .opt_map
                        .get(&key)
                        .copied()
                        .ok_or(ParseError::UnknownOpt(key))?;
                    match value {
                        Some(value) => store_opt(&mut values, spec, &value)?,
                        None if spec.value_type == ValueType::Bool => {
                            values.insert(spec.name.clone(), ArgValue::Bool(true));
                        }
                        None => pending = Some(spec),
                    }
                }
                Token::Positional(value) => {
                    if let Some(spec) = pending.take() {
                        store_opt(&mut values, spec, &value)?;
                        continue;
                    }
                    let arg = self
                        .definition
                        .args()
                        .get(arg_index)
                        .ok_or_else(|| ParseError::TooManyArgs(value.clone()))?;
                    values.insert(arg.name.clone(), coerce(&value, arg.value_type, &arg.name)?);
                    arg_index += 1;
                }
            }
        }

        if let Some(spec) = pending {
            return Err(ParseError::MissingOptValue(spec.name.clone()));
        }

        for arg in &self.definition.args()[arg_index.min(self.definition.args().len())..] {
            if arg.required {
                return Err(ParseError::MissingRequiredArg(arg.name.clone()));
            }
        }

        // Bool opts are flags: absent means false.
        for opt in self.definition.opts() {
            if opt.value_type == ValueType::Bool && !values.contains_key(&opt.name) {
                values.insert(opt.name.clone(), ArgValue::Bool(false));
            }
        }

        Ok(values)
    }
}

fn store_opt(
    values: &mut HashMap<String, ArgValue>,
    spec: &OptSpec,
    raw: &str,
) -> Result<(), ParseError> {
    let value = coerce(raw, spec.value_type, &spec.name)?;
    if spec.multiple {
        match values.get_mut(&spec.name) {
            Some(ArgValue::List(list)) => list.push(value),
            _ => {
                values.insert(spec.name.clone(), ArgValue::List(vec![value]));
            }
        }
    } else {
        values.insert(spec.name.clone(), value);
    }
    Ok(())
}

/// Coerces a raw token to its declared type. Coercion is strict: a value
/// that does not fully parse as the declared type is an error, not a
/// silent string.
fn coerce(value: &str, value_type: ValueType, name: &str) -> Result<ArgValue, ParseError> {
    let invalid = || ParseError::InvalidValue {
        name: name.to_string(),
        expected: value_type,
        value: value.to_string(),
    };

    match value_type {
        ValueType::Str => Ok(ArgValue::Str(value.to_string())),
        ValueType::Int => value.parse().map(ArgValue::Int).map_err(|_| invalid()),
        ValueType::Float => value.parse().map(ArgValue::Float).map_err(|_| invalid()),
        ValueType::Bool => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(ArgValue::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(ArgValue::Bool(false)),
            _ => Err(invalid()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::definition::DefinitionBuilder;

    fn words(text: &str) -> Vec<String> {
        tokenize(text).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_whitespace_and_quotes() {
        assert_eq!(words("a  b\tc"), ["a", "b", "c"]);
        assert_eq!(words(r#"say "hello world" now"#), ["say", "hello world", "now"]);
        assert_eq!(words("say 'it''s fine'"), ["say", "its fine"]);
        assert_eq!(words(r#"--msg="a b" x"#), ["--msg=a b", "x"]);
    }

    #[test]
    fn test_tokenize_escapes_and_smart_quotes() {
        assert_eq!(words(r#"say \"hi\""#), ["say", "\"hi\""]);
        assert_eq!(words(r#""a \" b""#), ["a \" b"]);
        assert_eq!(words("say \u{201C}hello world\u{201D}"), ["say", "hello world"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert_eq!(tokenize(r#"say "oops"#), Err(ParseError::UnterminatedQuote));
    }

    fn definition() -> Definition {
        DefinitionBuilder::new()
            .name("test")
            .arg("target", ValueType::Str, true)
            .arg("count", ValueType::Int, false)
            .opt("force", ValueType::Bool, Some('f'))
            .opt("level", ValueType::Int, Some('l'))
            .multi_opt("tag", ValueType::Str, Some('t'))
            .build()
            .unwrap()
    }

    #[test]
    fn test_binds_args_and_opts() {
        let definition = definition();
        let values = Parser::new(&definition)
            .parse("prod 3 --force --level 2 -t a --tag=b")
            .unwrap();

        assert_eq!(values["target"], ArgValue::Str("prod".to_string()));
        assert_eq!(values["count"], ArgValue::Int(3));
        assert_eq!(values["force"], ArgValue::Bool(true));
        assert_eq!(values["level"], ArgValue::Int(2));
        assert_eq!(
            values["tag"],
            ArgValue::List(vec![
                ArgValue::Str("a".to_string()),
                ArgValue::Str("b".to_string())
            ])
        );
    }

    #[test]
    fn test_bool_opts_default_false() {
        let definition = definition();
        let values = Parser::new(&definition).parse("prod").unwrap();
        assert_eq!(values["force"], ArgValue::Bool(false));
        assert!(!values.contains_key("count"));
    }

    #[test]
    fn test_detached_opt_value_lookahead() {
        let definition = definition();

        let err = Parser::new(&definition).parse("prod --level --force").unwrap_err();
        assert_eq!(err, ParseError::MissingOptValue("level".to_string()));

        let err = Parser::new(&definition).parse("prod --level").unwrap_err();
        assert_eq!(err, ParseError::MissingOptValue("level".to_string()));
    }

    #[test]
    fn test_binding_errors() {
        let definition = definition();

        assert_eq!(
            Parser::new(&definition).parse("").unwrap_err(),
            ParseError::MissingRequiredArg("target".to_string())
        );
        assert_eq!(
            Parser::new(&definition).parse("a 1 extra").unwrap_err(),
            ParseError::TooManyArgs("extra".to_string())
        );
        assert_eq!(
            Parser::new(&definition).parse("a --bogus").unwrap_err(),
            ParseError::UnknownOpt("bogus".to_string())
        );
        assert!(matches!(
            Parser::new(&definition).parse("a --level x").unwrap_err(),
            ParseError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_empty_bool_value_is_invalid() {
        let definition = definition();

        assert_eq!(
            Parser::new(&definition).parse("prod --force=").unwrap_err(),
            ParseError::InvalidValue {
                name: "force".to_string(),
                expected: ValueType::Bool,
                value: String::new(),
            }
        );
    }

    #[test]
    fn test_sub_command_prefix() {
        let definition = DefinitionBuilder::new()
            .name("test")
            .sub_command("hello")
            .arg("name", ValueType::Str, true)
            .build()
            .unwrap();

        let values = Parser::new(&definition).parse("hello Jeremy").unwrap();
        assert_eq!(values["name"], ArgValue::Str("Jeremy".to_string()));

        assert_eq!(
            Parser::new(&definition).parse("goodbye Jeremy").unwrap_err(),
            ParseError::SubCommandMismatch("hello".to_string())
        );
    }

    #[test]
    fn test_negative_numbers_bind_as_args() {
        let definition = DefinitionBuilder::new()
            .name("test")
            .arg("delta", ValueType::Int, true)
            .build()
            .unwrap();

        let values = Parser::new(&definition).parse("-5").unwrap();
        assert_eq!(values["delta"], ArgValue::Int(-5));
    }

    #[test]
    fn test_quoted_token_is_not_an_opt() {
        let definition = DefinitionBuilder::new()
            .name("test")
            .arg("text", ValueType::Str, true)
            .build()
            .unwrap();

        let values = Parser::new(&definition).parse(r#""--force""#).unwrap();
        assert_eq!(values["text"], ArgValue::Str("--force".to_string()));
    }
}
