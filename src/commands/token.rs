//! Token classification for command text.

/// One shell-style token from command text, classified as either a
/// positional value or an opt reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Positional(String),
    Opt { key: String, value: Option<String> },
}

impl Token {
    /// Classifies a raw token. Quoted tokens are always positional, so a
    /// user can pass literal values like `"--not-an-opt"`. A leading `-`
    /// only starts a short opt when followed by a letter; `-5` and `-.5`
    /// stay positional.
    pub fn classify(raw: String, quoted: bool) -> Token {
        if quoted {
            return Token::Positional(raw);
        }

        if let Some(rest) = raw.strip_prefix("--") {
            if !rest.is_empty() {
                return match rest.split_once('=') {
                    Some((key, value)) => Token::Opt {
                        key: key.to_string(),
                        value: Some(value.to_string()),
                    },
                    None => Token::Opt { key: rest.to_string(), value: None },
                };
            }
        } else if let Some(rest) = raw.strip_prefix('-') {
            let mut chars = rest.chars();
            if let Some(first) = chars.next() {
                if first.is_ascii_alphabetic() {
                    let value = chars.as_str().trim_start_matches('=');
                    let value = (!value.is_empty()).then(|| value.to_string());
                    return Token::Opt { key: first.to_string(), value };
                }
            }
        }

        Token::Positional(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(raw: &str) -> Token {
        Token::classify(raw.to_string(), false)
    }

    fn opt(key: &str, value: Option<&str>) -> Token {
        Token::Opt { key: key.to_string(), value: value.map(str::to_string) }
    }

    #[test]
    fn test_long_opts() {
        assert_eq!(bare("--force"), opt("force", None));
        assert_eq!(bare("--count=3"), opt("count", Some("3")));
        assert_eq!(bare("--msg=a=b"), opt("msg", Some("a=b")));
    }

    #[test]
    fn test_short_opts() {
        assert_eq!(bare("-f"), opt("f", None));
        assert_eq!(bare("-c3"), opt("c", Some("3")));
        assert_eq!(bare("-c=3"), opt("c", Some("3")));
    }

    #[test]
    fn test_negative_numbers_are_positional() {
        assert_eq!(bare("-5"), Token::Positional("-5".to_string()));
        assert_eq!(bare("-.5"), Token::Positional("-.5".to_string()));
        assert_eq!(bare("-"), Token::Positional("-".to_string()));
        assert_eq!(bare("--"), Token::Positional("--".to_string()));
    }

    #[test]
    fn test_quoted_tokens_are_positional() {
        assert_eq!(
            Token::classify("--force".to_string(), true),
            Token::Positional("--force".to_string())
        );
    }
}
