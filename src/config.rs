// Reflection configuration files: JSON with comments permitted, found
// by walking ancestor directories of a source file.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;


// File name probed for in each ancestor directory.
pub const CONFIG_FILE: &str = "typepack.json";


#[derive(Deserialize, Debug, Default)]
pub struct ReflectionConfig {
    pub reflection: Option<ModeField>,
}

// The `reflection` field takes a mode name or a boolean shorthand:
// true reads as "default", false as "never".
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ModeField {
    Flag(bool),
    Named(String),
}


#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn is_missing(&self) -> bool {
        match self {
            ConfigError::Read(e) => e.kind() == std::io::ErrorKind::NotFound,
            ConfigError::Parse(_) => false,
        }
    }
}


pub fn load(path: &Path) -> Result<ReflectionConfig, ConfigError> {
    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&strip_comments(&text))?;
    Ok(config)
}


// Drop // and /* */ runs, leaving string literals untouched.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    while let Some(next) = chars.next() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            other => out.push(other),
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ReflectionConfig {
        serde_json::from_str(&strip_comments(text)).unwrap()
    }

    #[test]
    fn parses_mode_names_and_flags() {
        assert_eq!(
            parse(r#"{ "reflection": "always" }"#).reflection,
            Some(ModeField::Named("always".to_string()))
        );
        assert_eq!(
            parse(r#"{ "reflection": true }"#).reflection,
            Some(ModeField::Flag(true))
        );
        assert_eq!(parse("{}").reflection, None);
    }

    #[test]
    fn strips_comments_outside_strings() {
        let text = r#"
        {
            // enable for the whole tree
            "reflection": "default" /* trailing note */
        }
        "#;
        assert_eq!(
            parse(text).reflection,
            Some(ModeField::Named("default".to_string()))
        );
    }

    #[test]
    fn keeps_slashes_inside_strings() {
        let stripped = strip_comments(r#"{ "url": "http://example" }"#);
        assert!(stripped.contains("http://example"));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let stripped = strip_comments(r#"{ "s": "a\"b // not a comment" }"#);
        assert!(stripped.contains("not a comment"));
    }
}
