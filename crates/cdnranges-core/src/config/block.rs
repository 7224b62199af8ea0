// # Block Configuration
//
// Parser for the small configuration block hosts use to set up a range
// refresher:
//
// ```text
// parspack {
//     interval 2h
//     timeout 30s
// }
// ```
//
// The module name stands alone on its line (optionally followed by `{`).
// Each directive takes exactly one argument on the same line. `#` starts a
// comment that runs to the end of the line.

use crate::config::RefreshConfig;
use crate::config::duration::parse_duration;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    line: usize,
    text: &'a str,
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        for text in line.split_whitespace() {
            if text.starts_with('#') {
                break;
            }
            tokens.push(Token { line: idx + 1, text });
        }
    }

    tokens
}

fn err_at(line: usize, msg: impl AsRef<str>) -> Error {
    Error::config(format!("line {}: {}", line, msg.as_ref()))
}

/// Parse a configuration block into a [`RefreshConfig`]
///
/// Unset directives are left at zero; call
/// [`RefreshConfig::with_defaults`] to resolve them.
pub fn parse_block(input: &str) -> Result<RefreshConfig> {
    let tokens = tokenize(input);
    let mut config = RefreshConfig::default();

    let mut iter = tokens.into_iter().peekable();

    let Some(name) = iter.next() else {
        return Ok(config);
    };
    if name.text == "{" || name.text == "}" {
        return Err(err_at(name.line, format!("expected module name, found '{}'", name.text)));
    }

    let Some(open) = iter.next() else {
        return Ok(config);
    };
    if open.text != "{" {
        return Err(if open.line == name.line {
            err_at(open.line, format!("unexpected argument '{}'", open.text))
        } else {
            err_at(open.line, format!("unexpected token '{}'", open.text))
        });
    }

    loop {
        let Some(directive) = iter.next() else {
            return Err(err_at(open.line, "unclosed block"));
        };

        match directive.text {
            "}" => break,
            "interval" | "timeout" => {
                let arg = match iter.next_if(|t| t.line == directive.line) {
                    Some(arg) if arg.text != "{" && arg.text != "}" => arg,
                    _ => {
                        return Err(err_at(
                            directive.line,
                            format!("'{}' expects exactly one argument", directive.text),
                        ));
                    }
                };

                if let Some(extra) =
                    iter.next_if(|t| t.line == directive.line && t.text != "}")
                {
                    return Err(err_at(
                        extra.line,
                        format!("unexpected argument '{}' after '{}'", extra.text, directive.text),
                    ));
                }

                let value = parse_duration(arg.text).map_err(|e| {
                    let reason = match e {
                        Error::Config(msg) => msg,
                        other => other.to_string(),
                    };
                    err_at(arg.line, format!("invalid {} duration: {}", directive.text, reason))
                })?;

                if directive.text == "interval" {
                    config.interval = value;
                } else {
                    config.timeout = value;
                }
            }
            other => {
                return Err(err_at(directive.line, format!("unknown directive '{}'", other)));
            }
        }
    }

    if let Some(trailing) = iter.next() {
        return Err(err_at(trailing.line, format!("unexpected token '{}'", trailing.text)));
    }

    Ok(config)
}
