//! Range list parser
//!
//! Turns the plain-text body published by a CDN (one CIDR expression per
//! line) into an ordered list of [`IpNet`] prefixes. Blank lines and `#`
//! comments are ignored. A malformed line is logged and skipped so one bad
//! entry never discards the rest of the list.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::warn;

use crate::error::{Error, Result};

/// A line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number in the source text
    pub line_number: usize,
    /// Trimmed line content
    pub content: String,
    /// Why parsing failed
    pub reason: String,
}

/// Outcome of parsing a range list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Successfully parsed prefixes, in source order
    pub prefixes: Vec<IpNet>,
    /// Lines that were skipped because they did not parse
    pub rejected: Vec<RejectedLine>,
}

/// Parse a single CIDR expression
///
/// Accepts `addr/len` as well as a bare address, which becomes a host prefix
/// (`/32` or `/128`).
pub fn parse_cidr_expression(expr: &str) -> Result<IpNet> {
    if expr.contains('/') {
        expr.parse::<IpNet>()
            .map_err(|e| Error::invalid_prefix(expr, e.to_string()))
    } else {
        expr.parse::<IpAddr>()
            .map(IpNet::from)
            .map_err(|e| Error::invalid_prefix(expr, e.to_string()))
    }
}

/// Parse a range list, keeping track of rejected lines
pub fn parse_prefixes_report(text: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_cidr_expression(line) {
            Ok(prefix) => report.prefixes.push(prefix),
            Err(e) => {
                warn!(line = idx + 1, range = line, error = %e, "failed to parse IP range");
                let reason = match e {
                    Error::InvalidPrefix { reason, .. } => reason,
                    other => other.to_string(),
                };
                report.rejected.push(RejectedLine {
                    line_number: idx + 1,
                    content: line.to_string(),
                    reason,
                });
            }
        }
    }

    report
}

/// Parse a range list into prefixes
pub fn parse_prefixes(text: &str) -> Vec<IpNet> {
    parse_prefixes_report(text).prefixes
}
