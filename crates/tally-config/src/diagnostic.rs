// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning figment extraction failures into miette diagnostics.
//!
//! Each diagnostic names the dotted setting (`worker.max_retries`) and, when
//! the offending file is known, points at the line that set it. Misspelled
//! keys and misspelled enum values (`completion = "persit"`) get a
//! "did you mean" hint ranked by Jaro-Winkler similarity.

use std::path::Path;

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity a candidate must exceed before it is offered as a correction.
const SIMILARITY_FLOOR: f64 = 0.75;

/// A configuration problem, renderable with miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no tally section accepts.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(tally::config::unknown_key),
        help("{}", with_suggestion(suggestion.as_deref(), &format!("valid keys: {valid_keys}")))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys of the enclosing section.
        valid_keys: String,
        #[label("not a tally setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A known key holding a value of the wrong type or outside its enum.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(
        code(tally::config::invalid_value),
        help("{}", with_suggestion(suggestion.as_deref(), &format!("expected {expected}")))
    )]
    InvalidValue {
        /// Dotted path of the setting.
        key: String,
        detail: String,
        expected: String,
        suggestion: Option<String>,
        #[label("rejected here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(tally::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tally::config::other))]
    Other(String),
}

fn with_suggestion(suggestion: Option<&str>, rest: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {rest}"),
        None => rest.to_string(),
    }
}

/// Convert every error carried by `err` into a [`ConfigError`].
///
/// `sources` pairs a display path with file content; they are used to attach
/// source spans when the failing provider can be matched to one of them.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            match &error.kind {
                Kind::UnknownField(key, valid) => {
                    let (span, src) = locate(&error, &path, key, sources);
                    ConfigError::UnknownKey {
                        key: key.clone(),
                        suggestion: closest_match(key, valid),
                        valid_keys: valid.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, variants) => {
                    let key = last_segment(&path);
                    let (span, src) = locate(&error, &path, &key, sources);
                    ConfigError::InvalidValue {
                        key: path.join("."),
                        detail: format!("unknown variant `{value}`"),
                        expected: format!("one of: {}", variants.join(", ")),
                        suggestion: closest_match(value, variants),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    let key = last_segment(&path);
                    let (span, src) = locate(&error, &path, &key, sources);
                    ConfigError::InvalidValue {
                        key: path.join("."),
                        detail: format!("found {actual}"),
                        expected: expected.clone(),
                        suggestion: None,
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn last_segment(path: &[String]) -> String {
    path.last().cloned().unwrap_or_default()
}

/// Span and source of `key` for the provider that produced `error`.
fn locate(
    error: &figment::Error,
    path: &[String],
    key: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((name, content)) = origin(error, sources) else {
        return (None, None);
    };
    let table = match path.split_last() {
        Some((last, parent)) if last == key => parent,
        _ => path,
    };
    match find_key_offset(content, table, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// The source the failing value came from. Errors without a file origin
/// (inline strings) resolve only when there is a single candidate.
fn origin<'a>(
    error: &figment::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.clone()),
            _ => None,
        });
    match file {
        Some(file) => sources
            .iter()
            .find(|(name, _)| file == Path::new(name) || file.ends_with(name)),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

/// Byte offset of `key` inside the TOML table named by `table`.
///
/// An empty `table` means the root, before any `[section]` header.
pub fn find_key_offset(content: &str, table: &[String], key: &str) -> Option<usize> {
    let wanted = table.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().unwrap_or_default().trim().to_string();
        } else if current == wanted
            && trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }

    None
}

/// The candidate most similar to `input`, if any clears [`SIMILARITY_FLOOR`].
pub fn closest_match(input: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::jaro_winkler(input, candidate), *candidate))
        .filter(|(score, _)| *score > SIMILARITY_FLOOR)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Print `errors` to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    let plural = if errors.len() == 1 { "" } else { "s" };
    eprintln!("tally: {} configuration problem{plural}", errors.len());
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("  {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_offered_for_prot() {
        let valid = &["host", "port", "max_concurrent_requests", "log_level"];
        assert_eq!(closest_match("prot", valid).as_deref(), Some("port"));
    }

    #[test]
    fn completion_mode_is_offered_for_misspelling() {
        assert_eq!(
            closest_match("persit", &["dispatch", "persist"]).as_deref(),
            Some("persist")
        );
    }

    #[test]
    fn nothing_offered_for_distant_input() {
        let valid = &["enabled", "poll_interval_ms", "max_retries"];
        assert_eq!(closest_match("zzzzzz", valid), None);
    }

    #[test]
    fn key_is_found_inside_its_table() {
        let content = "[server]\nport = 80\n\n[worker]\nmax_retrys = 2\n";
        let o = find_key_offset(content, &["worker".to_string()], "max_retrys").unwrap();
        assert_eq!(&content[o..o + 10], "max_retrys");
    }

    #[test]
    fn same_key_in_another_table_is_skipped() {
        let content = "[counter]\ncall_timeout_ms = 1\n[storage]\n  call_timeout_ms = 0\n";
        let o = find_key_offset(content, &["storage".to_string()], "call_timeout_ms").unwrap();
        assert_eq!(o, content.rfind("call_timeout_ms").unwrap());
    }

    #[test]
    fn crlf_offsets_stay_aligned() {
        let content = "[server]\r\nhost = \"::\"\r\nprot = 1\r\n";
        let o = find_key_offset(content, &["server".to_string()], "prot").unwrap();
        assert_eq!(&content[o..o + 4], "prot");
    }

    #[test]
    fn missing_table_has_no_offset() {
        let content = "[server]\nport = 80\n";
        assert!(find_key_offset(content, &["dispatch".to_string()], "queue").is_none());
    }

    #[test]
    fn invalid_value_help_carries_suggestion() {
        let error = ConfigError::InvalidValue {
            key: "dispatch.completion".into(),
            detail: "unknown variant `persit`".into(),
            expected: "one of: dispatch, persist".into(),
            suggestion: Some("persist".into()),
            span: None,
            src: None,
        };
        let help = error.help().unwrap().to_string();
        assert_eq!(help, "did you mean `persist`? expected one of: dispatch, persist");
    }
}
