//! Scalar presentation rules shared by the YAML and JSON writers.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::error_channel::fatal;
use crate::errors::YamlResult;

const NUMBER_PATTERN: &str = r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$";

static NUMBER: OnceLock<Regex> = OnceLock::new();

fn json_number() -> YamlResult<&'static Regex> {
    if let Some(re) = NUMBER.get() {
        return Ok(re);
    }
    let re = Regex::new(NUMBER_PATTERN)
        .map_err(|e| fatal(format!("invalid number pattern: {e}")))?;
    Ok(NUMBER.get_or_init(|| re))
}

/// Wrap `s` in double quotes, escaping what neither YAML nor JSON allows raw.
pub fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whether `s` would read back differently if written as a plain scalar.
pub fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    if s.chars().any(|c| c.is_control()) {
        return true;
    }
    if s == "-" || s.starts_with("- ") || s.starts_with("---") || s.starts_with("...") {
        return true;
    }
    if s.starts_with(['[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`', ',', '?', ':']) {
        return true;
    }
    s.contains(": ") || s.contains(" #") || s.ends_with(':')
}

/// A key or value as it appears in block output.
pub fn yaml_scalar(s: &str, quoted: bool) -> Cow<'_, str> {
    if quoted || needs_quotes(s) {
        Cow::Owned(double_quoted(s))
    } else {
        Cow::Borrowed(s)
    }
}

/// A value as it appears in JSON output.
pub fn json_scalar(s: &str, quoted: bool) -> YamlResult<Cow<'_, str>> {
    if quoted {
        return Ok(Cow::Owned(double_quoted(s)));
    }
    match s {
        "" | "~" | "null" => Ok(Cow::Borrowed("null")),
        "true" | "false" => Ok(Cow::Borrowed(s)),
        _ if json_number()?.is_match(s) => Ok(Cow::Borrowed(s)),
        _ => Ok(Cow::Owned(double_quoted(s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", false)]
    #[case("two words", false)]
    #[case("http://x.org/a#b", false)]
    #[case("", true)]
    #[case(" padded", true)]
    #[case("a: b", true)]
    #[case("- item", true)]
    #[case("[x]", true)]
    #[case("line\nbreak", true)]
    #[case("note #1", true)]
    fn needs_quotes_detects_unsafe_plain_scalars(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(needs_quotes(input), expected);
    }

    #[rstest]
    #[case("1", false, "1")]
    #[case("-2.5e3", false, "-2.5e3")]
    #[case("007", false, "\"007\"")]
    #[case("true", false, "true")]
    #[case("~", false, "null")]
    #[case("", false, "null")]
    #[case("1", true, "\"1\"")]
    #[case("say \"hi\"", false, "\"say \\\"hi\\\"\"")]
    fn json_scalar_picks_bare_or_string(
        #[case] input: &str,
        #[case] quoted: bool,
        #[case] expected: &str,
    ) {
        crate::error_channel::init_once();
        assert_eq!(json_scalar(input, quoted).unwrap(), expected);
    }
}
