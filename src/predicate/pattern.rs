//! Ant-style patterns for paths and host names.
//!
//! Supported syntax, with `sep` being `/` for paths and `.` for hosts:
//! - `?` one character within a segment
//! - `*` zero or more characters within a segment
//! - `**` zero or more segments
//! - `{name}` one segment captured as `name`
//! - `{*name}` the remainder captured as `name`
//! - `{name:regex}` a segment matching `regex`, captured as `name`

use std::collections::HashMap;

use regex::Regex;

use crate::error::{GatewayError, GatewayResult};

/// A compiled ant-style pattern.
#[derive(Debug, Clone)]
pub struct AntPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl AntPattern {
    /// Pattern over `/`-separated paths; a trailing separator is optional.
    pub fn path(pattern: &str) -> GatewayResult<Self> {
        Self::compile(pattern, '/', true)
    }

    /// Pattern over `.`-separated host names, matched case-insensitively.
    pub fn host(pattern: &str) -> GatewayResult<Self> {
        Self::compile(&pattern.to_ascii_lowercase(), '.', false)
    }

    fn compile(pattern: &str, sep: char, optional_trailing_sep: bool) -> GatewayResult<Self> {
        let invalid = |reason: String| GatewayError::InvalidArgument(format!("pattern '{}': {}", pattern, reason));

        let sep_re = regex::escape(&sep.to_string());
        let not_sep = format!("[^{}]", sep_re);
        let chars: Vec<char> = pattern.chars().collect();
        let mut re = String::from("^");
        let mut names = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let at_segment_end = |j: usize| j >= chars.len() || chars[j] == sep;

            if c == sep && chars.get(i + 1) == Some(&'*') && chars.get(i + 2) == Some(&'*') && at_segment_end(i + 3) {
                re.push_str(&format!("(?:{}.*)?", sep_re));
                i += 3;
            } else if c == '*' && chars.get(i + 1) == Some(&'*') {
                if i == 0 && chars.get(2) == Some(&sep) {
                    re.push_str(&format!("(?:.*{})?", sep_re));
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
            } else if c == '*' {
                re.push_str(&not_sep);
                re.push('*');
                i += 1;
            } else if c == '?' {
                re.push_str(&not_sep);
                i += 1;
            } else if c == '{' {
                let close = chars[i..]
                    .iter()
                    .position(|&ch| ch == '}')
                    .map(|p| i + p)
                    .ok_or_else(|| invalid("unclosed '{'".into()))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let (name, capture) = if let Some(rest) = inner.strip_prefix('*') {
                    (rest.to_string(), ".*".to_string())
                } else if let Some((name, custom)) = inner.split_once(':') {
                    (name.to_string(), custom.to_string())
                } else {
                    (inner.clone(), format!("{}+", not_sep))
                };
                if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
                    return Err(invalid(format!("invalid variable name '{}'", name)));
                }
                re.push_str(&format!("(?P<{}>{})", name, capture));
                names.push(name);
                i = close + 1;
            } else {
                re.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }

        if optional_trailing_sep && !pattern.ends_with(sep) {
            re.push_str(&sep_re);
            re.push('?');
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Template variables of a successful match.
    pub fn captures(&self, input: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(input)?;
        Some(
            self.names
                .iter()
                .filter_map(|name| caps.name(name).map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_wildcard_path() {
        let p = AntPattern::path("/api/**").unwrap();
        assert!(p.is_match("/api"));
        assert!(p.is_match("/api/"));
        assert!(p.is_match("/api/users/1"));
        assert!(!p.is_match("/apix"));
        assert!(!p.is_match("/other/api"));
    }

    #[test]
    fn test_single_wildcard_stays_in_segment() {
        let p = AntPattern::path("/files/*.txt").unwrap();
        assert!(p.is_match("/files/a.txt"));
        assert!(!p.is_match("/files/dir/a.txt"));
    }

    #[test]
    fn test_template_variables() {
        let p = AntPattern::path("/users/{id}/orders/{*rest}").unwrap();
        let vars = p.captures("/users/42/orders/7/items").unwrap();
        assert_eq!(vars["id"], "42");
        assert_eq!(vars["rest"], "7/items");
        assert!(p.captures("/users//orders/x").is_none());
    }

    #[test]
    fn test_optional_trailing_separator() {
        let p = AntPattern::path("/hello").unwrap();
        assert!(p.is_match("/hello"));
        assert!(p.is_match("/hello/"));
    }

    #[test]
    fn test_host_pattern() {
        let p = AntPattern::host("**.Example.org").unwrap();
        assert!(p.is_match("example.org"));
        assert!(p.is_match("www.example.org"));
        assert!(p.is_match("a.b.example.org"));
        assert!(!p.is_match("example.com"));

        let single = AntPattern::host("*.example.org").unwrap();
        assert!(single.is_match("api.example.org"));
        assert!(!single.is_match("a.b.example.org"));
    }

    #[test]
    fn test_invalid_variable_name() {
        assert!(AntPattern::path("/x/{bad-name}").is_err());
        assert!(AntPattern::path("/x/{open").is_err());
    }
}
