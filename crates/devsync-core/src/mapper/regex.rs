use super::ValueMapper;
use crate::error::{Error, Result};

/// Which capture group a [`RegexMapper`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Capture {
    Index(usize),
    Name(String),
}

/// Returns one capture group of the first match of a pattern.
#[derive(Debug, Clone)]
pub struct RegexMapper {
    regex: ::regex::Regex,
    capture: Capture,
}

impl RegexMapper {
    /// `capture` is a group index or name, group 1 when omitted.
    pub fn new(pattern: &str, capture: Option<&str>) -> Result<Self> {
        let regex =
            ::regex::Regex::new(pattern).map_err(|e| Error::mapper("regex", e.to_string()))?;

        let capture = match capture.map(str::trim) {
            None | Some("") => Capture::Index(1),
            Some(raw) => match raw.parse::<usize>() {
                Ok(index) => Capture::Index(index),
                Err(_) => Capture::Name(raw.to_string()),
            },
        };

        if let Capture::Name(name) = &capture {
            if !regex.capture_names().flatten().any(|n| n == name) {
                return Err(Error::mapper(
                    "regex",
                    format!("pattern '{}' has no group named '{}'", pattern, name),
                ));
            }
        }

        Ok(Self { regex, capture })
    }
}

impl ValueMapper for RegexMapper {
    fn map(&self, value: &str) -> String {
        let Some(captures) = self.regex.captures(value) else {
            return value.to_string();
        };

        let group = match &self.capture {
            Capture::Index(index) => captures.get(*index),
            Capture::Name(name) => captures.name(name),
        };

        group
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| value.to_string())
    }

    fn kind(&self) -> &'static str {
        "regex"
    }
}
