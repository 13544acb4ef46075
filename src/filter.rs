use regex::Regex;
use serde::Deserialize;

use crate::error::ToolError;

/// Line-oriented post-processing of captured stdout.
///
/// Applied in a fixed order: grep, then head, then tail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputFilter {
    /// Keep only lines matching this regex
    #[serde(default)]
    pub grep_pattern: Option<String>,

    /// Keep lines that do NOT match `grep_pattern` instead
    #[serde(default)]
    pub invert_grep: Option<bool>,

    /// Keep only the first N lines
    #[serde(default)]
    pub head: Option<usize>,

    /// Keep only the last N lines
    #[serde(default)]
    pub tail: Option<usize>,
}

/// An [`OutputFilter`] whose pattern has already been compiled.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    grep: Option<Regex>,
    invert: bool,
    head: Option<usize>,
    tail: Option<usize>,
}

impl OutputFilter {
    /// Compile the grep pattern up front so a bad regex is rejected before the
    /// command ever runs.
    pub fn compile(&self) -> Result<CompiledFilter, ToolError> {
        let grep = match &self.grep_pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ToolError::InvalidArguments(format!("Invalid grep pattern: {e}"))
            })?),
            None => None,
        };
        Ok(CompiledFilter {
            grep,
            invert: self.invert_grep.unwrap_or(false),
            head: self.head,
            tail: self.tail,
        })
    }
}

impl CompiledFilter {
    fn is_noop(&self) -> bool {
        self.grep.is_none() && self.head.is_none() && self.tail.is_none()
    }

    /// Filter `output`, returning `None` when nothing is left.
    pub fn apply(&self, output: String) -> Option<String> {
        if self.is_noop() {
            return Some(output);
        }

        let mut lines: Vec<&str> = output.lines().collect();
        if let Some(regex) = &self.grep {
            lines.retain(|line| regex.is_match(line) != self.invert);
        }
        if let Some(n) = self.head {
            lines.truncate(n);
        }
        if let Some(n) = self.tail {
            let skip = lines.len().saturating_sub(n);
            lines.drain(..skip);
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(
        grep_pattern: Option<&str>,
        invert_grep: Option<bool>,
        head: Option<usize>,
        tail: Option<usize>,
    ) -> CompiledFilter {
        OutputFilter {
            grep_pattern: grep_pattern.map(String::from),
            invert_grep,
            head,
            tail,
        }
        .compile()
        .unwrap()
    }

    #[test]
    fn test_noop_keeps_output_verbatim() {
        let f = filter(None, None, None, None);
        assert_eq!(f.apply("a\nb\n".to_string()), Some("a\nb\n".to_string()));
    }

    #[test]
    fn test_grep_regex_pattern() {
        let f = filter(Some(r"line[13]"), None, None, None);
        assert_eq!(
            f.apply("line1\nline2\nline3".to_string()),
            Some("line1\nline3".to_string())
        );
    }

    #[test]
    fn test_grep_inverted() {
        let f = filter(Some("2"), Some(true), None, None);
        assert_eq!(
            f.apply("line1\nline2\nline3".to_string()),
            Some("line1\nline3".to_string())
        );
    }

    #[test]
    fn test_invalid_regex_is_invalid_arguments() {
        let err = OutputFilter {
            grep_pattern: Some("[invalid".to_string()),
            ..Default::default()
        }
        .compile()
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("Invalid grep pattern")));
    }

    #[test]
    fn test_head_and_tail() {
        let f = filter(None, None, Some(3), Some(2));
        assert_eq!(
            f.apply("line1\nline2\nline3\nline4".to_string()),
            Some("line2\nline3".to_string())
        );
    }

    #[test]
    fn test_tail_larger_than_output() {
        let f = filter(None, None, None, Some(10));
        assert_eq!(f.apply("a\nb".to_string()), Some("a\nb".to_string()));
    }

    #[test]
    fn test_grep_then_head() {
        let f = filter(Some("line"), None, Some(2), None);
        assert_eq!(
            f.apply("line1\nother\nline2\nline3".to_string()),
            Some("line1\nline2".to_string())
        );
    }

    #[test]
    fn test_everything_filtered_out_is_none() {
        let f = filter(Some("zzz"), None, None, None);
        assert_eq!(f.apply("a\nb".to_string()), None);
    }
}
