//! Formatter settings and configuration-file loading
//!
//! Settings come from two places with a fixed precedence: a `KEY=VALUE`
//! configuration file (lowest) and command-line flags (highest), merged into
//! one immutable [`Settings`] value before any file is processed. Lines
//! starting with `#` are comments. Malformed lines, bad values, and unknown
//! keys are fatal and name the offending key — a typo must not silently
//! reformat a tree with default settings.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Maximum line width before a statement is re-rendered in expanded form.
pub const DEFAULT_MAX_LINE: usize = 88;

/// Blank lines between top-level definitions.
pub const DEFAULT_VERTICAL_DEFINITION_LINES: usize = 2;

/// Blank lines between nested definitions.
pub const DEFAULT_NESTED_LINES: usize = 1;

/// Configuration consumed by the renderer and the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub max_line: usize,
    pub vertical_definition_lines: usize,
    pub nested_lines: usize,
    /// Allow `import a, b` to share one line instead of one import per line.
    pub multiple_imports: bool,
    /// Put spaces around `=` in defaults and keyword arguments.
    pub space_between_arguments: bool,
    /// Report differences instead of rewriting files.
    pub check_only: bool,
    /// File suffixes selected when walking a directory.
    pub allowed_suffixes: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_line: DEFAULT_MAX_LINE,
            vertical_definition_lines: DEFAULT_VERTICAL_DEFINITION_LINES,
            nested_lines: DEFAULT_NESTED_LINES,
            multiple_imports: false,
            space_between_arguments: false,
            check_only: false,
            allowed_suffixes: vec![".py".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from a configuration file, applied over the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let mut settings = Settings::default();
        settings.apply_str(&content)?;
        Ok(settings)
    }

    fn apply_str(&mut self, content: &str) -> Result<()> {
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("configuration line {} is not KEY=VALUE: {raw:?}", lineno + 1);
            };
            self.apply(key.trim(), value.trim())?;
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "MAX_LINE" => self.max_line = parse_count(key, value)?,
            "VERTICAL_DEFINITION_LINES" => {
                self.vertical_definition_lines = parse_count(key, value)?
            }
            "NESTED_LINES" => self.nested_lines = parse_count(key, value)?,
            "MULTIPLE_IMPORTS" => self.multiple_imports = parse_flag(key, value)?,
            "SPACE_BETWEEN_ARGUMENTS" => self.space_between_arguments = parse_flag(key, value)?,
            "CHECK_ONLY" => self.check_only = parse_flag(key, value)?,
            "SUFFIXES" => {
                self.allowed_suffixes = value
                    .split(',')
                    .map(|suffix| suffix.trim().to_string())
                    .filter(|suffix| !suffix.is_empty())
                    .collect();
                if self.allowed_suffixes.is_empty() {
                    bail!("configuration key SUFFIXES has no suffixes: {value:?}");
                }
            }
            _ => bail!("unknown configuration key {key:?}"),
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("configuration key {key} expects a number, got {value:?}"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => bail!("configuration key {key} expects TRUE or FALSE, got {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Settings> {
        let mut settings = Settings::default();
        settings.apply_str(content)?;
        Ok(settings)
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.max_line, 88);
        assert_eq!(settings.vertical_definition_lines, 2);
        assert_eq!(settings.nested_lines, 1);
        assert!(!settings.multiple_imports);
        assert_eq!(settings.allowed_suffixes, vec![".py"]);
    }

    #[test]
    fn parses_keys_and_comments() {
        let settings = parse(
            "# formatter settings\n\
             MAX_LINE=100\n\
             NESTED_LINES=2\n\
             MULTIPLE_IMPORTS=TRUE\n\
             SUFFIXES=.py, .pyi\n",
        )
        .unwrap();
        assert_eq!(settings.max_line, 100);
        assert_eq!(settings.nested_lines, 2);
        assert!(settings.multiple_imports);
        assert_eq!(settings.allowed_suffixes, vec![".py", ".pyi"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = parse("MAX_LINES=100\n").unwrap_err();
        assert!(err.to_string().contains("MAX_LINES"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse("MAX_LINE\n").unwrap_err();
        assert!(err.to_string().contains("KEY=VALUE"));
    }

    #[test]
    fn rejects_bad_flag_values() {
        let err = parse("CHECK_ONLY=yes\n").unwrap_err();
        assert!(err.to_string().contains("CHECK_ONLY"));
    }
}
