use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::transfer::DEFAULT_MAX_PAYLOAD_BYTES;

/// Which report layout the coordinator prints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PrinterKind {
    /// `*** Test ... starting.` lines with one line per record.
    Minimal,
    /// Bracketed, gtest-style progress output.
    #[default]
    Pretty,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Decides once, at startup, whether output is colored.
    pub fn resolve(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => {
                console::colors_enabled() && console::Term::stdout().features().colors_supported()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub printer: PrinterKind,
    pub color: ColorChoice,
    /// Print a line for passing assertions too, not only failures.
    pub show_successes: bool,
    pub show_elapsed: bool,
    /// Upper bound on a transferred file name or message, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            printer: PrinterKind::default(),
            color: ColorChoice::default(),
            show_successes: false,
            show_elapsed: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.toml");
        std::fs::write(&path, "printer = \"minimal\"\nmax_payload_bytes = 64\n").unwrap();

        let config = ReportConfig::load(&path).unwrap();
        assert_eq!(config.printer, PrinterKind::Minimal);
        assert_eq!(config.max_payload_bytes, 64);
        assert_eq!(config.color, ColorChoice::Auto);
        assert!(config.show_elapsed);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.toml");
        std::fs::write(&path, "colour = \"never\"\n").unwrap();

        let err = ReportConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(
            ReportConfig::load_or_default(None).unwrap(),
            ReportConfig::default()
        );
    }

    #[rstest]
    #[case("PRETTY", PrinterKind::Pretty)]
    #[case("minimal", PrinterKind::Minimal)]
    fn printer_parses_case_insensitively(#[case] input: &str, #[case] expected: PrinterKind) {
        assert_eq!(<PrinterKind as FromStr>::from_str(input).unwrap(), expected);
    }

    #[test]
    fn fixed_color_choices_ignore_the_terminal() {
        assert!(ColorChoice::Always.resolve());
        assert!(!ColorChoice::Never.resolve());
    }
}
