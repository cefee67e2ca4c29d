//! Parser options, loadable from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Working gamma. Unset until the scene or the caller sets it.
    pub assumed_gamma: Option<f64>,
    /// Value of `clock`.
    pub clock: f64,
    /// Value of `clock_on`.
    pub clock_on: bool,
    /// Initial value of `version`; `#version` overrides it.
    pub version: f64,
    /// Extra directories searched by `#include` and `file_exists`.
    pub lib_dirs: Vec<PathBuf>,
    pub max_include_depth: usize,
    pub max_symbol_tables: usize,
    /// Treat warnings as errors.
    pub strict: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            assumed_gamma: None,
            clock: 0.0,
            clock_on: false,
            version: 3.7,
            lib_dirs: Vec::new(),
            max_include_depth: 32,
            max_symbol_tables: 100,
            strict: false,
        }
    }
}

impl ParserOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SceneError::parse(&format!("invalid parser options: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
        Self::from_json_str(&text).map_err(|e| SceneError {
            file: Some(path.to_path_buf()),
            ..e
        })
    }

    pub fn with_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lib_dirs.push(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_fill_missing_fields() {
        let opts = ParserOptions::from_json_str(r#"{ "clock": 0.5, "assumed_gamma": 2.2 }"#)
            .expect("valid options");
        assert_eq!(opts.clock, 0.5);
        assert_eq!(opts.assumed_gamma, Some(2.2));
        assert_eq!(opts.version, 3.7);
        assert_eq!(opts.max_symbol_tables, 100);
        assert!(!opts.strict);
    }

    #[test]
    fn rejects_bad_json() {
        let err = ParserOptions::from_json_str("{ clock: }").unwrap_err();
        assert!(err.message().starts_with("invalid parser options"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ParserOptions::from_json_file(Path::new("/nonexistent/options.json")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io { .. }));
    }
}
