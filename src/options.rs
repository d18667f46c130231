//! Settings for an extraction run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Log the raw operations of a packet whose walk fails.
    pub dump_failed_operations: bool,
    /// Deepest chain of inlined calls and lambdas before a walk gives up.
    pub max_inline_depth: usize,
    /// Look for buffer wrapper methods and call through them.
    pub detect_thunks: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dump_failed_operations: false,
            max_inline_depth: 32,
            detect_thunks: true,
        }
    }
}

impl ExtractOptions {
    /// Parse options from JSON; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ExtractOptions::from_json(r#"{"max_inline_depth": 4}"#).unwrap();
        assert_eq!(options.max_inline_depth, 4);
        assert!(options.detect_thunks);
        assert!(!options.dump_failed_operations);
    }

    #[test]
    fn test_bad_json() {
        assert!(ExtractOptions::from_json("{\"detect_thunks\": 3}").is_err());
    }
}
