//! Source options.
//!
//! Options are read from a JSON file (`CRAFT_CONFIG`) or, failing that, from
//! `CRAFT_*` environment variables. Either way they pass through
//! [`SourceOptions::validate`] before the pipeline sees them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::info;

use crate::error::SourceError;

pub const DEFAULT_API_BASE: &str = "api/gridsome";
pub const DEFAULT_CONCURRENT: usize = 10;
pub const DEFAULT_ELEMENT_TYPES: &[&str] = &[
    "asset",
    "category",
    "entry",
    "globalSet",
    "matrixBlock",
    "tag",
    "user",
];

/// Options for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOptions {
    pub base_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Maximum page requests in flight per element type.
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
    /// Root namespace for derived collection names.
    #[serde(default)]
    pub type_name: String,
    #[serde(default = "default_element_types")]
    pub element_types: Vec<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_concurrent() -> usize {
    DEFAULT_CONCURRENT
}

fn default_element_types() -> Vec<String> {
    DEFAULT_ELEMENT_TYPES.iter().map(|t| t.to_string()).collect()
}

impl SourceOptions {
    pub fn new(base_url: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_base: default_api_base(),
            concurrent: default_concurrent(),
            type_name: type_name.into(),
            element_types: default_element_types(),
        }
    }

    pub fn with_element_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.element_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrent(mut self, concurrent: usize) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Load options from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let options: SourceOptions = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        info!("Loaded options from {:?}", path);
        Ok(options.validate()?)
    }

    /// Load options from `CRAFT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("CRAFT_BASE_URL").context("CRAFT_BASE_URL not set")?;
        let type_name = env::var("CRAFT_TYPE_NAME").unwrap_or_default();

        let mut options = Self::new(base_url, type_name);
        if let Ok(api_base) = env::var("CRAFT_API_BASE") {
            options.api_base = api_base;
        }
        if let Ok(concurrent) = env::var("CRAFT_CONCURRENT") {
            options.concurrent = concurrent
                .trim()
                .parse()
                .with_context(|| format!("CRAFT_CONCURRENT is not a number: {}", concurrent))?;
        }
        if let Ok(types) = env::var("CRAFT_ELEMENT_TYPES") {
            options.element_types = parse_list(&types);
        }

        Ok(options.validate()?)
    }

    /// Check required options and normalise the URL parts.
    pub fn validate(mut self) -> Result<Self, SourceError> {
        if self.type_name.trim().is_empty() {
            return Err(SourceError::Config("Missing typeName option.".to_string()));
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            return Err(SourceError::Config("Missing baseUrl option.".to_string()));
        }
        self.api_base = self.api_base.trim_matches('/').to_string();
        if self.concurrent == 0 {
            return Err(SourceError::Config(
                "concurrent must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// `{baseUrl}/{apiBase}`, the prefix every request path is joined to.
    pub fn endpoint(&self) -> String {
        if self.api_base.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, self.api_base)
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let options: SourceOptions =
            serde_json::from_str(r#"{"baseUrl": "https://cms.example.com/", "typeName": "craft"}"#)
                .unwrap();
        let options = options.validate().unwrap();

        assert_eq!(options.base_url, "https://cms.example.com");
        assert_eq!(options.api_base, "api/gridsome");
        assert_eq!(options.concurrent, 10);
        assert_eq!(options.element_types.len(), 7);
        assert_eq!(options.element_types[4], "matrixBlock");
        assert_eq!(options.endpoint(), "https://cms.example.com/api/gridsome");
    }

    #[test]
    fn test_missing_type_name() {
        let err = SourceOptions::new("https://cms.example.com", "")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "configuration error: Missing typeName option.");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = SourceOptions::new("https://cms.example.com", "craft")
            .with_concurrent(0)
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("entry, user,,asset "), vec!["entry", "user", "asset"]);
    }
}
