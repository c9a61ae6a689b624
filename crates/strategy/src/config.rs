use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result, Timeframe};

/// Declarative rule list (TOML).
///
/// Example `config/rules.toml`:
/// ```toml
/// base_timeframe = "15m"
///
/// [[rule]]
/// indicator = "RVOL"
/// op = ">"
/// threshold = 1.0
///
/// [[rule]]
/// indicator = "RSI"
/// op = "<"
/// threshold = 70.0
///
/// [rule.params]
/// period = 14
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleFileConfig {
    #[serde(default = "default_base_timeframe")]
    pub base_timeframe: Timeframe,
    #[serde(rename = "rule", default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Indicator name: RVOL, RSI, ADX or BB_WIDTH.
    pub indicator: String,
    /// Comparison operator, e.g. ">" or "<=".
    #[serde(rename = "op")]
    pub operator: String,
    pub threshold: f64,
    /// Indicator-specific parameters. Missing keys take the indicator's defaults.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_base_timeframe() -> Timeframe {
    Timeframe::M15
}

impl RuleFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read rule file '{path}': {e}")))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse rule file '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

impl RuleConfig {
    /// Integer parameter `key`, or `default` when absent.
    pub(crate) fn param_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_integer()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    Error::InvalidRule(format!(
                        "{}: parameter '{key}' must be a non-negative integer, got {v}",
                        self.indicator
                    ))
                }),
        }
    }

    /// Float parameter `key` (integers accepted), or `default` when absent.
    pub(crate) fn param_f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .ok_or_else(|| {
                    Error::InvalidRule(format!(
                        "{}: parameter '{key}' must be a number, got {v}",
                        self.indicator
                    ))
                }),
        }
    }
}
