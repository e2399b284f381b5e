use serde::Deserialize;

use crate::error::{RoasError, RoasResult};

/// Analysis configuration. Loaded from environment variables with the
/// prefix `ROAS_DASHBOARD__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Divisor applied to spend amounts when the CSV is in a different
    /// currency. `0` means the amounts are already in the target currency.
    #[serde(default)]
    pub exchange_rate: f64,
    /// Co-production multiplier: when set, tracked and organic revenue are
    /// doubled at aggregation time.
    #[serde(default)]
    pub multiply_revenue: bool,
    /// Case-insensitive substring marking a sale as organic (non-paid).
    #[serde(default = "default_organic_pattern")]
    pub organic_pattern: String,
    #[serde(default)]
    pub factors: FactorConfig,
}

/// Thresholds for the ROAS factor-correlation analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct FactorConfig {
    /// Cohorts with ROAS at or above this value count as "good".
    #[serde(default = "default_roas_threshold")]
    pub roas_threshold: f64,
    #[serde(default = "default_min_leads_single")]
    pub min_leads_single: u64,
    #[serde(default = "default_min_leads_pair")]
    pub min_leads_pair: u64,
    #[serde(default = "default_good_ratio_single")]
    pub good_ratio_single: f64,
    #[serde(default = "default_bad_ratio_single")]
    pub bad_ratio_single: f64,
    #[serde(default = "default_good_ratio_pair")]
    pub good_ratio_pair: f64,
    #[serde(default = "default_bad_ratio_pair")]
    pub bad_ratio_pair: f64,
}

impl AnalysisConfig {
    pub fn load() -> RoasResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("roas-dashboard").required(false))
            .add_source(config::Environment::with_prefix("ROAS_DASHBOARD").separator("__"))
            .build()
            .map_err(|e| RoasError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| RoasError::Config(e.to_string()))
    }

    /// Scalar applied to revenue sums inside the aggregation queries.
    pub fn revenue_multiplier(&self) -> f64 {
        if self.multiply_revenue {
            2.0
        } else {
            1.0
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            exchange_rate: 0.0,
            multiply_revenue: false,
            organic_pattern: default_organic_pattern(),
            factors: FactorConfig::default(),
        }
    }
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            roas_threshold: default_roas_threshold(),
            min_leads_single: default_min_leads_single(),
            min_leads_pair: default_min_leads_pair(),
            good_ratio_single: default_good_ratio_single(),
            bad_ratio_single: default_bad_ratio_single(),
            good_ratio_pair: default_good_ratio_pair(),
            bad_ratio_pair: default_bad_ratio_pair(),
        }
    }
}

fn default_organic_pattern() -> String {
    "org".to_string()
}

fn default_roas_threshold() -> f64 {
    1.5
}

fn default_min_leads_single() -> u64 {
    5
}

fn default_min_leads_pair() -> u64 {
    10
}

fn default_good_ratio_single() -> f64 {
    0.7
}

fn default_bad_ratio_single() -> f64 {
    0.3
}

// Pair thresholds are stricter: combinations have less support and a higher
// false-positive risk.
fn default_good_ratio_pair() -> f64 {
    0.8
}

fn default_bad_ratio_pair() -> f64 {
    0.2
}
