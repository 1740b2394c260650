use serde::Deserialize;

use crate::engine::Thresholds;
use crate::error::ReconError;
use crate::similarity::Normalization;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub input: Option<InputConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Thresholds + Similarity
// ---------------------------------------------------------------------------

/// Percentages. A candidate scoring `>= low` against any corpus record is
/// refused; `high` is the review cut-off.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "default_low")]
    pub low: f64,
    #[serde(default = "default_high")]
    pub high: f64,
}

fn default_low() -> f64 {
    Thresholds::REFERENCE.low()
}

fn default_high() -> f64 {
    Thresholds::REFERENCE.high()
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: default_low(),
            high: default_high(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default)]
    pub normalization: Normalization,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Candidate and corpus files, resolved relative to the config file.
/// `.csv` and `.xml` are accepted.
///
/// With `has_headers = false`, CSV rows are read by position in the legacy
/// export order (`name, introduced, discontinued, company_name`, with `id`
/// first for the corpus) and `columns` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub candidates: String,
    pub corpus: String,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
    #[serde(default)]
    pub columns: ColumnMapping,
}

fn default_has_headers() -> bool {
    true
}

/// CSV header names for each record field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_introduced")]
    pub introduced: String,
    #[serde(default = "default_discontinued")]
    pub discontinued: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

fn default_id() -> String {
    "id".into()
}

fn default_name() -> String {
    "name".into()
}

fn default_introduced() -> String {
    "introduced".into()
}

fn default_discontinued() -> String {
    "discontinued".into()
}

fn default_company_name() -> String {
    "company_name".into()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: default_id(),
            name: default_name(),
            introduced: default_introduced(),
            discontinued: default_discontinued(),
            company_name: default_company_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Limits + Output
// ---------------------------------------------------------------------------

/// The whole corpus is held in memory for one pass; this caps its size.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_corpus_size")]
    pub max_corpus_size: usize,
}

pub const DEFAULT_MAX_CORPUS_SIZE: usize = 100_000;

fn default_max_corpus_size() -> usize {
    DEFAULT_MAX_CORPUS_SIZE
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_corpus_size: DEFAULT_MAX_CORPUS_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn thresholds(&self) -> Result<Thresholds, ReconError> {
        Thresholds::new(self.thresholds.low, self.thresholds.high)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        self.thresholds()?;

        if self.limits.max_corpus_size == 0 {
            return Err(ReconError::ConfigValidation(
                "limits.max_corpus_size must be at least 1".into(),
            ));
        }

        if let Some(ref input) = self.input {
            if input.candidates.trim().is_empty() || input.corpus.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "input.candidates and input.corpus must name a file".into(),
                ));
            }
            let c = &input.columns;
            for (field, header) in [
                ("id", &c.id),
                ("name", &c.name),
                ("introduced", &c.introduced),
                ("discontinued", &c.discontinued),
                ("company_name", &c.company_name),
            ] {
                if header.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "input.columns.{field} must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
