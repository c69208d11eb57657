use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub candidates: CandidateConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            thresholds: Thresholds::default(),
            candidates: CandidateConfig::default(),
            resolution: ResolutionConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Tier cutoffs. Empirically chosen, product-tunable; a score of exactly
/// 1.0 is always `exact` regardless of these.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Thresholds {
    /// Minimum score for a candidate to be offered at all.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_high")]
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            medium: default_medium(),
            high: default_high(),
        }
    }
}

fn default_confidence() -> f64 {
    0.70
}

fn default_medium() -> f64 {
    0.80
}

fn default_high() -> f64 {
    0.90
}

// ---------------------------------------------------------------------------
// Candidates + Resolution + Workers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CandidateConfig {
    /// Candidate list cap, bounding UI and storage cost.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// When false, only exact-normalized matches are returned.
    #[serde(default = "default_true")]
    pub allow_fuzzy: bool,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            allow_fuzzy: true,
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResolutionConfig {
    /// When true (default), fuzzy matches are never auto-accepted.
    #[serde(default = "default_true")]
    pub require_user_confirmation: bool,
    /// Caller policy for records with no candidate when confirmation is
    /// off: skip them instead of leaving them pending.
    #[serde(default)]
    pub skip_unmatched: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            require_user_confirmation: true,
            skip_unmatched: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WorkerConfig {
    /// Bounded worker count for per-record scoring. 0 = library default.
    #[serde(default)]
    pub threads: usize,
}

// ---------------------------------------------------------------------------
// Column mapping (CSV boundary)
// ---------------------------------------------------------------------------

/// Maps source CSV columns onto record fields. `attrs` maps column name →
/// recognized attribute key for the target entity kind.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let t = &self.thresholds;
        for (label, value) in [
            ("confidence", t.confidence),
            ("medium", t.medium),
            ("high", t.high),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ReconError::ConfigValidation(format!(
                    "threshold '{label}' must be in [0, 1), got {value}"
                )));
            }
        }
        if t.confidence > t.medium || t.medium > t.high {
            return Err(ReconError::ConfigValidation(format!(
                "thresholds must satisfy confidence <= medium <= high, got {} / {} / {}",
                t.confidence, t.medium, t.high
            )));
        }
        if self.candidates.top_k == 0 {
            return Err(ReconError::ConfigValidation(
                "candidates.top_k must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Employer Import"

[thresholds]
confidence = 0.70
medium = 0.80
high = 0.90

[candidates]
top_k = 5
allow_fuzzy = true

[resolution]
require_user_confirmation = true

[workers]
threads = 4
"#;

    #[test]
    fn parse_valid_config() {
        let config = EngineConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Employer Import");
        assert_eq!(config.thresholds.high, 0.90);
        assert_eq!(config.candidates.top_k, 5);
        assert!(config.resolution.require_user_confirmation);
        assert_eq!(config.workers.threads, 4);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = EngineConfig::from_toml(r#"name = "Bare""#).unwrap();
        assert_eq!(config.thresholds.confidence, 0.70);
        assert_eq!(config.thresholds.medium, 0.80);
        assert_eq!(config.thresholds.high, 0.90);
        assert_eq!(config.candidates.top_k, 5);
        assert!(config.candidates.allow_fuzzy);
        assert!(config.resolution.require_user_confirmation);
        assert!(!config.resolution.skip_unmatched);
        assert_eq!(config.workers.threads, 0);
    }

    #[test]
    fn reject_threshold_out_of_range() {
        let err = EngineConfig::from_toml(
            r#"
name = "Bad"
[thresholds]
high = 1.0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("high"));
    }

    #[test]
    fn reject_threshold_ordering() {
        let err = EngineConfig::from_toml(
            r#"
name = "Bad"
[thresholds]
confidence = 0.9
medium = 0.8
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence <= medium <= high"));
    }

    #[test]
    fn reject_zero_top_k() {
        let err = EngineConfig::from_toml(
            r#"
name = "Bad"
[candidates]
top_k = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = EngineConfig::from_toml("name = ").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
