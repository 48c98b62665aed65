mod config;
mod rules;

pub use config::{
    ScoringConfig, ScoringConfigError, ScoringPreset, DEFAULT_BUREAU_DIVISOR, DEFAULT_RATING,
};

use super::record::CaseRecord;
use serde::{Deserialize, Serialize};

/// Stateless calculator turning a case record into a bounded probability.
///
/// Scoring never fails: missing or unreadable inputs fall back to their
/// defaults and are flagged on the returned components.
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, record: &CaseRecord) -> ScoreResult {
        let components = rules::score_components(record, &self.config);
        let probability = rules::probability(&components);
        let tier = rules::classify(probability, &self.config);

        ScoreResult {
            probability,
            tier,
            components,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreInput {
    BureauScore,
    FinancialRating,
    GuaranteeRating,
}

impl ScoreInput {
    pub const fn label(self) -> &'static str {
        match self {
            Self::BureauScore => "bureau score",
            Self::FinancialRating => "financial rating",
            Self::GuaranteeRating => "guarantee rating",
        }
    }
}

/// One weighted input, kept so a decision can be audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub input: ScoreInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    pub normalized: f64,
    pub weight: f64,
    pub contribution: f64,
    pub defaulted: bool,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub probability: u8,
    pub tier: RiskTier,
    pub components: Vec<ScoreComponent>,
}

impl ScoreResult {
    pub fn summary(&self) -> String {
        format!("{}% ({})", self.probability, self.tier.label())
    }

    pub fn degraded_inputs(&self) -> Vec<ScoreInput> {
        self.components
            .iter()
            .filter(|component| component.defaulted)
            .map(|component| component.input)
            .collect()
    }
}
