use serde::{Deserialize, Serialize};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Rating assumed for a financial or guarantee rating that was never captured.
pub const DEFAULT_RATING: f64 = 50.0;

/// Bureau scores are reported on a 0–1000 scale; dividing by ten maps them to 0–100.
pub const DEFAULT_BUREAU_DIVISOR: f64 = 10.0;

/// Weighting policy for the consolidated probability.
///
/// Weights apply to sub-scores already normalised to 0–100 and must sum to
/// one. A probability strictly above `high_threshold` is HIGH, strictly above
/// `medium_threshold` is MEDIUM, anything else LOW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the normalised credit-bureau score.
    pub bureau_weight: f64,
    /// Weight of the auditor's financial-strength rating.
    pub financial_weight: f64,
    /// Weight of the collateral/guarantee rating; zero drops the input.
    pub guarantee_weight: f64,
    pub high_threshold: u8,
    pub medium_threshold: u8,
    pub bureau_divisor: f64,
    pub default_rating: f64,
}

impl ScoringConfig {
    /// Bureau 0.3 / financial 0.5 / guarantee 0.2, tiers above 75 and 50.
    pub fn three_factor() -> Self {
        Self {
            bureau_weight: 0.3,
            financial_weight: 0.5,
            guarantee_weight: 0.2,
            high_threshold: 75,
            medium_threshold: 50,
            bureau_divisor: DEFAULT_BUREAU_DIVISOR,
            default_rating: DEFAULT_RATING,
        }
    }

    /// Bureau 0.3 / financial 0.7, tiers above 70 and 40.
    pub fn two_factor() -> Self {
        Self {
            bureau_weight: 0.3,
            financial_weight: 0.7,
            guarantee_weight: 0.0,
            high_threshold: 70,
            medium_threshold: 40,
            bureau_divisor: DEFAULT_BUREAU_DIVISOR,
            default_rating: DEFAULT_RATING,
        }
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        for (name, value) in [
            ("bureau_weight", self.bureau_weight),
            ("financial_weight", self.financial_weight),
            ("guarantee_weight", self.guarantee_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringConfigError::InvalidWeight { name, value });
            }
        }

        let sum = self.bureau_weight + self.financial_weight + self.guarantee_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringConfigError::WeightSum(sum));
        }

        if self.medium_threshold >= self.high_threshold || self.high_threshold > 100 {
            return Err(ScoringConfigError::Thresholds {
                medium: self.medium_threshold,
                high: self.high_threshold,
            });
        }

        if !self.bureau_divisor.is_finite() || self.bureau_divisor <= 0.0 {
            return Err(ScoringConfigError::Divisor(self.bureau_divisor));
        }

        if !(0.0..=100.0).contains(&self.default_rating) {
            return Err(ScoringConfigError::DefaultRating(self.default_rating));
        }

        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::three_factor()
    }
}

/// Named weighting policies observed in production use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPreset {
    ThreeFactor,
    TwoFactor,
}

impl ScoringPreset {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "three_factor" | "3" => Some(Self::ThreeFactor),
            "two_factor" | "2" => Some(Self::TwoFactor),
            _ => None,
        }
    }

    pub fn config(self) -> ScoringConfig {
        match self {
            Self::ThreeFactor => ScoringConfig::three_factor(),
            Self::TwoFactor => ScoringConfig::two_factor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("{name} must be a finite, non-negative number (found {value})")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("scoring weights must sum to 1.0 (found {0:.3})")]
    WeightSum(f64),
    #[error("tier thresholds must satisfy medium < high <= 100 (medium {medium}, high {high})")]
    Thresholds { medium: u8, high: u8 },
    #[error("bureau divisor must be positive (found {0})")]
    Divisor(f64),
    #[error("default rating must be within 0-100 (found {0})")]
    DefaultRating(f64),
}
