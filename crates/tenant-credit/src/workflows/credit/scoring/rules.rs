use super::super::numeric::NumericReading;
use super::super::record::{CaseField, CaseRecord};
use super::config::ScoringConfig;
use super::{RiskTier, ScoreComponent, ScoreInput};

const MAX_SUB_SCORE: f64 = 100.0;

pub(crate) fn score_components(record: &CaseRecord, config: &ScoringConfig) -> Vec<ScoreComponent> {
    let mut components = Vec::with_capacity(3);

    let bureau = record.number(CaseField::BureauScore);
    let bureau_raw = bureau.or_default(0.0);
    let bureau_score = (bureau_raw / config.bureau_divisor).clamp(0.0, MAX_SUB_SCORE);
    components.push(component(
        ScoreInput::BureauScore,
        &bureau,
        bureau_score,
        config.bureau_weight,
        match &bureau {
            NumericReading::Parsed(raw) => format!(
                "bureau score {raw} normalised to {bureau_score:.1} (divisor {})",
                config.bureau_divisor
            ),
            NumericReading::Missing => "bureau score missing; treated as 0".to_string(),
            NumericReading::Malformed(raw) => {
                format!("bureau score '{raw}' unreadable; treated as 0")
            }
        },
    ));

    let financial = record.number(CaseField::FinancialRating);
    components.push(rating_component(
        ScoreInput::FinancialRating,
        &financial,
        config.financial_weight,
        config.default_rating,
    ));

    if config.guarantee_weight > 0.0 {
        let guarantee = record.number(CaseField::GuaranteeRating);
        components.push(rating_component(
            ScoreInput::GuaranteeRating,
            &guarantee,
            config.guarantee_weight,
            config.default_rating,
        ));
    }

    for component in components.iter().filter(|component| component.defaulted) {
        tracing::debug!(
            input = component.input.label(),
            raw = component.raw.as_deref().unwrap_or("<missing>"),
            "score input degraded to default"
        );
    }

    components
}

fn rating_component(
    input: ScoreInput,
    reading: &NumericReading,
    weight: f64,
    default_rating: f64,
) -> ScoreComponent {
    let rating = reading.or_default(default_rating).clamp(0.0, MAX_SUB_SCORE);
    let notes = match reading {
        NumericReading::Parsed(raw) if *raw != rating => {
            format!("{} {raw} clamped to {rating}", input.label())
        }
        NumericReading::Parsed(_) => format!("{} {rating}", input.label()),
        NumericReading::Missing => {
            format!("{} missing; default {default_rating} applied", input.label())
        }
        NumericReading::Malformed(raw) => format!(
            "{} '{raw}' unreadable; default {default_rating} applied",
            input.label()
        ),
    };

    component(input, reading, rating, weight, notes)
}

fn component(
    input: ScoreInput,
    reading: &NumericReading,
    normalized: f64,
    weight: f64,
    notes: String,
) -> ScoreComponent {
    let raw = match reading {
        NumericReading::Parsed(value) => Some(value.to_string()),
        NumericReading::Malformed(raw) => Some(raw.clone()),
        NumericReading::Missing => None,
    };

    ScoreComponent {
        input,
        raw,
        normalized,
        weight,
        contribution: normalized * weight,
        defaulted: reading.is_degraded(),
        notes,
    }
}

pub(crate) fn probability(components: &[ScoreComponent]) -> u8 {
    let total: f64 = components
        .iter()
        .map(|component| component.contribution)
        .sum();
    total.round().clamp(0.0, MAX_SUB_SCORE) as u8
}

pub(crate) fn classify(probability: u8, config: &ScoringConfig) -> RiskTier {
    if probability > config.high_threshold {
        RiskTier::High
    } else if probability > config.medium_threshold {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}
