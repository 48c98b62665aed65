//! Ordered step machine for an in-progress credit case.
//!
//! Step order lives in [`CaseStep::ORDER`]; `advance` and `retreat` are lookups
//! into that table, so inserting or reordering a step only touches the table.
//! The sequencer never inspects record contents.

use serde::{Deserialize, Serialize};

use super::record::CaseField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStep {
    Corporate,
    Proposal,
    CreditBureau,
    Financials,
    Decision,
}

impl CaseStep {
    pub const ORDER: [Self; 5] = [
        Self::Corporate,
        Self::Proposal,
        Self::CreditBureau,
        Self::Financials,
        Self::Decision,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Corporate => "Corporate Charter",
            Self::Proposal => "Rental Proposal",
            Self::CreditBureau => "Credit Bureau",
            Self::Financials => "Financial Statements",
            Self::Decision => "Decision",
        }
    }

    /// Zero-based position in [`CaseStep::ORDER`].
    pub fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|step| *step == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Option<Self> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .and_then(|index| Self::ORDER.get(index).copied())
    }

    pub const fn first() -> Self {
        Self::ORDER[0]
    }

    pub fn is_final(self) -> bool {
        self.next().is_none()
    }

    /// Fields an extraction at this step is expected to populate.
    pub fn field_schema(self) -> Vec<CaseField> {
        CaseField::ALL
            .into_iter()
            .filter(|field| field.step() == self)
            .collect()
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "corporate" => Some(Self::Corporate),
            "proposal" => Some(Self::Proposal),
            "credit_bureau" => Some(Self::CreditBureau),
            "financials" => Some(Self::Financials),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

/// Rejected step transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("cannot advance past the final step ({0:?}); finalize or reset the case")]
    AtFinalStep(CaseStep),
    #[error("cannot retreat before the first step ({0:?})")]
    AtFirstStep(CaseStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTransition {
    Advance,
    Retreat,
    Reset,
}

/// Tracks the active step; transitions move at most one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSequencer {
    current: CaseStep,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    pub const fn new() -> Self {
        Self {
            current: CaseStep::first(),
        }
    }

    pub fn current(&self) -> CaseStep {
        self.current
    }

    /// Resolve where `transition` would lead without applying it.
    pub fn target(&self, transition: StepTransition) -> Result<CaseStep, SequenceError> {
        match transition {
            StepTransition::Advance => self
                .current
                .next()
                .ok_or(SequenceError::AtFinalStep(self.current)),
            StepTransition::Retreat => self
                .current
                .previous()
                .ok_or(SequenceError::AtFirstStep(self.current)),
            StepTransition::Reset => Ok(CaseStep::first()),
        }
    }

    pub fn apply(&mut self, transition: StepTransition) -> Result<CaseStep, SequenceError> {
        let target = self.target(transition)?;
        self.current = target;
        Ok(target)
    }

    pub fn advance(&mut self) -> Result<CaseStep, SequenceError> {
        self.apply(StepTransition::Advance)
    }

    pub fn retreat(&mut self) -> Result<CaseStep, SequenceError> {
        self.apply(StepTransition::Retreat)
    }

    pub fn reset(&mut self) -> CaseStep {
        self.current = CaseStep::first();
        self.current
    }
}
