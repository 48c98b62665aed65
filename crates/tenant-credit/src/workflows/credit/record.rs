use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::numeric::NumericReading;
use super::sequencer::CaseStep;

/// Single value held by a case record field.
///
/// Serialises untagged so a record reads as a flat JSON object. Deserialising
/// accepts any JSON value; `null` becomes an empty text value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Series(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn series<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Series(items.into_iter().map(Into::into).collect())
    }

    /// Whitespace-only text and empty series are empty; numbers never are.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(text) => text.trim().is_empty(),
            Self::Series(items) => items.is_empty(),
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Text(String::new()),
            Value::Bool(flag) => Self::Text(flag.to_string()),
            Value::Number(number) => match number.as_f64() {
                Some(number) => Self::Number(number),
                None => Self::Text(number.to_string()),
            },
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::Series(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Null => None,
                        Value::String(text) => Some(text),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
            object @ Value::Object(_) => Self::Text(object.to_string()),
        }
    }

    /// Human readable rendering; whole numbers drop the fractional part.
    pub fn display(&self) -> String {
        match self {
            Self::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{number:.0}")
            }
            Self::Number(number) => number.to_string(),
            Self::Text(text) => text.trim().to_string(),
            Self::Series(items) => items.join(", "),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Fields the workflow knows how to interpret, grouped by the step that
/// normally populates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseField {
    ClientName,
    TaxId,
    RegisteredAddress,
    IncorporationDate,
    ShareCapital,
    LegalRepresentatives,
    Property,
    MonthlyRent,
    LeaseTerm,
    Guarantee,
    BureauScore,
    RiskLevel,
    Restrictions,
    FiscalYears,
    GrossRevenue,
    NetIncome,
    FinancialRating,
    GuaranteeRating,
    ExecutiveSummary,
}

impl CaseField {
    pub const ALL: [Self; 19] = [
        Self::ClientName,
        Self::TaxId,
        Self::RegisteredAddress,
        Self::IncorporationDate,
        Self::ShareCapital,
        Self::LegalRepresentatives,
        Self::Property,
        Self::MonthlyRent,
        Self::LeaseTerm,
        Self::Guarantee,
        Self::BureauScore,
        Self::RiskLevel,
        Self::Restrictions,
        Self::FiscalYears,
        Self::GrossRevenue,
        Self::NetIncome,
        Self::FinancialRating,
        Self::GuaranteeRating,
        Self::ExecutiveSummary,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ClientName => "client_name",
            Self::TaxId => "tax_id",
            Self::RegisteredAddress => "registered_address",
            Self::IncorporationDate => "incorporation_date",
            Self::ShareCapital => "share_capital",
            Self::LegalRepresentatives => "legal_representatives",
            Self::Property => "property",
            Self::MonthlyRent => "monthly_rent",
            Self::LeaseTerm => "lease_term",
            Self::Guarantee => "guarantee",
            Self::BureauScore => "bureau_score",
            Self::RiskLevel => "risk_level",
            Self::Restrictions => "restrictions",
            Self::FiscalYears => "fiscal_years",
            Self::GrossRevenue => "gross_revenue",
            Self::NetIncome => "net_income",
            Self::FinancialRating => "financial_rating",
            Self::GuaranteeRating => "guarantee_rating",
            Self::ExecutiveSummary => "executive_summary",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ClientName => "Client",
            Self::TaxId => "Tax ID",
            Self::RegisteredAddress => "Registered address",
            Self::IncorporationDate => "Incorporation date",
            Self::ShareCapital => "Share capital",
            Self::LegalRepresentatives => "Legal representatives",
            Self::Property => "Property",
            Self::MonthlyRent => "Monthly rent",
            Self::LeaseTerm => "Lease term",
            Self::Guarantee => "Guarantee",
            Self::BureauScore => "Bureau score",
            Self::RiskLevel => "Risk level",
            Self::Restrictions => "Restrictions",
            Self::FiscalYears => "Fiscal years",
            Self::GrossRevenue => "Gross revenue",
            Self::NetIncome => "Net income",
            Self::FinancialRating => "Financial rating",
            Self::GuaranteeRating => "Guarantee rating",
            Self::ExecutiveSummary => "Executive summary",
        }
    }

    pub const fn step(self) -> CaseStep {
        match self {
            Self::ClientName
            | Self::TaxId
            | Self::RegisteredAddress
            | Self::IncorporationDate
            | Self::ShareCapital
            | Self::LegalRepresentatives => CaseStep::Corporate,
            Self::Property | Self::MonthlyRent | Self::LeaseTerm | Self::Guarantee => {
                CaseStep::Proposal
            }
            Self::BureauScore | Self::RiskLevel | Self::Restrictions => CaseStep::CreditBureau,
            Self::FiscalYears
            | Self::GrossRevenue
            | Self::NetIncome
            | Self::FinancialRating
            | Self::GuaranteeRating
            | Self::ExecutiveSummary => CaseStep::Financials,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Sparse set of field updates produced by an extraction or a manual edit.
///
/// Unlike [`CaseRecord`], updates may carry empty values; the merge rule
/// decides whether they touch the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl PartialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_object(object: serde_json::Map<String, Value>) -> Self {
        let fields = object
            .into_iter()
            .map(|(key, value)| (key, FieldValue::from_json(value)))
            .collect();
        Self { fields }
    }

    pub fn with(mut self, field: CaseField, value: impl Into<FieldValue>) -> Self {
        self.insert(field.key(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Fold another partial result in, using the record merge rule.
    pub fn absorb(&mut self, other: PartialRecord) {
        for (key, value) in other.fields {
            if should_write(self.fields.get(&key), &value) {
                self.fields.insert(key, value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl FromIterator<(String, FieldValue)> for PartialRecord {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Keys touched and left alone by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub written: Vec<String>,
    pub kept: Vec<String>,
}

/// The accumulating field bag for one case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl CaseRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_updates(updates: &PartialRecord) -> Self {
        let mut record = Self::new();
        record.merge(updates);
        record
    }

    pub fn merge(&mut self, updates: &PartialRecord) -> MergeSummary {
        merge(self, updates)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn field(&self, field: CaseField) -> Option<&FieldValue> {
        self.get(field.key()).filter(|value| !value.is_empty())
    }

    pub fn text(&self, field: CaseField) -> Option<String> {
        self.field(field).map(FieldValue::display)
    }

    pub fn number(&self, field: CaseField) -> NumericReading {
        NumericReading::from_value(self.get(field.key()))
    }

    /// Series fields; a lone scalar is read as a one-element series.
    pub fn series(&self, field: CaseField) -> Vec<String> {
        match self.field(field) {
            Some(FieldValue::Series(items)) => items.clone(),
            Some(other) => vec![other.display()],
            None => Vec::new(),
        }
    }

    pub fn client_name(&self) -> Option<String> {
        self.text(CaseField::ClientName)
    }

    /// True when no field holds a non-empty value.
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(FieldValue::is_empty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn should_write(existing: Option<&FieldValue>, incoming: &FieldValue) -> bool {
    existing.map_or(true, FieldValue::is_empty) || !incoming.is_empty()
}

/// Fill/override-with-non-empty merge of `updates` into `record`.
///
/// An incoming value is written when the existing value is absent or empty, or
/// when the incoming value itself is non-empty. Empty updates never blank out a
/// populated field, which makes the merge idempotent.
pub fn merge(record: &mut CaseRecord, updates: &PartialRecord) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for (key, value) in &updates.fields {
        if should_write(record.fields.get(key), value) {
            record.fields.insert(key.clone(), value.clone());
            summary.written.push(key.clone());
        } else {
            summary.kept.push(key.clone());
        }
    }

    summary
}
