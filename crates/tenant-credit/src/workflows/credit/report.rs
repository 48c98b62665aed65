use std::fmt::Write as _;

use super::numeric::{format_amount, NumericReading};
use super::record::{CaseField, CaseRecord, FieldValue};
use super::repository::{FinalizedCase, Verdict};

const MISSING: &str = "N/A";
const UNREADABLE: &str = "-";

/// Produces a formatted document for a case snapshot.
///
/// Implementations must accept any subset of fields, including numeric fields
/// that arrive as pre-formatted strings.
pub trait ReportRenderer: Send + Sync {
    fn render(
        &self,
        record: &CaseRecord,
        verdict: Verdict,
        justification: &str,
    ) -> Result<Vec<u8>, RenderError>;

    fn render_finalized(&self, case: &FinalizedCase) -> Result<Vec<u8>, RenderError> {
        self.render(&case.record, case.verdict, &case.justification)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("report formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("report renderer unavailable: {0}")]
    Unavailable(String),
}

/// Plain-text credit report with the bureau summary, the financial matrix and
/// the final verdict.
#[derive(Debug, Clone)]
pub struct PlainTextReportRenderer {
    title: String,
    currency_symbol: String,
}

impl Default for PlainTextReportRenderer {
    fn default() -> Self {
        Self::new("TENANT CREDIT DESK - CREDIT ANALYSIS REPORT", "R$")
    }
}

impl PlainTextReportRenderer {
    pub fn new(title: impl Into<String>, currency_symbol: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            currency_symbol: currency_symbol.into(),
        }
    }

    fn money(&self, reading: &NumericReading) -> String {
        match reading {
            NumericReading::Parsed(amount) => {
                format!("{} {}", self.currency_symbol, format_amount(*amount))
            }
            NumericReading::Missing => MISSING.to_string(),
            NumericReading::Malformed(_) => UNREADABLE.to_string(),
        }
    }

    fn series_money(&self, values: &[String], index: usize) -> String {
        let value = values.get(index).map(|raw| FieldValue::text(raw.as_str()));
        self.money(&NumericReading::from_value(value.as_ref()))
    }

    fn write_header(&self, out: &mut String, record: &CaseRecord) -> std::fmt::Result {
        writeln!(out, "{}", self.title)?;
        writeln!(out, "{}", "=".repeat(self.title.chars().count()))?;
        writeln!(out)?;
        writeln!(out, "CLIENT: {}", text_or(record, CaseField::ClientName, MISSING))?;
        writeln!(out, "Tax ID: {}", text_or(record, CaseField::TaxId, MISSING))?;

        for field in [
            CaseField::RegisteredAddress,
            CaseField::IncorporationDate,
            CaseField::LegalRepresentatives,
        ] {
            if let Some(value) = record.text(field) {
                writeln!(out, "{}: {}", field.label(), value)?;
            }
        }
        if record.field(CaseField::ShareCapital).is_some() {
            writeln!(
                out,
                "Share capital: {}",
                self.money(&record.number(CaseField::ShareCapital))
            )?;
        }

        writeln!(out, "Property: {}", text_or(record, CaseField::Property, MISSING))?;
        writeln!(
            out,
            "Proposed rent: {}",
            self.money(&record.number(CaseField::MonthlyRent))
        )?;
        writeln!(out, "Lease term: {}", text_or(record, CaseField::LeaseTerm, MISSING))?;
        writeln!(out, "Guarantee: {}", text_or(record, CaseField::Guarantee, MISSING))
    }

    fn write_bureau(&self, out: &mut String, record: &CaseRecord) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "1. CREDIT BUREAU")?;
        writeln!(
            out,
            "Score: {} | Risk: {}",
            text_or(record, CaseField::BureauScore, UNREADABLE),
            text_or(record, CaseField::RiskLevel, UNREADABLE)
        )?;
        writeln!(
            out,
            "Restrictions: {}",
            text_or(record, CaseField::Restrictions, MISSING)
        )
    }

    fn write_financials(&self, out: &mut String, record: &CaseRecord) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "2. FINANCIAL MATRIX")?;

        let years = record.series(CaseField::FiscalYears);
        if years.is_empty() {
            return writeln!(out, "Accounting data not available");
        }

        let revenues = record.series(CaseField::GrossRevenue);
        let incomes = record.series(CaseField::NetIncome);
        writeln!(out, "{:<8} | {:>22} | {:>22}", "YEAR", "GROSS REVENUE", "NET INCOME")?;
        writeln!(out, "{}", "-".repeat(58))?;
        for (index, year) in years.iter().enumerate() {
            writeln!(
                out,
                "{:<8} | {:>22} | {:>22}",
                year.trim(),
                self.series_money(&revenues, index),
                self.series_money(&incomes, index)
            )?;
        }

        for (label, field) in [
            ("Financial rating", CaseField::FinancialRating),
            ("Guarantee rating", CaseField::GuaranteeRating),
        ] {
            if let Some(rating) = record.number(field).value() {
                writeln!(out, "{label}: {}", FieldValue::Number(rating).display())?;
            }
        }
        Ok(())
    }

    fn write_conclusion(
        &self,
        out: &mut String,
        record: &CaseRecord,
        verdict: Verdict,
        justification: &str,
    ) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "3. EXECUTIVE SUMMARY")?;
        writeln!(
            out,
            "{}",
            text_or(record, CaseField::ExecutiveSummary, MISSING)
        )?;
        writeln!(out)?;
        writeln!(out, "VERDICT: {}", verdict.label())?;
        let notes = justification.trim();
        writeln!(out, "Notes: {}", if notes.is_empty() { MISSING } else { notes })
    }
}

impl ReportRenderer for PlainTextReportRenderer {
    fn render(
        &self,
        record: &CaseRecord,
        verdict: Verdict,
        justification: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();
        self.write_header(&mut out, record)?;
        self.write_bureau(&mut out, record)?;
        self.write_financials(&mut out, record)?;
        self.write_conclusion(&mut out, record, verdict, justification)?;
        Ok(out.into_bytes())
    }
}

fn text_or(record: &CaseRecord, field: CaseField, placeholder: &str) -> String {
    record
        .text(field)
        .unwrap_or_else(|| placeholder.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::credit::record::PartialRecord;

    fn render(record: &CaseRecord, verdict: Verdict, notes: &str) -> String {
        let bytes = PlainTextReportRenderer::default()
            .render(record, verdict, notes)
            .expect("report renders");
        String::from_utf8(bytes).expect("utf8 report")
    }

    #[test]
    fn empty_record_renders_placeholders() {
        let report = render(&CaseRecord::new(), Verdict::UnderReview, "");

        assert!(report.contains("CLIENT: N/A"));
        assert!(report.contains("Proposed rent: N/A"));
        assert!(report.contains("Score: - | Risk: -"));
        assert!(report.contains("Accounting data not available"));
        assert!(report.contains("VERDICT: UNDER_REVIEW"));
        assert!(report.contains("Notes: N/A"));
    }

    #[test]
    fn formatted_strings_are_normalised() {
        let record = CaseRecord::from_updates(
            &PartialRecord::new()
                .with(CaseField::ClientName, "Acme Ltda")
                .with(CaseField::MonthlyRent, "R$ 12.500,00")
                .with(CaseField::FiscalYears, FieldValue::series(["2022", "2023"]))
                .with(
                    CaseField::GrossRevenue,
                    FieldValue::series(["1.200.000,00", "1500000"]),
                )
                .with(CaseField::NetIncome, FieldValue::series(["120000.5", "not audited"])),
        );

        let report = render(&record, Verdict::Approved, "Strong balance sheet");

        assert!(report.contains("CLIENT: Acme Ltda"));
        assert!(report.contains("Proposed rent: R$ 12,500.00"));
        assert!(report.contains("R$ 1,200,000.00"));
        assert!(report.contains("R$ 1,500,000.00"));
        assert!(report.contains("R$ 120,000.50"));
        let second_row = report
            .lines()
            .find(|line| line.starts_with("2023"))
            .expect("2023 row present");
        assert!(second_row.trim_end().ends_with('-'));
        assert!(report.contains("Notes: Strong balance sheet"));
    }

    #[test]
    fn short_series_pad_with_placeholders() {
        let record = CaseRecord::from_updates(
            &PartialRecord::new()
                .with(CaseField::FiscalYears, FieldValue::series(["2021", "2022"]))
                .with(CaseField::GrossRevenue, FieldValue::series(["900000"])),
        );

        let report = render(&record, Verdict::Rejected, "thin history");
        let row = report
            .lines()
            .find(|line| line.starts_with("2022"))
            .expect("2022 row present");
        assert!(row.contains("N/A"));
    }
}
