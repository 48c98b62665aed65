use serde_json::Value;

use super::record::{CaseField, PartialRecord};
use super::sequencer::CaseStep;

/// Everything an extractor needs to populate one step of a case.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub step: CaseStep,
    pub field_schema: Vec<CaseField>,
    pub documents: Vec<Vec<u8>>,
    /// Already-confirmed fields the extractor may use as hints (e.g. the
    /// proposed rent when auditing accounting statements).
    pub context: PartialRecord,
}

impl ExtractionRequest {
    pub fn new(step: CaseStep, documents: Vec<Vec<u8>>) -> Self {
        Self {
            step,
            field_schema: step.field_schema(),
            documents,
            context: PartialRecord::new(),
        }
    }

    pub fn with_context(mut self, context: PartialRecord) -> Self {
        self.context = context;
        self
    }

    pub fn schema_keys(&self) -> Vec<&'static str> {
        self.field_schema.iter().map(|field| field.key()).collect()
    }
}

/// Best-effort field extraction from uploaded documents.
///
/// Partial results are a success; implementations fail only when nothing
/// usable could be read.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, request: &ExtractionRequest) -> Result<PartialRecord, ExtractionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no documents supplied for {0:?} extraction")]
    NoDocuments(CaseStep),
    #[error("document {index} is not readable UTF-8 text")]
    Unreadable { index: usize },
    #[error("document {index} does not contain a JSON object")]
    MissingPayload { index: usize },
    #[error("document {index} contains invalid JSON: {source}")]
    InvalidJson {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("extraction service unavailable: {0}")]
    Unavailable(String),
}

/// Reads structured replies (a JSON object, possibly wrapped in prose or
/// Markdown fences) such as those returned by a document-reading model.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReplyExtractor;

impl DocumentExtractor for JsonReplyExtractor {
    fn extract(&self, request: &ExtractionRequest) -> Result<PartialRecord, ExtractionError> {
        if request.documents.is_empty() {
            return Err(ExtractionError::NoDocuments(request.step));
        }

        let mut extracted = PartialRecord::new();
        for (index, document) in request.documents.iter().enumerate() {
            let text = std::str::from_utf8(document)
                .map_err(|_| ExtractionError::Unreadable { index })?;
            extracted.absorb(parse_reply(index, text)?);
        }

        Ok(extracted)
    }
}

/// Parse the JSON object spanning the first `{` to the last `}` of `text`.
pub fn parse_reply(index: usize, text: &str) -> Result<PartialRecord, ExtractionError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let payload = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(ExtractionError::MissingPayload { index }),
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(object)) => Ok(PartialRecord::from_json_object(object)),
        Ok(_) => Err(ExtractionError::MissingPayload { index }),
        Err(source) => Err(ExtractionError::InvalidJson { index, source }),
    }
}
