//! Flat-file record decoding
//!
//! A [`RecordDecoder`] turns one raw delimited record into a typed
//! [`StagingRow`] matching the target table's layout. The decoder for a
//! file is resolved once at claim time from the control record's target
//! table; it is not re-dispatched per record.
//!
//! Decode failures carry the source line number and are skippable: the
//! orchestrator counts them against the fail-fast threshold instead of
//! aborting the file.

use csv::StringRecord;

use crate::error::{IngestError, IngestResult};
use crate::record::{FileKind, StagingRow};

/// Decoder for one record kind
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder {
    kind: FileKind,
}

impl RecordDecoder {
    pub fn new(kind: FileKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Decode a single raw record
    ///
    /// The record must carry at least as many fields as the kind's layout;
    /// trailing extra fields are ignored. Required fields must be
    /// non-empty, and every field must convert to its declared type.
    pub fn decode(&self, line: u64, record: &StringRecord) -> IngestResult<StagingRow> {
        let layout = self.kind.layout();

        if record.len() < layout.len() {
            return Err(IngestError::decode(
                line,
                format!(
                    "expected at least {} fields for {}, got {}",
                    layout.len(),
                    self.kind,
                    record.len()
                ),
            ));
        }

        let mut values = Vec::with_capacity(layout.len());
        for (idx, spec) in layout.columns.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");

            if spec.required && raw.trim().is_empty() {
                return Err(IngestError::decode(
                    line,
                    format!("required field '{}' is empty", spec.name),
                ));
            }

            let value = spec
                .data_type
                .convert(raw)
                .map_err(|reason| {
                    IngestError::decode(line, format!("field '{}': {}", spec.name, reason))
                })?;
            values.push(value);
        }

        Ok(StagingRow::new(values))
    }
}

/// Read every raw record of a delimited file into memory
///
/// Reads with a flexible field count so that malformed records surface as
/// per-line decode errors later instead of failing the whole read. An
/// unreadable file (bad encoding, broken quoting) is an orchestration
/// failure.
pub fn read_raw_records(
    content: &str,
    delimiter: u8,
    has_header: bool,
) -> IngestResult<Vec<StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            IngestError::Orchestration(format!("failed to read flat file: {}", e))
        })?;
        records.push(record);
    }

    Ok(records)
}
