//! Batching of decoded record streams
//!
//! Batch numbers are 1-based windows over raw record positions, so the
//! boundaries of batch N are identical in every process that reads the
//! same file. That stability is what makes resume-from-batch exact: a
//! malformed record still occupies its slot, and [`Batcher::resume_from`]
//! seeks past committed batches without re-decoding or re-emitting them.

use csv::StringRecord;

use crate::decode::RecordDecoder;
use crate::record::StagingRow;

/// One record skipped during decode
#[derive(Debug, Clone)]
pub struct DecodeSkip {
    pub line: u64,
    pub reason: String,
}

/// One batch of decoded rows
#[derive(Debug)]
pub struct Batch {
    /// 1-based batch number
    pub number: u32,
    pub rows: Vec<StagingRow>,
    pub skips: Vec<DecodeSkip>,
}

/// Splits a file's raw records into fixed-size, restartable batches
pub struct Batcher {
    records: Vec<StringRecord>,
    decoder: RecordDecoder,
    batch_size: usize,
    /// Next batch number to emit (1-based)
    next_batch: u32,
    /// Source line of the first data record (2 when a header was skipped)
    first_line: u64,
}

impl Batcher {
    pub fn new(
        decoder: RecordDecoder,
        records: Vec<StringRecord>,
        batch_size: usize,
        has_header: bool,
    ) -> Self {
        Self {
            records,
            decoder,
            batch_size: batch_size.max(1),
            next_batch: 1,
            first_line: if has_header { 2 } else { 1 },
        }
    }

    /// Total raw records in the file (header excluded)
    pub fn total_records(&self) -> usize {
        self.records.len()
    }

    /// Total number of batches the file splits into
    pub fn total_batches(&self) -> u32 {
        self.records.len().div_ceil(self.batch_size) as u32
    }

    /// Seek past batches 1..=committed without decoding them
    ///
    /// Used when resuming a run whose control record already holds
    /// `current_batch = committed`.
    pub fn resume_from(&mut self, committed: u32) {
        self.next_batch = committed + 1;
    }

    /// Decode and return the next batch, or None when exhausted
    pub fn next_batch(&mut self) -> Option<Batch> {
        let number = self.next_batch;
        let start = (number as usize - 1) * self.batch_size;
        if start >= self.records.len() {
            return None;
        }

        let end = (start + self.batch_size).min(self.records.len());
        let mut rows = Vec::with_capacity(end - start);
        let mut skips = Vec::new();

        for (offset, record) in self.records[start..end].iter().enumerate() {
            let line = self.first_line + (start + offset) as u64;
            match self.decoder.decode(line, record) {
                Ok(row) => rows.push(row),
                Err(e) => skips.push(DecodeSkip {
                    line,
                    reason: e.to_string(),
                }),
            }
        }

        self.next_batch += 1;
        Some(Batch {
            number,
            rows,
            skips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileKind;

    fn marks_records(n: usize) -> Vec<StringRecord> {
        (0..n)
            .map(|i| {
                StringRecord::from(vec![
                    format!("BOL{}", i),
                    "MSKU1234567".to_string(),
                    "1".to_string(),
                    "NO MARKS".to_string(),
                ])
            })
            .collect()
    }

    fn batcher(records: Vec<StringRecord>, batch_size: usize) -> Batcher {
        Batcher::new(
            RecordDecoder::new(FileKind::MarksNumbers),
            records,
            batch_size,
            false,
        )
    }

    #[test]
    fn test_batch_sizes_and_numbering() {
        let mut b = batcher(marks_records(5), 2);
        assert_eq!(b.total_records(), 5);
        assert_eq!(b.total_batches(), 3);

        let first = b.next_batch().unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(first.rows.len(), 2);

        let second = b.next_batch().unwrap();
        assert_eq!(second.number, 2);
        assert_eq!(second.rows.len(), 2);

        let third = b.next_batch().unwrap();
        assert_eq!(third.number, 3);
        assert_eq!(third.rows.len(), 1);

        assert!(b.next_batch().is_none());
    }

    #[test]
    fn test_resume_skips_committed_batches() {
        let mut b = batcher(marks_records(5), 2);
        b.resume_from(2);

        let batch = b.next_batch().unwrap();
        assert_eq!(batch.number, 3);
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.rows[0].identifier(), Some("BOL4"));
        assert!(b.next_batch().is_none());
    }

    #[test]
    fn test_resume_past_end_yields_nothing() {
        let mut b = batcher(marks_records(4), 2);
        b.resume_from(2);
        assert!(b.next_batch().is_none());
    }

    #[test]
    fn test_malformed_record_occupies_its_slot() {
        let mut records = marks_records(3);
        // Break the second record's sequence number
        records[1] = StringRecord::from(vec!["BOL1", "MSKU1234567", "xx", "NO MARKS"]);

        let mut b = batcher(records, 2);

        let first = b.next_batch().unwrap();
        assert_eq!(first.rows.len(), 1);
        assert_eq!(first.skips.len(), 1);
        assert_eq!(first.skips[0].line, 2);
        assert!(first.skips[0].reason.contains("marks_sequence_number"));

        // The bad record did not shift the next batch's contents
        let second = b.next_batch().unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].identifier(), Some("BOL2"));
    }

    #[test]
    fn test_header_offsets_line_numbers() {
        let mut b = Batcher::new(
            RecordDecoder::new(FileKind::MarksNumbers),
            marks_records(1),
            10,
            true,
        );
        let batch = b.next_batch().unwrap();
        assert!(batch.skips.is_empty());

        // First data record of a headered file is physical line 2
        let mut records = marks_records(1);
        records[0] = StringRecord::from(vec!["BOL0", "MSKU1234567", "bad", "X"]);
        let mut b = Batcher::new(
            RecordDecoder::new(FileKind::MarksNumbers),
            records,
            10,
            true,
        );
        let batch = b.next_batch().unwrap();
        assert_eq!(batch.skips[0].line, 2);
    }

    #[test]
    fn test_empty_file() {
        let mut b = batcher(Vec::new(), 100);
        assert_eq!(b.total_batches(), 0);
        assert!(b.next_batch().is_none());
    }
}
