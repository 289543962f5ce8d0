//! Staging-table writes
//!
//! Persists decoded batches into the `ams_*_load` table for their kind.
//! All statements run inside the transaction supplied by the caller, so a
//! batch is never partially visible: either every row of the batch (and
//! the progress update sharing the transaction) commits, or none do.
//!
//! Multi-row INSERTs are chunked to stay under Postgres's 65535
//! bind-parameter limit; chunking changes statement count, not atomicity.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use crate::control::SYSTEM_USER;
use crate::error::{IngestError, IngestResult};
use crate::record::{DataType, FieldValue, FileKind, StagingRow};

/// Headroom under Postgres's hard limit of 65535 bind parameters
const MAX_BIND_PARAMS: usize = 60_000;

/// Revision stamped on newly loaded rows
const INITIAL_REVISION: i32 = 1;

/// Data status marker for newly loaded rows (downstream promotion states
/// are reserved and never written by the engine)
const DATA_STATUS_LOADED: i16 = 0;

/// Writes decoded batches into staging tables
#[derive(Debug, Clone, Copy, Default)]
pub struct StagingWriter;

impl StagingWriter {
    pub fn new() -> Self {
        Self
    }

    /// Insert one batch of rows, tagged with the run's `load_batch_no`
    ///
    /// Returns the number of rows written. The caller owns the
    /// transaction; nothing here commits or rolls back.
    pub async fn write_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: FileKind,
        load_batch_no: &str,
        rows: &[StagingRow],
    ) -> IngestResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let layout = kind.layout();
        for row in rows {
            if row.values.len() != layout.len() {
                return Err(IngestError::Orchestration(format!(
                    "row arity mismatch for {}: expected {} values, got {}",
                    kind,
                    layout.len(),
                    row.values.len()
                )));
            }
        }

        let per_statement = rows_per_statement(kind);
        let mut written: u64 = 0;

        for chunk in rows.chunks(per_statement) {
            let sql = build_insert_sql(kind, chunk.len());
            let mut query = sqlx::query(&sql);

            for row in chunk {
                for (spec, value) in layout.columns.iter().zip(&row.values) {
                    query = bind_field(query, spec.data_type, value);
                }
                query = query
                    .bind(INITIAL_REVISION)
                    .bind(load_batch_no)
                    .bind(DATA_STATUS_LOADED)
                    .bind(SYSTEM_USER);
            }

            let result = query.execute(&mut **tx).await?;
            written += result.rows_affected();
        }

        debug!(table = kind.table(), rows = written, "batch staged");
        Ok(written)
    }
}

/// Bind one typed field, using a typed NULL so Postgres never has to
/// guess the parameter type of an empty column
fn bind_field<'q>(
    query: Query<'q, Postgres, PgArguments>,
    data_type: DataType,
    value: &'q FieldValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        FieldValue::Text(s) => query.bind(s.as_str()),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Decimal(d) => query.bind(*d),
        FieldValue::Date(d) => query.bind(*d),
        FieldValue::Boolean(b) => query.bind(*b),
        FieldValue::Null => match data_type {
            DataType::Text => query.bind(Option::<String>::None),
            DataType::Integer => query.bind(Option::<i64>::None),
            DataType::Decimal => query.bind(Option::<f64>::None),
            DataType::Date => query.bind(Option::<chrono::NaiveDate>::None),
            DataType::Boolean => query.bind(Option::<bool>::None),
        },
    }
}

/// Bind parameters consumed by one row: the layout's payload columns plus
/// revision, load_batch_no, data_status, and created_by
fn binds_per_row(kind: FileKind) -> usize {
    kind.layout().len() + 4
}

/// How many rows fit in one INSERT under the parameter budget
fn rows_per_statement(kind: FileKind) -> usize {
    (MAX_BIND_PARAMS / binds_per_row(kind)).max(1)
}

/// Build a multi-row INSERT for `row_count` rows of this kind
fn build_insert_sql(kind: FileKind, row_count: usize) -> String {
    let layout = kind.layout();
    let mut columns: Vec<&str> = layout.column_names().collect();
    columns.push(kind.revision_column());
    columns.push("load_batch_no");
    columns.push("data_status");
    columns.push("created_by");

    let width = columns.len();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        kind.table(),
        columns.join(", ")
    );

    for row in 0..row_count {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push('$');
            sql.push_str(&(row * width + col + 1).to_string());
        }
        sql.push(')');
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_insert_sql_single_row() {
        let sql = build_insert_sql(FileKind::HazmatClass, 1);
        assert!(sql.starts_with(
            "INSERT INTO ams_hazmatclass_load (identifier, container_number, \
             hazmat_sequence_number, hazmat_classification, hazmatclass_revision, \
             load_batch_no, data_status, created_by) VALUES "
        ));
        assert!(sql.ends_with("($1, $2, $3, $4, $5, $6, $7, $8)"));
    }

    #[test]
    fn test_build_insert_sql_numbers_placeholders_across_rows() {
        let sql = build_insert_sql(FileKind::MarksNumbers, 2);
        // 4 payload columns + 4 common columns = 8 binds per row
        assert!(sql.contains("($1, $2, $3, $4, $5, $6, $7, $8)"));
        assert!(sql.contains("($9, $10, $11, $12, $13, $14, $15, $16)"));
    }

    #[test]
    fn test_rows_per_statement_stays_under_limit() {
        for kind in FileKind::ALL {
            let per_row = binds_per_row(kind);
            let rows = rows_per_statement(kind);
            assert!(rows >= 1);
            assert!(rows * per_row <= MAX_BIND_PARAMS);
            assert!((rows + 1) * per_row > MAX_BIND_PARAMS);
        }
    }

    #[test]
    fn test_binds_per_row_tracks_layout() {
        assert_eq!(binds_per_row(FileKind::MarksNumbers), 8);
        assert_eq!(binds_per_row(FileKind::Header), 17);
    }
}
