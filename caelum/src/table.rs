//! In-memory tables and upload normalization.
//!
//! A query may carry a small user table to be joined against server-side
//! catalogs. Three source shapes are accepted, modeled as an explicit sum
//! type: column-oriented ([`ColumnTable`]), row-oriented ([`RowTable`]) and
//! an already-serialized VOTable document. Everything is normalized to a
//! bounded VOTable payload before submission.

use tracing::warn;

use crate::error::{Error, Result};
use crate::votable;

/// The service rejects uploads beyond this many rows, so larger tables are
/// cut to this prefix before encoding.
pub const MAX_UPLOAD_ROWS: usize = 6000;

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    /// Cell content as it appears inside a VOTable `<TD>` element.
    pub(crate) fn cell_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Null => String::new(),
        }
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Column-oriented table with named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    columns: Vec<Column>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.columns.push(Column::new(name, values));
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// All columns must exist and agree on length.
    fn check_shape(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::UnsupportedUpload("table has no columns".into()));
        }
        let expected = self.columns[0].values.len();
        for col in &self.columns {
            if col.values.len() != expected {
                return Err(Error::UnsupportedUpload(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name,
                    col.values.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    fn truncate_rows(&mut self, keep: usize) {
        for col in &mut self.columns {
            col.values.truncate(keep);
        }
    }
}

/// Row-oriented table: a header plus one record per row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { header, rows }
    }

    /// Transpose into column order. Ragged rows are rejected.
    fn into_columns(self) -> Result<ColumnTable> {
        if self.header.is_empty() {
            return Err(Error::UnsupportedUpload("table has no columns".into()));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.header.len() {
                return Err(Error::UnsupportedUpload(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    self.header.len()
                )));
            }
        }
        let mut columns: Vec<Column> = self
            .header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(self.rows.len())))
            .collect();
        for row in self.rows {
            for (col, value) in columns.iter_mut().zip(row) {
                col.values.push(value);
            }
        }
        Ok(ColumnTable { columns })
    }
}

/// The accepted upload shapes.
#[derive(Debug, Clone)]
pub enum TableUpload {
    /// Column-oriented named columns.
    Columns(ColumnTable),
    /// Header plus row records.
    Rows(RowTable),
    /// An already-serialized VOTable document. Cannot be truncated, so it is
    /// rejected outright when over the row ceiling.
    Votable(Vec<u8>),
}

/// Non-fatal notice that an oversized upload was cut to the leading rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationNotice {
    pub original_rows: usize,
    pub kept_rows: usize,
}

impl std::fmt::Display for TruncationNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "upload cut from {} to the first {} rows",
            self.original_rows, self.kept_rows
        )
    }
}

/// Wire-ready upload payload.
#[derive(Debug, Clone)]
pub struct EncodedTable {
    pub bytes: Vec<u8>,
    pub truncated: Option<TruncationNotice>,
}

/// Normalize and serialize an upload into a VOTable payload.
///
/// Tables over [`MAX_UPLOAD_ROWS`] are cut to the leading rows and the cut is
/// reported through [`EncodedTable::truncated`]; oversize input never fails
/// on its own. The exception is the pre-serialized VOTable shape, which
/// cannot be cut safely and yields [`Error::UploadTooLarge`].
pub fn encode(upload: TableUpload) -> Result<EncodedTable> {
    let mut table = match upload {
        TableUpload::Columns(table) => {
            table.check_shape()?;
            table
        }
        TableUpload::Rows(rows) => rows.into_columns()?,
        TableUpload::Votable(bytes) => {
            let rows = votable::count_rows(&bytes).ok_or_else(|| {
                Error::UnsupportedUpload("votable row count could not be determined".into())
            })?;
            if rows > MAX_UPLOAD_ROWS {
                return Err(Error::UploadTooLarge {
                    rows,
                    limit: MAX_UPLOAD_ROWS,
                });
            }
            return Ok(EncodedTable {
                bytes,
                truncated: None,
            });
        }
    };

    let truncated = if table.n_rows() > MAX_UPLOAD_ROWS {
        let notice = TruncationNotice {
            original_rows: table.n_rows(),
            kept_rows: MAX_UPLOAD_ROWS,
        };
        warn!("{notice}");
        table.truncate_rows(MAX_UPLOAD_ROWS);
        Some(notice)
    } else {
        None
    };

    Ok(EncodedTable {
        bytes: votable::write_votable(&table),
        truncated,
    })
}
