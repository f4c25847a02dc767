//! FITS binary table decoding for query results.
//!
//! Results come back as FITS files whose first extension is a binary table.
//! cfitsio only reads from paths, so response bytes are staged in a
//! temporary file for the duration of the read.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fitsio::hdu::HduInfo;
use fitsio::FitsFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::table::{Column, Value};

/// A materialized query result.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    columns: Vec<Column>,
}

impl ResultTable {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Look a column up by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Decode a FITS binary table from raw response bytes.
pub(crate) fn read_table(bytes: &[u8]) -> Result<ResultTable> {
    let stage = std::env::temp_dir().join(format!(
        "caelum_result_{}_{}.fits",
        std::process::id(),
        STAGE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&stage, bytes)?;
    let result = read_table_file(&stage);
    let _ = std::fs::remove_file(&stage);
    result
}

fn read_table_file(path: &Path) -> Result<ResultTable> {
    let mut fptr = FitsFile::open(path)?;
    let hdu = fptr.hdu(1)?;

    let names: Vec<String> = match &hdu.info {
        HduInfo::TableInfo {
            column_descriptions,
            ..
        } => column_descriptions.iter().map(|c| c.name.clone()).collect(),
        _ => {
            return Err(Error::Decode {
                reason: "result extension is not a table".into(),
            })
        }
    };
    debug!(columns = names.len(), "reading result table");

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        // cfitsio converts every numeric column on read, so one f64 read
        // covers all of them; what remains is character data.
        let values: Vec<Value> = if let Ok(numeric) = hdu.read_col::<f64>(&mut fptr, &name) {
            numeric.into_iter().map(Value::Float).collect()
        } else if let Ok(text) = hdu.read_col::<String>(&mut fptr, &name) {
            text.into_iter().map(Value::Text).collect()
        } else {
            return Err(Error::Decode {
                reason: format!("column '{}' has an unsupported type", name),
            });
        };
        columns.push(Column::new(name, values));
    }

    Ok(ResultTable { columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn reads_a_single_column_table() {
        let bytes = testing::fits_table(&[("RA", &[10.5, 20.25, 30.0])]);
        let table = read_table(&bytes).unwrap();
        assert_eq!(table.n_columns(), 1);
        assert_eq!(table.n_rows(), 3);
        let col = table.column("RA").unwrap();
        assert_eq!(
            col.values,
            vec![Value::Float(10.5), Value::Float(20.25), Value::Float(30.0)]
        );
    }

    #[test]
    fn reads_multiple_columns_in_order() {
        let bytes = testing::fits_table(&[
            ("RA", &[150.1, 150.2]),
            ("DEC", &[-0.5, -0.25]),
        ]);
        let table = read_table(&bytes).unwrap();
        assert_eq!(table.n_columns(), 2);
        assert_eq!(table.columns()[0].name, "RA");
        assert_eq!(table.columns()[1].name, "DEC");
        assert_eq!(table.column("DEC").unwrap().values[1], Value::Float(-0.25));
    }

    #[test]
    fn rejects_bytes_that_are_not_fits() {
        assert!(read_table(b"definitely not a fits file").is_err());
    }

    #[test]
    fn missing_column_lookup_returns_none() {
        let bytes = testing::fits_table(&[("RA", &[1.0])]);
        let table = read_table(&bytes).unwrap();
        assert!(table.column("DEC").is_none());
    }
}
