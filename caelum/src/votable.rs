//! VOTable serialization for table uploads.
//!
//! The service accepts uploads as VOTable 1.3 documents with an inline
//! TABLEDATA section. Documents are small by construction (the upload row
//! ceiling), so they are written and scanned at the string level.

use crate::table::{Column, ColumnTable, Value};

/// Serialize a column table into a VOTable document.
pub fn write_votable(table: &ColumnTable) -> Vec<u8> {
    let n_rows = table.n_rows();
    let mut out = String::with_capacity(256 + n_rows * table.n_columns() * 16);

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<VOTABLE version=\"1.3\" xmlns=\"http://www.ivoa.net/xml/VOTable/v1.3\">\n");
    out.push_str(" <RESOURCE>\n  <TABLE>\n");

    for col in table.columns() {
        match field_datatype(col) {
            FieldType::Long => {
                out.push_str(&format!(
                    "   <FIELD name=\"{}\" datatype=\"long\"/>\n",
                    escape(&col.name)
                ));
            }
            FieldType::Double => {
                out.push_str(&format!(
                    "   <FIELD name=\"{}\" datatype=\"double\"/>\n",
                    escape(&col.name)
                ));
            }
            FieldType::Char => {
                out.push_str(&format!(
                    "   <FIELD name=\"{}\" datatype=\"char\" arraysize=\"*\"/>\n",
                    escape(&col.name)
                ));
            }
        }
    }

    out.push_str("   <DATA>\n    <TABLEDATA>\n");
    for row in 0..n_rows {
        out.push_str("     <TR>");
        for col in table.columns() {
            out.push_str("<TD>");
            out.push_str(&escape(&col.values[row].cell_text()));
            out.push_str("</TD>");
        }
        out.push_str("</TR>\n");
    }
    out.push_str("    </TABLEDATA>\n   </DATA>\n");
    out.push_str("  </TABLE>\n </RESOURCE>\n</VOTABLE>\n");

    out.into_bytes()
}

/// Count the data rows of a serialized VOTable, if its TABLEDATA section can
/// be located.
pub fn count_rows(bytes: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(bytes).ok()?;
    let start = text.find("<TABLEDATA>")?;
    let end = text.find("</TABLEDATA>")?;
    if end < start {
        return None;
    }
    Some(text[start..end].matches("<TR>").count())
}

enum FieldType {
    Long,
    Double,
    Char,
}

/// Pick the narrowest FIELD datatype that holds every cell of the column.
/// Nulls are ignored; an all-null column serializes as double.
fn field_datatype(col: &Column) -> FieldType {
    let mut seen_float = false;
    for value in &col.values {
        match value {
            Value::Text(_) => return FieldType::Char,
            Value::Float(_) => seen_float = true,
            Value::Int(_) | Value::Null => {}
        }
    }
    let all_null = col.values.iter().all(|v| matches!(v, Value::Null));
    if seen_float || all_null {
        FieldType::Double
    } else {
        FieldType::Long
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
