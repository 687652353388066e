//! Record builder and serializer.
//!
//! A [`ResultSet`] holds column descriptors plus one [`Record`] per row; the
//! [`encode`] step turns it into the array-of-objects text. All quoting and
//! escaping lives here.

use super::classify::ColumnKind;
use crate::error::{GatewayError, Result};

/// Column name plus its quoting kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One row: rendered values in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Rows sharing one column layout, in cursor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    columns: Vec<ColumnDescriptor>,
    records: Vec<Record>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Appends a record; it must carry exactly one value per column.
    pub fn push(&mut self, values: Vec<String>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(GatewayError::internal(format!(
                "Row has {} values but the result has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.records.push(Record { values });
        Ok(())
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(column, value)` pairs of one record, in column order.
    pub fn fields<'a>(
        &'a self,
        record: &'a Record,
    ) -> impl Iterator<Item = (&'a ColumnDescriptor, &'a str)> + 'a {
        self.columns
            .iter()
            .zip(record.values.iter().map(String::as_str))
    }
}

/// Serializes a result set as `[{"col":value,...},...]` with no whitespace.
///
/// Column names and `Textual` values are JSON strings; `NonTextual` values
/// are copied verbatim, so a non-numeric rendering there produces text
/// that is not strict JSON.
pub fn encode(set: &ResultSet) -> String {
    let mut out = String::from("[");
    for (i, record) in set.records().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('{');
        for (j, (column, value)) in set.fields(record).enumerate() {
            if j > 0 {
                out.push(',');
            }
            push_quoted(&mut out, &column.name);
            out.push(':');
            match column.kind {
                ColumnKind::Textual => push_quoted(&mut out, value),
                ColumnKind::NonTextual => out.push_str(value),
            }
        }
        out.push('}');
    }
    out.push(']');
    out
}

fn push_quoted(out: &mut String, text: &str) {
    out.push_str(&serde_json::Value::from(text).to_string());
}
