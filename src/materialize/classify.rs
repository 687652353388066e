//! Column classification.
//!
//! Decides, from the database-reported type name alone, whether a column's
//! values are quoted in the serialized output. Everything that is not one of
//! the configured textual types (numbers, booleans, dates, blobs) is
//! `NonTextual`.

/// Binary column kind used by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Values are emitted as quoted, escaped strings.
    Textual,
    /// Values are emitted verbatim.
    NonTextual,
}

/// Maps a database type name to a [`ColumnKind`].
pub trait ColumnClassifier: Send + Sync {
    fn classify(&self, type_name: &str) -> ColumnKind;
}

impl<F> ColumnClassifier for F
where
    F: Fn(&str) -> ColumnKind + Send + Sync,
{
    fn classify(&self, type_name: &str) -> ColumnKind {
        self(type_name)
    }
}

/// Classifier backed by a fixed set of textual type names.
///
/// Matching is exact and case-insensitive: `VARCHAR` does not cover
/// `VARCHAR(255)` or `CHAR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNameClassifier {
    textual: Vec<String>,
}

impl TypeNameClassifier {
    pub fn new<I, S>(textual: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            textual: textual
                .into_iter()
                .map(|name| name.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }
}

impl Default for TypeNameClassifier {
    fn default() -> Self {
        Self::new(["VARCHAR"])
    }
}

impl ColumnClassifier for TypeNameClassifier {
    fn classify(&self, type_name: &str) -> ColumnKind {
        let type_name = type_name.trim();
        if self
            .textual
            .iter()
            .any(|t| t.eq_ignore_ascii_case(type_name))
        {
            ColumnKind::Textual
        } else {
            ColumnKind::NonTextual
        }
    }
}
