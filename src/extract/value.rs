//! Field values and records
//!
//! A [`Record`] keeps its fields in declaration order. A field is either a
//! [`FieldValue`] or explicitly absent; absence serializes as `null`, which
//! keeps it distinct from an empty string.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A typed value produced by an extraction pipeline
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Returns true for empty text; other values are never empty
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Flat rendering used by `join` and by the CSV writer
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// One completed output entity
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    extractor: String,
    source_url: String,
    fields: Vec<(String, Option<FieldValue>)>,
}

impl Record {
    /// Creates an empty record for the given extractor and page
    pub fn new(extractor: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            source_url: source_url.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field; declaration order is output order
    pub fn push(&mut self, name: impl Into<String>, value: Option<FieldValue>) {
        self.fields.push((name.into(), value));
    }

    /// Name of the extractor that produced this record
    pub fn extractor(&self) -> &str {
        &self.extractor
    }

    /// URL of the page this record was extracted from
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// All fields in order
    pub fn fields(&self) -> &[(String, Option<FieldValue>)] {
        &self.fields
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Value of a field; `None` if the field is absent or undeclared
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// True if the field is declared but has no value
    pub fn is_absent(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, v)| n == name && v.is_none())
    }

    /// Restricts the record to the given fields, in the given order
    ///
    /// An empty selection keeps every field. Selected names the record does
    /// not declare are reported as absent.
    pub fn project<'a>(&'a self, selection: &'a [String]) -> RecordView<'a> {
        let entries = if selection.is_empty() {
            self.fields
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_ref()))
                .collect()
        } else {
            selection
                .iter()
                .map(|name| {
                    let value = self
                        .fields
                        .iter()
                        .find(|(n, _)| n == name)
                        .and_then(|(_, v)| v.as_ref());
                    (name.as_str(), value)
                })
                .collect()
        };
        RecordView { entries }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.project(&[]).serialize(serializer)
    }
}

/// An ordered, borrowed selection of a record's fields
#[derive(Debug, Clone)]
pub struct RecordView<'a> {
    entries: Vec<(&'a str, Option<&'a FieldValue>)>,
}

impl<'a> RecordView<'a> {
    pub fn entries(&self) -> &[(&'a str, Option<&'a FieldValue>)] {
        &self.entries
    }
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new("job", "https://www.reed.co.uk/jobs/data/4821");
        record.push("id", Some(FieldValue::Integer(4821)));
        record.push("title", Some(FieldValue::from("Data Scientist")));
        record.push("salary", None);
        record.push("employer", Some(FieldValue::from("")));
        record
    }

    #[test]
    fn test_serialization_keeps_declaration_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"id":4821,"title":"Data Scientist","salary":null,"employer":""}"#
        );
    }

    #[test]
    fn test_absent_distinct_from_empty() {
        let record = sample();
        assert!(record.is_absent("salary"));
        assert!(!record.is_absent("employer"));
        assert_eq!(record.get("employer"), Some(&FieldValue::from("")));
        assert_eq!(record.get("salary"), None);
    }

    #[test]
    fn test_projection_orders_and_fills_missing() {
        let record = sample();
        let selection = vec!["title".to_string(), "id".to_string(), "country".to_string()];
        let json = serde_json::to_string(&record.project(&selection)).unwrap();
        assert_eq!(json, r#"{"title":"Data Scientist","id":4821,"country":null}"#);
    }

    #[test]
    fn test_list_display() {
        let skills = FieldValue::List(vec!["SQL".into(), "Python".into()]);
        assert_eq!(skills.to_string(), "SQL,Python");
        assert_eq!(
            serde_json::to_string(&skills).unwrap(),
            r#"["SQL","Python"]"#
        );
    }
}
