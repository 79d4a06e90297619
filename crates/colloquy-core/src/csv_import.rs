//! Conversion of arbitrary CSV tables into ingestion payloads.
//!
//! Each column gets an attribute definition whose type is sniffed from the
//! header and the column's values. Rows become records keyed by header, in
//! header order.

use crate::error::ColloquyResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::io::Read;
use tracing::{debug, info};

/// Project name written when none is configured
pub const DEFAULT_IMPORT_PROJECT_NAME: &str = "<YOUR PROJECT NAME>";

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

/// Kind of data held by a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Record identifier
    Id,
    /// Numeric values
    Number,
    /// ISO dates
    Date,
    /// Free text averaging more than two words
    Verbatim,
    /// Short text
    Text,
}

fn is_number(value: &str) -> bool {
    let digits = value.replacen('.', "", 1);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn word_count(value: &str) -> usize {
    value.split_whitespace().count()
}

impl ColumnKind {
    /// Sniff the kind of a column, first match wins:
    /// id header, all numbers, all dates (or a date header), wordy text, text.
    #[must_use]
    pub fn detect(header: &str, values: &[&str]) -> Self {
        let upper = header.to_uppercase();
        if upper.contains("NATURAL_ID") {
            return Self::Id;
        }
        if values.iter().all(|v| is_number(v)) {
            return Self::Number;
        }
        if upper.contains("DATE") || values.iter().all(|v| ISO_DATE.is_match(v)) {
            return Self::Date;
        }

        let words: usize = values.iter().map(|v| word_count(v)).sum();
        if words as f64 / values.len() as f64 > 2.0 {
            Self::Verbatim
        } else {
            Self::Text
        }
    }

    /// Attribute value type
    #[must_use]
    pub const fn attribute_type(self) -> &'static str {
        match self {
            Self::Id | Self::Text | Self::Verbatim => "TEXT",
            Self::Number => "NUMBER",
            Self::Date => "DATE",
        }
    }

    /// Attribute target field
    #[must_use]
    pub const fn attribute_map(self) -> &'static str {
        match self {
            Self::Id => "ID1",
            Self::Text | Self::Number => "STRUCT",
            Self::Date => "DOC_DATE",
            Self::Verbatim => "VERBATIM",
        }
    }
}

/// Attribute definition for one CSV column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAttribute {
    /// Column header
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub kind: String,
    /// Target field
    pub map: String,
    /// Display name
    pub display: String,
    /// Always null
    pub default_value: Option<String>,
    /// Always true
    pub is_reportable: bool,
}

impl ImportAttribute {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.attribute_type().to_string(),
            map: kind.attribute_map().to_string(),
            display: name.to_string(),
            default_value: None,
            is_reportable: true,
        }
    }
}

/// One CSV row, serialized as an object in header order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord(pub Vec<(String, Option<String>)>);

impl Serialize for ImportRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Ingestion document built from a CSV table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    /// Always `FULL`
    pub response_level: String,
    /// `"true"`
    pub save: String,
    /// `"true"`
    pub process: String,
    /// Destination project
    pub project_name: String,
    /// One attribute per column
    pub attributes: Vec<ImportAttribute>,
    /// One record per row
    pub records: Vec<ImportRecord>,
}

/// Convert a CSV table into an ingestion payload
///
/// # Errors
///
/// Returns a script error if the CSV cannot be parsed.
pub fn convert_csv<R: Read>(reader: R, project_name: &str) -> ColloquyResult<ImportPayload> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for row in reader.records() {
        rows.push(row?);
    }

    let attributes = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let values: Vec<&str> = rows.iter().filter_map(|row| row.get(i)).collect();
            let kind = ColumnKind::detect(header, &values);
            debug!("Column '{}' detected as {:?}", header, kind);
            ImportAttribute::new(header, kind)
        })
        .collect();

    let records = rows
        .iter()
        .map(|row| {
            ImportRecord(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| (header.clone(), row.get(i).map(str::to_string)))
                    .collect(),
            )
        })
        .collect::<Vec<_>>();

    info!("Converted {} columns and {} rows", headers.len(), records.len());

    Ok(ImportPayload {
        response_level: "FULL".to_string(),
        save: "true".to_string(),
        process: "true".to_string(),
        project_name: project_name.to_string(),
        attributes,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case::natural_id("NATURAL_ID", &["a b c d"], ColumnKind::Id)]
    #[case::natural_id_lowercase("my_natural_id", &["1"], ColumnKind::Id)]
    #[case::integers("count", &["1", "22", "333"], ColumnKind::Number)]
    #[case::decimals("price", &["1.5", "20"], ColumnKind::Number)]
    #[case::two_dots("version", &["1.2.3"], ColumnKind::Text)]
    #[case::negative("delta", &["-3"], ColumnKind::Text)]
    #[case::empty_column("nothing", &[], ColumnKind::Number)]
    #[case::iso_dates("when", &["2023-06-01", "2023-09-25"], ColumnKind::Date)]
    #[case::date_header("CreatedDate", &["yesterday"], ColumnKind::Date)]
    #[case::verbatim("comment", &["this is long", "so is this one"], ColumnKind::Verbatim)]
    #[case::short_text("name", &["Alice", "Bob Smith"], ColumnKind::Text)]
    fn test_column_detection(
        #[case] header: &str,
        #[case] values: &[&str],
        #[case] expected: ColumnKind,
    ) {
        assert_eq!(ColumnKind::detect(header, values), expected);
    }

    #[test]
    fn test_attribute_mapping() {
        assert_eq!(ColumnKind::Verbatim.attribute_type(), "TEXT");
        assert_eq!(ColumnKind::Verbatim.attribute_map(), "VERBATIM");
        assert_eq!(ColumnKind::Date.attribute_map(), "DOC_DATE");
        assert_eq!(ColumnKind::Number.attribute_type(), "NUMBER");
        assert_eq!(ColumnKind::Id.attribute_map(), "ID1");
    }

    #[test]
    fn test_convert_csv() {
        let csv = "NATURAL_ID,score,comment\nr1,5,I loved the service today\nr2,3,meh\n";
        let payload = convert_csv(csv.as_bytes(), DEFAULT_IMPORT_PROJECT_NAME).unwrap();
        let json: Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["save"], "true");
        assert_eq!(json["projectName"], "<YOUR PROJECT NAME>");

        let attributes = json["attributes"].as_array().unwrap();
        assert_eq!(attributes[0]["map"], "ID1");
        assert_eq!(attributes[1]["type"], "NUMBER");
        assert_eq!(attributes[2]["map"], "VERBATIM");
        assert_eq!(attributes[2]["display"], "comment");
        assert!(attributes[2]["defaultValue"].is_null());
        assert_eq!(attributes[2]["isReportable"], true);

        assert_eq!(json["records"][1]["comment"], "meh");
        assert_eq!(json["records"][0]["score"], "5");
    }

    #[test]
    fn test_records_keep_header_order() {
        let csv = "zeta,alpha\n1,2\n";
        let payload = convert_csv(csv.as_bytes(), "p").unwrap();
        let text = serde_json::to_string(&payload.records[0]).unwrap();
        assert_eq!(text, r#"{"zeta":"1","alpha":"2"}"#);
    }

    #[test]
    fn test_short_rows_yield_null() {
        let csv = "a,b\n1\n";
        let payload = convert_csv(csv.as_bytes(), "p").unwrap();
        let json = serde_json::to_value(&payload.records[0]).unwrap();
        assert!(json["b"].is_null());
        assert_eq!(payload.attributes[1].kind, "NUMBER");
    }
}
