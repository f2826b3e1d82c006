// Book record model and ingestion helpers

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One catalogued book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier, assigned at creation and never reused
    pub id: String,
    /// Optional rank/ordinal; `None` is distinct from zero
    #[serde(default, with = "number_field")]
    pub number: Option<f64>,
    pub title: String,
    #[serde(default, with = "number_field")]
    pub year: Option<f64>,
    #[serde(default)]
    pub notes: String,
    /// ISO-8601 creation timestamp, kept verbatim across import
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Raw, untyped fields as entered by the user
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub number: String,
    pub title: String,
    pub year: String,
    pub notes: String,
}

impl Book {
    /// Build a record from raw input.
    ///
    /// Returns `None` when the trimmed title is empty. Numeric fields that
    /// don't parse to a finite number are stored as absent.
    pub fn from_input(input: &NewBook) -> Option<Self> {
        let title = input.title.trim();
        if title.is_empty() {
            return None;
        }

        Some(Self {
            id: new_id(),
            number: parse_finite_number(&input.number),
            title: title.to_string(),
            year: parse_finite_number(&input.year),
            notes: input.notes.trim().to_string(),
            created_at: now_iso(),
        })
    }

    /// Value of a named field, `None` when absent or empty
    pub fn field(&self, key: SortKey) -> Option<FieldValue> {
        let text = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(FieldValue::Text(s.to_string()))
            }
        };

        match key {
            SortKey::Number => self.number.map(FieldValue::Number),
            SortKey::Year => self.year.map(FieldValue::Number),
            SortKey::Title => text(&self.title),
            SortKey::Notes => text(&self.notes),
            SortKey::Id => text(&self.id),
            SortKey::CreatedAt => text(&self.created_at),
        }
    }

    /// Lower-cased `"{number} {title} {year} {notes}"` used for searching
    pub fn haystack(&self) -> String {
        let num = |n: Option<f64>| n.map(|v| FieldValue::Number(v).to_string()).unwrap_or_default();
        format!(
            "{} {} {} {}",
            num(self.number),
            self.title,
            num(self.year),
            self.notes
        )
        .to_lowercase()
        .trim()
        .to_string()
    }

    /// True when the record carries no information at all
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.number.is_none() && self.year.is_none() && self.notes.is_empty()
    }
}

/// Record fields the view can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Number,
    Title,
    Year,
    Notes,
    Id,
    CreatedAt,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Number => "number",
            SortKey::Title => "title",
            SortKey::Year => "year",
            SortKey::Notes => "notes",
            SortKey::Id => "id",
            SortKey::CreatedAt => "createdAt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown sort key: {0} (expected number, title, year, notes, id or createdAt)")]
pub struct ParseSortKeyError(String);

impl std::str::FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "number" => Ok(SortKey::Number),
            "title" => Ok(SortKey::Title),
            "year" => Ok(SortKey::Year),
            "notes" => Ok(SortKey::Notes),
            "id" => Ok(SortKey::Id),
            "createdat" | "created_at" | "created" => Ok(SortKey::CreatedAt),
            _ => Err(ParseSortKeyError(s.to_string())),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A present field value as seen by the comparator
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric interpretation, if the value is or parses as a finite number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => parse_finite_number(s),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parse text into a finite number, `None` for empty, junk, NaN or infinity
pub fn parse_finite_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // f64's parser accepts "inf"/"nan" spellings; only finite values count
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Fresh record identifier
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Current UTC time as ISO-8601 with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes whole numbers without a fractional part so stored JSON reads `5`, not `5.0`
mod number_field {
    use serde::{Deserialize, Deserializer, Serializer};

    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT => serializer.serialize_i64(*n as i64),
            Some(n) => serializer.serialize_f64(*n),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value: Option<f64> = Option::deserialize(deserializer)?;
        Ok(value.filter(|n| n.is_finite()))
    }
}
