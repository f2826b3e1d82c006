// JSON export envelope and validated import

use crate::backend::Backend;
use crate::record::{Book, new_id, now_iso, parse_finite_number};
use crate::store::Store;
use chrono::NaiveDate;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info};

/// App identifier written into every export
pub const APP_NAME: &str = "Booker";

/// Export envelope schema version
pub const EXPORT_VERSION: u32 = 1;

/// Versioned wrapper written by export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub app: String,
    pub version: u32,
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub items: Vec<Book>,
}

impl Envelope {
    pub fn new(items: &[Book], credential: Option<&str>) -> Self {
        Self {
            app: APP_NAME.to_string(),
            version: EXPORT_VERSION,
            exported_at: now_iso(),
            api_key: credential.unwrap_or_default().to_string(),
            items: items.to_vec(),
        }
    }
}

/// Pretty-printed export of the store's collection and credential
pub fn export_json<B: Backend>(store: &Store<B>) -> Result<String> {
    let envelope = Envelope::new(store.items(), store.credential());
    let json = serde_json::to_string_pretty(&envelope).context("Failed to serialize export")?;
    info!(count = envelope.items.len(), "Exported collection");
    Ok(json)
}

/// `Booker-export-YYYY-MM-DD.json`
pub fn export_filename(date: NaiveDate) -> String {
    format!("{}-export-{}.json", APP_NAME, date.format("%Y-%m-%d"))
}

/// Why an import file was turned away; nothing is changed in any case
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("That file wasn't valid JSON.")]
    InvalidJson(#[source] serde_json::Error),
    #[error("JSON didn't contain a valid 'items' array.")]
    MissingItems,
    #[error("No usable items found in that JSON.")]
    NoUsableItems,
}

/// Caller's answer to the replace prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Replace,
    Cancel,
}

/// What happened to the credential during a committed import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialImport {
    Imported,
    NotPresent,
}

impl CredentialImport {
    pub fn status(self) -> &'static str {
        match self {
            CredentialImport::Imported => "Imported API key from JSON.",
            CredentialImport::NotPresent => "Imported books. (No API key in JSON.)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Cancelled,
    Replaced { count: usize, credential: CredentialImport },
}

/// A validated import waiting on the replace decision
#[derive(Debug, Clone)]
pub struct PendingImport {
    items: Vec<Book>,
    api_key: Option<String>,
}

impl PendingImport {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Book] {
        &self.items
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Confirmation text shown before replacing the collection
    pub fn prompt(&self) -> String {
        format!(
            "Import {} item(s)?\n\nReplace = replace your current list\nCancel = do nothing",
            self.count()
        )
    }

    /// Apply or drop the import. The collection is replaced, never merged.
    pub fn resolve<B: Backend>(self, store: &mut Store<B>, decision: Decision) -> Result<ImportOutcome> {
        if decision == Decision::Cancel {
            debug!(count = self.items.len(), "Import cancelled");
            return Ok(ImportOutcome::Cancelled);
        }

        let count = self.items.len();
        store.replace_all(self.items)?;

        // The collection stays replaced even when the key write fails
        let credential = match self.api_key {
            Some(key) => {
                store
                    .set_credential(&key)
                    .context("Collection was replaced, but the imported API key could not be saved")?;
                CredentialImport::Imported
            }
            None => CredentialImport::NotPresent,
        };

        info!(count, ?credential, "Import committed");
        Ok(ImportOutcome::Replaced { count, credential })
    }
}

/// Parse and clean untrusted import text
///
/// Accepts a bare array or an object with an `items` array. Non-object
/// elements and entirely blank records are dropped.
pub fn prepare_import(text: &str) -> Result<PendingImport, ImportError> {
    let parsed: Value = serde_json::from_str(text).map_err(ImportError::InvalidJson)?;

    let (elements, envelope) = match &parsed {
        Value::Array(elements) => (elements, None),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(elements)) => (elements, Some(map)),
            _ => return Err(ImportError::MissingItems),
        },
        _ => return Err(ImportError::MissingItems),
    };

    let mut seen_ids = HashSet::new();
    let items: Vec<Book> = elements
        .iter()
        .filter_map(Value::as_object)
        .map(clean_item)
        .filter(|b| !b.is_blank())
        .map(|mut b| {
            // Later duplicates get a fresh id so ids stay unique
            if !seen_ids.insert(b.id.clone()) {
                debug!(id = %b.id, "Duplicate id in import, assigning a new one");
                b.id = new_id();
                seen_ids.insert(b.id.clone());
            }
            b
        })
        .collect();

    debug!(raw = elements.len(), kept = items.len(), "Cleaned import items");

    if items.is_empty() {
        return Err(ImportError::NoUsableItems);
    }

    let api_key = envelope
        .and_then(|map| map.get("apiKey"))
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    Ok(PendingImport { items, api_key })
}

fn clean_item(raw: &Map<String, Value>) -> Book {
    Book {
        id: raw.get("id").and_then(truthy_text).unwrap_or_else(new_id),
        number: raw.get("number").and_then(finite_number),
        title: raw.get("title").map(coerce_text).unwrap_or_default(),
        year: raw.get("year").and_then(finite_number),
        notes: raw.get("notes").map(coerce_text).unwrap_or_default(),
        created_at: raw.get("createdAt").and_then(truthy_text).unwrap_or_else(now_iso),
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_finite_number(s),
        _ => None,
    }
}

/// Value rendered as trimmed text
fn coerce_text(value: &Value) -> String {
    render_text(value).trim().to_string()
}

/// Arrays join their elements with `,` (nulls render empty); objects render empty
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(values) => values.iter().map(render_text).collect::<Vec<_>>().join(","),
        Value::Null | Value::Object(_) => String::new(),
    }
}

/// Non-empty string or non-zero number as text
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::record::NewBook;

    fn store_with(titles: &[&str]) -> Store<MemoryBackend> {
        let mut store = Store::with_backend(MemoryBackend::new());
        for title in titles {
            store
                .add(&NewBook {
                    title: title.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_export_envelope_shape() {
        let mut store = store_with(&["Dune"]);
        store.set_credential("booker_k").unwrap();

        let json = export_json(&store).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["app"], "Booker");
        assert_eq!(value["version"], 1);
        assert_eq!(value["apiKey"], "booker_k");
        assert!(value["exportedAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["items"][0]["title"], "Dune");
        assert!(value["items"][0]["number"].is_null());
        assert!(json.contains("\n  \"app\""));
    }

    #[test]
    fn test_export_without_credential_writes_empty_key() {
        let store = store_with(&[]);
        let envelope: Envelope = serde_json::from_str(&export_json(&store).unwrap()).unwrap();
        assert_eq!(envelope.api_key, "");
        assert!(envelope.items.is_empty());
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_filename(date), "Booker-export-2024-03-07.json");
    }

    #[test]
    fn test_round_trip() {
        let mut original = store_with(&["Dune", "Emma"]);
        original
            .add(&NewBook {
                number: "3".to_string(),
                title: "Ulysses".to_string(),
                year: "1922".to_string(),
                notes: "  long  ".to_string(),
            })
            .unwrap();
        let json = export_json(&original).unwrap();

        let mut target = store_with(&["Something else"]);
        let pending = prepare_import(&json).unwrap();
        assert_eq!(pending.count(), 3);
        pending.resolve(&mut target, Decision::Replace).unwrap();

        assert_eq!(target.items(), original.items());
    }

    #[test]
    fn test_invalid_json_changes_nothing() {
        let err = prepare_import("{not json").unwrap_err();
        assert!(matches!(err, ImportError::InvalidJson(_)));
        assert_eq!(err.to_string(), "That file wasn't valid JSON.");
    }

    #[test]
    fn test_missing_items_array() {
        for text in [r#"{"items":"nope"}"#, r#"{"books":[]}"#, "42", r#""text""#, "null"] {
            let err = prepare_import(text).unwrap_err();
            assert!(matches!(err, ImportError::MissingItems), "input: {}", text);
        }
    }

    #[test]
    fn test_no_usable_items() {
        for text in ["[]", r#"{"items":[1, "x", null, {}]}"#, r#"[{"title":"   ","notes":""}]"#] {
            let err = prepare_import(text).unwrap_err();
            assert!(matches!(err, ImportError::NoUsableItems), "input: {}", text);
        }
    }

    #[test]
    fn test_cleans_and_filters() {
        let pending = prepare_import(r#"{"items":[{"title":" Foo "},{"number":"abc"},{}]}"#).unwrap();

        assert_eq!(pending.count(), 1);
        let book = &pending.items()[0];
        assert_eq!(book.title, "Foo");
        assert_eq!(book.number, None);
        assert!(!book.id.is_empty());
        assert!(!book.created_at.is_empty());
    }

    #[test]
    fn test_bare_array_accepted() {
        let pending = prepare_import(r#"[{"title":"A"}, 7, {"year":"1999"}]"#).unwrap();
        assert_eq!(pending.count(), 2);
        assert_eq!(pending.items()[1].year, Some(1999.0));
        assert_eq!(pending.api_key(), None);
    }

    #[test]
    fn test_field_coercion() {
        let pending = prepare_import(
            r#"[{"id":"keep-me","number":"12","title":1984,"year":null,"notes":true,"createdAt":"2020-01-01","extra":"x"},
                {"id":"","title":"fresh id","number":0,"createdAt":""},
                {"id":0,"title":"zero id","notes":{"nested":1}}]"#,
        )
        .unwrap();

        let items = pending.items();
        assert_eq!(items[0].id, "keep-me");
        assert_eq!(items[0].number, Some(12.0));
        assert_eq!(items[0].title, "1984");
        assert_eq!(items[0].year, None);
        assert_eq!(items[0].notes, "true");
        assert_eq!(items[0].created_at, "2020-01-01");

        assert_ne!(items[1].id, "");
        assert_eq!(items[1].number, Some(0.0));
        assert_ne!(items[1].created_at, "");

        assert_ne!(items[2].id, "0");
        assert_eq!(items[2].notes, "");
    }

    #[test]
    fn test_credential_adopted_on_replace() {
        let mut store = store_with(&["Old"]);
        let pending = prepare_import(r#"{"items":[{"title":"A"}], "apiKey":"booker_xyz"}"#).unwrap();

        let outcome = pending.resolve(&mut store, Decision::Replace).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Replaced {
                count: 1,
                credential: CredentialImport::Imported
            }
        );
        assert_eq!(store.credential(), Some("booker_xyz"));
        assert_eq!(store.items()[0].title, "A");
    }

    #[test]
    fn test_missing_credential_leaves_existing_key() {
        let mut store = store_with(&["Old"]);
        store.set_credential("booker_old").unwrap();

        let pending = prepare_import(r#"{"items":[{"title":"A"}], "apiKey":""}"#).unwrap();
        let outcome = pending.resolve(&mut store, Decision::Replace).unwrap();

        assert_eq!(
            outcome,
            ImportOutcome::Replaced {
                count: 1,
                credential: CredentialImport::NotPresent
            }
        );
        assert_eq!(store.credential(), Some("booker_old"));
    }

    #[test]
    fn test_cancel_changes_nothing() {
        let mut store = store_with(&["Old"]);
        let pending = prepare_import(r#"{"items":[{"title":"A"}], "apiKey":"booker_xyz"}"#).unwrap();

        let outcome = pending.resolve(&mut store, Decision::Cancel).unwrap();
        assert_eq!(outcome, ImportOutcome::Cancelled);
        assert_eq!(store.items()[0].title, "Old");
        assert_eq!(store.credential(), None);
    }

    /// Memory backend whose credential writes always fail
    struct KeyWriteFails(MemoryBackend);

    impl Backend for KeyWriteFails {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if key == crate::store::CREDENTIAL_KEY {
                return Err(eyre::eyre!("disk full"));
            }
            self.0.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_credential_write_failure_reports_replaced_collection() {
        let mut store = Store::with_backend(KeyWriteFails(MemoryBackend::new()));
        let pending = prepare_import(r#"{"items":[{"title":"A"}], "apiKey":"booker_xyz"}"#).unwrap();

        let err = pending.resolve(&mut store, Decision::Replace).unwrap_err();
        assert!(err.to_string().contains("Collection was replaced"));
        assert_eq!(store.items()[0].title, "A");
        assert_eq!(store.credential(), None);
    }

    #[test]
    fn test_array_values_join_with_commas() {
        let pending = prepare_import(r#"[{"title":["a","b"]}, {"title":[" x ", null, 3], "notes":[]}]"#).unwrap();

        assert_eq!(pending.count(), 2);
        assert_eq!(pending.items()[0].title, "a,b");
        assert_eq!(pending.items()[1].title, "x ,,3");
        assert_eq!(pending.items()[1].notes, "");
    }

    #[test]
    fn test_duplicate_ids_get_fresh_ids() {
        let pending = prepare_import(
            r#"[{"id":"same","title":"First"},{"id":"same","title":"Second"},{"id":"other","title":"Third"}]"#,
        )
        .unwrap();

        let items = pending.items();
        assert_eq!(items[0].id, "same");
        assert_ne!(items[1].id, "same");
        assert!(!items[1].id.is_empty());
        assert_eq!(items[2].id, "other");

        let mut store = store_with(&[]);
        pending.resolve(&mut store, Decision::Replace).unwrap();
        assert!(store.remove("same").unwrap());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_prompt_mentions_count() {
        let pending = prepare_import(r#"[{"title":"A"},{"title":"B"}]"#).unwrap();
        assert!(pending.prompt().starts_with("Import 2 item(s)?"));
    }

    #[test]
    fn test_credential_status_text() {
        assert_eq!(CredentialImport::Imported.status(), "Imported API key from JSON.");
        assert_eq!(
            CredentialImport::NotPresent.status(),
            "Imported books. (No API key in JSON.)"
        );
    }
}
