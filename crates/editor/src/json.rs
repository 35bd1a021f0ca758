use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EditorError, Result};
use crate::jsonpath::{lookup, lookup_mut, render_steps, JsonPath, Segment, Step};
use crate::observer::ChangeObserver;

/// JSONPath-driven editing over whole documents. The file is loaded, the
/// mutation applied in memory, and the document written back; structure is
/// preserved, formatting is regenerated (pretty by default).
pub struct JsonEditor {
    observer: Arc<dyn ChangeObserver>,
}

impl JsonEditor {
    pub fn new(observer: Arc<dyn ChangeObserver>) -> Self {
        Self { observer }
    }

    /// Show the whole document, or every match of `json_path` with its
    /// concrete location.
    pub fn view(&self, path: &Path, json_path: Option<&str>, pretty: bool) -> Result<String> {
        let doc = load_document(path)?;
        match json_path {
            None => Ok(format!(
                "JSON content of {}:\n{}",
                path.display(),
                dump(&doc, pretty)
            )),
            Some(raw) => {
                let parsed = JsonPath::parse(raw)?;
                let matches = parsed.resolve(&doc);
                if matches.is_empty() {
                    return Ok(format!("No matches found for JSONPath: {raw}"));
                }
                let rendered: Vec<Value> = matches
                    .iter()
                    .map(|steps| {
                        serde_json::json!({
                            "path": render_steps(steps),
                            "value": lookup(&doc, steps).cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect();
                Ok(format!(
                    "JSONPath '{raw}' matches:\n{}",
                    dump(&Value::Array(rendered), pretty)
                ))
            }
        }
    }

    /// Replace the value at every match of `json_path`.
    pub fn set(&self, path: &Path, json_path: &str, value: Value, pretty: bool) -> Result<String> {
        let mut doc = load_document(path)?;
        let parsed = JsonPath::parse(json_path)?;
        let matches = parsed.resolve(&doc);
        if matches.is_empty() {
            return Err(EditorError::NoMatch(json_path.to_string()));
        }
        for steps in &matches {
            if let Some(slot) = lookup_mut(&mut doc, steps) {
                *slot = value.clone();
            }
        }
        self.save(path, &doc, pretty)?;
        Ok(format!(
            "Successfully updated {} location(s) at JSONPath '{json_path}' with value: {value}",
            matches.len()
        ))
    }

    /// Append to a matched array, or add a key under the matched parent.
    /// Intermediate segments must already exist.
    pub fn add(&self, path: &Path, json_path: &str, value: Value, pretty: bool) -> Result<String> {
        let mut doc = load_document(path)?;
        let parsed = JsonPath::parse(json_path)?;

        let matches = parsed.resolve(&doc);
        let all_arrays = !matches.is_empty()
            && matches
                .iter()
                .all(|steps| matches!(lookup(&doc, steps), Some(Value::Array(_))));
        if all_arrays {
            for steps in &matches {
                if let Some(Value::Array(items)) = lookup_mut(&mut doc, steps) {
                    items.push(value.clone());
                }
            }
            self.save(path, &doc, pretty)?;
            return Ok(format!(
                "Successfully added value at JSONPath '{json_path}'"
            ));
        }

        let Some((parent, last)) = parsed.split_last() else {
            return Err(EditorError::Invalid(
                "cannot add at the document root; the path must name a key or index".to_string(),
            ));
        };
        let parent_matches = parent.resolve(&doc);
        if parent_matches.is_empty() {
            return Err(EditorError::NoMatch(format!(
                "{json_path} (parent path not found)"
            )));
        }
        for steps in &parent_matches {
            let Some(slot) = lookup_mut(&mut doc, steps) else {
                continue;
            };
            match (last, slot) {
                (Segment::Field(name), Value::Object(map)) => {
                    map.insert(name.clone(), value.clone());
                }
                (Segment::Field(_), _) => {
                    return Err(EditorError::Invalid(format!(
                        "cannot add key to non-object at parent of '{json_path}'"
                    )));
                }
                (Segment::Index(index), Value::Array(items)) => {
                    let idx = if *index < 0 {
                        items
                            .len()
                            .checked_sub(index.unsigned_abs() as usize)
                            .unwrap_or(0)
                    } else {
                        (*index as usize).min(items.len())
                    };
                    items.insert(idx, value.clone());
                }
                (Segment::Index(_), _) => {
                    return Err(EditorError::Invalid(format!(
                        "cannot add element to non-array at parent of '{json_path}'"
                    )));
                }
                (Segment::Wildcard, _) => {
                    return Err(EditorError::Invalid(
                        "the path for 'add' must end in a key or array index".to_string(),
                    ));
                }
            }
        }
        self.save(path, &doc, pretty)?;
        Ok(format!(
            "Successfully added value at JSONPath '{json_path}'"
        ))
    }

    /// Delete every match of `json_path` from its parent.
    pub fn remove(&self, path: &Path, json_path: &str, pretty: bool) -> Result<String> {
        let mut doc = load_document(path)?;
        let parsed = JsonPath::parse(json_path)?;
        let matches = parsed.resolve(&doc);
        if matches.is_empty() {
            return Err(EditorError::NoMatch(json_path.to_string()));
        }

        // Reverse order keeps array indexes valid while earlier siblings
        // are still pending removal.
        for steps in matches.iter().rev() {
            let Some((last, parent_steps)) = steps.split_last() else {
                return Err(EditorError::Invalid(
                    "cannot remove the document root".to_string(),
                ));
            };
            let Some(parent) = lookup_mut(&mut doc, parent_steps) else {
                continue;
            };
            match (last, parent) {
                (Step::Key(key), Value::Object(map)) => {
                    map.remove(key);
                }
                (Step::Idx(idx), Value::Array(items)) => {
                    if *idx < items.len() {
                        items.remove(*idx);
                    }
                }
                _ => {}
            }
        }
        self.save(path, &doc, pretty)?;
        Ok(format!(
            "Successfully removed {} element(s) at JSONPath '{json_path}'",
            matches.len()
        ))
    }

    fn save(&self, path: &Path, doc: &Value, pretty: bool) -> Result<()> {
        std::fs::write(path, dump(doc, pretty) + "\n")?;
        log::debug!("wrote JSON document {}", path.display());
        // JSON files are not indexed; the observer treats them as a no-op.
        self.observer.on_file_changed(path);
        Ok(())
    }
}

fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(EditorError::NotFound(path.display().to_string()));
    }
    if !path.is_file() {
        return Err(EditorError::NotAFile(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(EditorError::Parse(format!(
            "file is empty: {}",
            path.display()
        )));
    }
    serde_json::from_str(&content).map_err(|err| {
        EditorError::Parse(format!("invalid JSON in file {}: {err}", path.display()))
    })
}

fn dump(value: &Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(value).unwrap_or_default()
    } else {
        serde_json::to_string(value).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn editor() -> JsonEditor {
        JsonEditor::new(Arc::new(NullObserver))
    }

    fn fixture(value: &Value) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("x.json");
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        (tmp, path)
    }

    fn reload(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn add_appends_to_arrays() {
        let (_tmp, path) = fixture(&json!({"a": [1, 2]}));
        editor().add(&path, "$.a", json!(3), true).unwrap();
        assert_eq!(reload(&path), json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn remove_drops_an_array_element() {
        let (_tmp, path) = fixture(&json!({"a": [1, 2, 3]}));
        editor().remove(&path, "$.a[0]", true).unwrap();
        assert_eq!(reload(&path), json!({"a": [2, 3]}));
    }

    #[test]
    fn remove_wildcard_clears_in_reverse_order() {
        let (_tmp, path) = fixture(&json!({"a": [1, 2, 3]}));
        editor().remove(&path, "$.a[*]", true).unwrap();
        assert_eq!(reload(&path), json!({"a": []}));
    }

    #[test]
    fn set_round_trips_through_view() {
        let (_tmp, path) = fixture(&json!({"config": {"host": "old"}}));
        editor()
            .set(&path, "$.config.host", json!("new"), true)
            .unwrap();
        let out = editor().view(&path, Some("$.config.host"), true).unwrap();
        assert!(out.contains("\"new\""));
        assert!(out.contains("$.config.host"));
    }

    #[test]
    fn set_on_missing_path_fails_without_touching_the_file() {
        let (_tmp, path) = fixture(&json!({"a": 1}));
        let before = std::fs::read_to_string(&path).unwrap();
        let err = editor()
            .set(&path, "$.missing", json!(2), true)
            .unwrap_err();
        assert!(matches!(err, EditorError::NoMatch(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn add_key_to_object_via_parent() {
        let (_tmp, path) = fixture(&json!({"config": {}}));
        editor()
            .add(&path, "$.config.port", json!(8080), true)
            .unwrap();
        assert_eq!(reload(&path), json!({"config": {"port": 8080}}));
    }

    #[test]
    fn add_does_not_create_missing_ancestors() {
        let (_tmp, path) = fixture(&json!({"a": 1}));
        let err = editor()
            .add(&path, "$.missing.key", json!(1), true)
            .unwrap_err();
        assert!(matches!(err, EditorError::NoMatch(_)));
    }

    #[test]
    fn view_whole_document_pretty_prints() {
        let (_tmp, path) = fixture(&json!({"a": [1]}));
        let out = editor().view(&path, None, true).unwrap();
        assert!(out.contains("\"a\": ["));
    }

    #[test]
    fn set_updates_every_wildcard_match() {
        let (_tmp, path) = fixture(&json!({"items": [{"price": 1}, {"price": 2}]}));
        editor()
            .set(&path, "$.items[*].price", json!(0), true)
            .unwrap();
        assert_eq!(
            reload(&path),
            json!({"items": [{"price": 0}, {"price": 0}]})
        );
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{oops").unwrap();
        let err = editor().view(&path, None, true).unwrap_err();
        assert!(matches!(err, EditorError::Parse(_)));
    }
}
