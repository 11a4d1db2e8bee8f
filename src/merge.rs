//! Keyed merge of record collections.
//!
//! Collections are applied in order; a later record overwrites the fields of
//! an earlier one with the same key and leaves its other fields in place.
//! The output keeps the order in which each key was first seen.

use crate::error::{HarvestError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;

/// A record as a JSON object.
pub type Fields = Map<String, Value>;

fn key_of(record: &Fields, key: &str) -> Result<String> {
    match record.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(HarvestError::Validation(format!(
            "merge key {:?} is not a scalar: {}",
            key, other
        ))),
        None => Err(HarvestError::Validation(format!(
            "record is missing merge key {:?}",
            key
        ))),
    }
}

/// Merge JSON-object collections on `key`, last writer per field wins.
pub fn merge(key: &str, collections: &[&[Fields]]) -> Result<Vec<Fields>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Fields> = Vec::new();

    for record in collections.iter().flat_map(|c| c.iter()) {
        let k = key_of(record, key)?;
        match index.get(&k) {
            Some(&slot) => {
                let entry = &mut merged[slot];
                for (field, value) in record {
                    entry.insert(field.clone(), value.clone());
                }
            }
            None => {
                index.insert(k, merged.len());
                merged.push(record.clone());
            }
        }
    }

    let inputs: usize = collections.iter().map(|c| c.len()).sum();
    info!(inputs = inputs, merged = merged.len(), key = key, "Merged collections");
    Ok(merged)
}

/// Merge typed records by round-tripping them through JSON objects.
pub fn merge_records<T>(key: &str, collections: &[&[T]]) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned,
{
    let as_fields: Vec<Vec<Fields>> = collections
        .iter()
        .map(|c| c.iter().map(to_fields).collect::<Result<Vec<_>>>())
        .collect::<Result<_>>()?;
    let borrowed: Vec<&[Fields]> = as_fields.iter().map(Vec::as_slice).collect();

    merge(key, &borrowed)?
        .into_iter()
        .map(|fields| serde_json::from_value(Value::Object(fields)).map_err(HarvestError::from))
        .collect()
}

fn to_fields<T: Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(HarvestError::Validation(format!(
            "record does not serialize to an object: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Paper;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_one_entry_per_key_in_first_seen_order() {
        let a = vec![fields(json!({"id": "1", "t": "a"})), fields(json!({"id": "2", "t": "b"}))];
        let b = vec![fields(json!({"id": "3", "t": "c"})), fields(json!({"id": "1", "t": "d"}))];

        let merged = merge("id", &[&a, &b]).unwrap();
        let ids: Vec<&Value> = merged.iter().map(|m| &m["id"]).collect();
        assert_eq!(ids, vec![&json!("1"), &json!("2"), &json!("3")]);
    }

    #[test]
    fn test_right_biased_field_overwrite() {
        let a = vec![fields(json!({"id": "1", "title": "old", "only_a": true}))];
        let b = vec![fields(json!({"id": "1", "title": "new", "only_b": 7}))];

        let merged = merge("id", &[&a, &b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["title"], json!("new"));
        assert_eq!(merged[0]["only_a"], json!(true));
        assert_eq!(merged[0]["only_b"], json!(7));
    }

    #[test]
    fn test_merge_is_associative_for_shared_keys() {
        let a = vec![fields(json!({"id": 1, "x": 1, "y": 1}))];
        let b = vec![fields(json!({"id": 1, "y": 2, "z": 2}))];
        let c = vec![fields(json!({"id": 1, "z": 3}))];

        let all_at_once = merge("id", &[&a, &b, &c]).unwrap();
        let ab = merge("id", &[&a, &b]).unwrap();
        let stepwise = merge("id", &[&ab, &c]).unwrap();
        assert_eq!(all_at_once, stepwise);
        assert_eq!(all_at_once[0], fields(json!({"id": 1, "x": 1, "y": 2, "z": 3})));
    }

    #[test]
    fn test_duplicates_within_one_collection_collapse() {
        let a = vec![fields(json!({"id": "1", "v": 1})), fields(json!({"id": "1", "v": 2}))];
        let merged = merge("id", &[&a]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["v"], json!(2));
    }

    #[test]
    fn test_missing_key_is_error() {
        let a = vec![fields(json!({"title": "no id"}))];
        assert!(merge("id", &[&a]).is_err());
        let b = vec![fields(json!({"id": ["nested"]}))];
        assert!(merge("id", &[&b]).is_err());
    }

    #[test]
    fn test_merge_typed_papers() {
        let ack: Vec<Paper> = vec![serde_json::from_value(json!({"id": "1", "title": "A", "source": "MED"})).unwrap()];
        let aff: Vec<Paper> = vec![
            serde_json::from_value(json!({"id": "1", "title": "A (revised)"})).unwrap(),
            serde_json::from_value(json!({"id": "2", "title": "B"})).unwrap(),
        ];

        let merged: Vec<Paper> = merge_records("id", &[ack.as_slice(), aff.as_slice()]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "A (revised)");
        assert_eq!(merged[0].extra.get("source"), Some(&json!("MED")));
        assert_eq!(merged[1].id, "2");
    }
}
