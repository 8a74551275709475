//! JSON payload decoding
//!
//! Accepted point shapes:
//!
//! ```text
//! { "measurement"|"m": ..., "tags"|"t": {...}, "fields"|"f": {...}, "ts"|"time"|"timestamp": ... }
//! { "measurement": "machines", "P": 120, "device": "DEV-7" }      // flat: unknown keys are fields
//! ```
//!
//! A request body may be one point, an array of points, or `{ "points": [...] }`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::device::DeviceResolver;
use crate::line_protocol::error::{LineError, LineResult};
use crate::line_protocol::point::Point;
use crate::line_protocol::timestamp;
use crate::line_protocol::value::FieldValue;

/// Measurement used when the payload names none
pub const DEFAULT_MEASUREMENT: &str = "measurement";

/// Keys that are never treated as fields of a flat payload
const RESERVED_KEYS: &[&str] = &["measurement", "m", "tags", "t", "ts", "time", "timestamp"];

const TIMESTAMP_KEYS: &[&str] = &["ts", "time", "timestamp"];

/// Keys that carry the device identifier and are kept out of the field set
const DEVICE_KEYS: &[&str] = &["device", "ksave"];

/// Tag holding the canonical device id
pub const DEVICE_TAG: &str = "device";
/// Tag holding the device id exactly as received
pub const DEVICE_INPUT_TAG: &str = "device_input";

/// Split a request body into its point payloads
pub fn split_points(body: &Value) -> Vec<&Value> {
    match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("points") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![body],
        },
        other => vec![other],
    }
}

/// Decode one payload into a [`Point`], resolving its device identifier
pub fn point_from_json(payload: &Value, resolver: &DeviceResolver) -> LineResult<Point> {
    let obj = payload.as_object().ok_or(LineError::NotAnObject)?;

    let measurement = first_scalar(obj, &["measurement", "m"])
        .unwrap_or_else(|| DEFAULT_MEASUREMENT.to_string());

    let mut tags = match section(obj, &["tags", "t"], "tags")? {
        Some(raw) => decode_tags(raw)?,
        None => BTreeMap::new(),
    };

    let mut fields = match section(obj, &["fields", "f"], "fields")? {
        Some(raw) => flatten_fields(raw.iter())?,
        None => flatten_fields(
            obj.iter()
                .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str())),
        )?,
    };

    let device_input = first_scalar(obj, DEVICE_KEYS)
        .or_else(|| tags.get(DEVICE_TAG).filter(|v| !v.is_empty()).cloned())
        .or_else(|| {
            DEVICE_KEYS
                .iter()
                .find_map(|k| fields.get(*k).and_then(|v| v.as_ref()).and_then(scalar_text))
        });

    for key in DEVICE_KEYS {
        fields.remove(*key);
    }

    if let Some(raw) = device_input {
        tags.insert(DEVICE_TAG.to_string(), resolver.resolve(&raw));
        tags.insert(DEVICE_INPUT_TAG.to_string(), raw);
    }

    let timestamp = TIMESTAMP_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
        .and_then(timestamp::normalize);

    Ok(Point {
        measurement,
        tags,
        fields,
        timestamp,
    })
}

/// First of `keys` holding an object. A present non-object, non-null value is an error.
fn section<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> LineResult<Option<&'a Map<String, Value>>> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Object(inner)) => return Ok(Some(inner)),
            Some(Value::Null) | None => continue,
            Some(_) => return Err(LineError::InvalidSection(name)),
        }
    }
    Ok(None)
}

fn decode_tags(raw: &Map<String, Value>) -> LineResult<BTreeMap<String, String>> {
    let mut tags = BTreeMap::new();
    for (key, value) in raw {
        match value {
            Value::Null => continue,
            Value::String(s) => {
                tags.insert(key.clone(), s.clone());
            }
            Value::Number(n) => {
                tags.insert(key.clone(), n.to_string());
            }
            Value::Bool(b) => {
                tags.insert(key.clone(), b.to_string());
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(LineError::UnsupportedTag(key.clone()))
            }
        }
    }
    Ok(tags)
}

/// Convert fields, flattening one level of nested objects into `parent_child`
fn flatten_fields<'a, I>(entries: I) -> LineResult<BTreeMap<String, Option<FieldValue>>>
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    let mut fields = BTreeMap::new();
    for (key, value) in entries {
        match value {
            Value::Object(inner) => {
                for (sub, sub_value) in inner {
                    let name = format!("{}_{}", key, sub);
                    let decoded = field_value(&name, sub_value)?;
                    fields.insert(name, decoded);
                }
            }
            _ => {
                fields.insert(key.clone(), field_value(key, value)?);
            }
        }
    }
    Ok(fields)
}

fn field_value(key: &str, value: &Value) -> LineResult<Option<FieldValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(FieldValue::Bool(*b))),
        Value::Number(n) => n
            .as_f64()
            .map(|f| Some(FieldValue::Number(f)))
            .ok_or_else(|| LineError::UnsupportedField(key.to_string())),
        Value::String(s) => Ok(Some(FieldValue::Text(s.clone()))),
        Value::Array(_) | Value::Object(_) => Err(LineError::UnsupportedField(key.to_string())),
    }
}

/// First non-empty string or number among `keys`, as text
fn first_scalar(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn scalar_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) if !s.is_empty() => Some(s.clone()),
        FieldValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AliasTable;
    use crate::line_protocol::value::EncodingOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn resolver() -> DeviceResolver {
        DeviceResolver::new(Arc::new(AliasTable::new()))
    }

    fn encode(payload: Value) -> String {
        point_from_json(&payload, &resolver())
            .and_then(|p| p.encode(&EncodingOptions::generic_write()))
            .map(|l| l.into_string())
            .unwrap()
    }

    #[test]
    fn test_structured_payload() {
        let line = encode(json!({
            "measurement": "machines",
            "tags": {"site": "Site A"},
            "fields": {"P": 120, "PF": 0.95, "on": true},
            "ts": 1_700_000_000
        }));
        assert_eq!(line, r"machines,site=Site\ A P=120,PF=0.95,on=true 1700000000");
    }

    #[test]
    fn test_short_keys() {
        let line = encode(json!({"m": "x", "t": {"a": "b"}, "f": {"v": 1.5}}));
        assert_eq!(line, "x,a=b v=1.5");
    }

    #[test]
    fn test_flat_payload_with_device_resolution() {
        let line = encode(json!({
            "measurement": "machines",
            "device": "DEV-7",
            "current": 1.2,
            "time": "2024-01-15T10:00:00Z"
        }));
        assert_eq!(
            line,
            "machines,device=Ksave07,device_input=DEV-7 current=1.2 1705312800"
        );
    }

    #[test]
    fn test_default_measurement() {
        assert_eq!(encode(json!({"a": 1})), "measurement a=1");
    }

    #[test]
    fn test_one_level_flattening() {
        let line = encode(json!({
            "measurement": "machines",
            "fields": {"power_before": {"kWh": 1.2, "P": 100}, "F": 50}
        }));
        assert_eq!(line, "machines F=50,power_before_P=100,power_before_kWh=1.2");
    }

    #[test]
    fn test_deep_nesting_and_arrays_rejected() {
        let r = resolver();
        assert_eq!(
            point_from_json(&json!({"fields": {"a": {"b": {"c": 1}}}}), &r),
            Err(LineError::UnsupportedField("a_b".to_string()))
        );
        assert_eq!(
            point_from_json(&json!({"fields": {"a": [1, 2]}}), &r),
            Err(LineError::UnsupportedField("a".to_string()))
        );
        assert_eq!(
            point_from_json(&json!({"tags": {"a": {"b": 1}}, "fields": {"x": 1}}), &r),
            Err(LineError::UnsupportedTag("a".to_string()))
        );
        assert_eq!(
            point_from_json(&json!({"tags": "site", "fields": {"x": 1}}), &r),
            Err(LineError::InvalidSection("tags"))
        );
        assert_eq!(point_from_json(&json!(42), &r), Err(LineError::NotAnObject));
    }

    #[test]
    fn test_device_from_tags_and_fields() {
        let r = resolver();

        let point = point_from_json(&json!({"tags": {"device": "DEV-12"}, "fields": {"a": 1}}), &r).unwrap();
        assert_eq!(point.tags[DEVICE_TAG], "Ksave12");
        assert_eq!(point.tags[DEVICE_INPUT_TAG], "DEV-12");

        let point = point_from_json(&json!({"fields": {"ksave": "meter-9", "a": 1}}), &r).unwrap();
        assert_eq!(point.tags[DEVICE_TAG], "meter-9");
        assert_eq!(point.tags[DEVICE_INPUT_TAG], "meter-9");
        assert!(!point.fields.contains_key("ksave"));
    }

    #[test]
    fn test_device_fields_always_removed() {
        let point = point_from_json(&json!({"device": "", "a": 1}), &resolver()).unwrap();
        assert!(!point.fields.contains_key("device"));
        assert!(!point.tags.contains_key(DEVICE_TAG));
        assert!(!point.tags.contains_key(DEVICE_INPUT_TAG));
    }

    #[test]
    fn test_alias_table_applies() {
        let table: AliasTable = [("meter-a", "Ksave03")].into_iter().collect();
        let r = DeviceResolver::new(Arc::new(table));
        let point = point_from_json(&json!({"ksave": "meter-a", "a": 1}), &r).unwrap();
        assert_eq!(point.tags[DEVICE_TAG], "Ksave03");
        assert_eq!(point.tags[DEVICE_INPUT_TAG], "meter-a");
    }

    #[test]
    fn test_unparsable_timestamp_omitted() {
        let point = point_from_json(&json!({"a": 1, "ts": "not a time"}), &resolver()).unwrap();
        assert_eq!(point.timestamp, None);
        assert!(!point.fields.contains_key("ts"));
    }

    #[test]
    fn test_null_fields_kept_for_policy() {
        let point = point_from_json(&json!({"a": null, "b": 2}), &resolver()).unwrap();
        assert_eq!(point.fields["a"], None);
        assert_eq!(point.fields["b"], Some(FieldValue::Number(2.0)));
    }

    #[test]
    fn test_split_points() {
        let single = json!({"a": 1});
        assert_eq!(split_points(&single).len(), 1);

        let array = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(split_points(&array).len(), 2);

        let wrapped = json!({"points": [{"a": 1}, {"b": 2}, {"c": 3}]});
        assert_eq!(split_points(&wrapped).len(), 3);
    }
}
