//! Decoded allocation API payloads
//!
//! The allocation endpoint returns a loosely typed document. Rather than
//! binding it to rigid structs, items are kept as JSON objects and read
//! through [`ItemView`], whose accessors return a typed [`FieldError`] for
//! absent or mistyped fields so callers decide per field whether that is
//! fatal or an empty value.

use crate::error::{EnvelopeError, FieldError};
use serde_json::{Map, Value};

/// Item name the API uses for cost that could not be attributed
pub const UNALLOCATED: &str = "__unallocated__";

/// Item name the API uses for idle cluster capacity
pub const IDLE: &str = "__idle__";

/// A decoded allocation response
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResponse {
    /// Status code embedded in the body, kept for diagnostics only
    pub code: Value,
    /// One entry per accumulation step; `None` means no data for that step
    pub buckets: Vec<Option<Map<String, Value>>>,
}

impl AllocationResponse {
    /// Decode a response body. A `null` bucket is kept as `None`; a `null`
    /// or absent `data` field is an error.
    pub fn from_slice(body: &[u8]) -> Result<Self, EnvelopeError> {
        let document: Value = serde_json::from_slice(body)
            .map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;

        let mut document = match document {
            Value::Object(map) => map,
            other => return Err(EnvelopeError::NotAnObject(type_name(&other))),
        };

        let code = document.remove("code").unwrap_or(Value::Null);

        let data = match document.remove("data") {
            Some(Value::Array(data)) => data,
            Some(other) => return Err(EnvelopeError::DataNotArray(type_name(&other))),
            None => return Err(EnvelopeError::MissingData),
        };

        let buckets = data
            .into_iter()
            .enumerate()
            .map(|(index, bucket)| match bucket {
                Value::Null => Ok(None),
                Value::Object(items) => Ok(Some(items)),
                other => Err(EnvelopeError::BadBucket {
                    index,
                    found: type_name(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { code, buckets })
    }

    /// Total number of items across all non-empty buckets
    pub fn item_count(&self) -> usize {
        self.buckets.iter().flatten().map(|b| b.len()).sum()
    }
}

/// Read-only view over one JSON object with path-aware accessors
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    path: &'a str,
    object: &'a Map<String, Value>,
}

impl<'a> ItemView<'a> {
    pub fn new(path: &'a str, object: &'a Map<String, Value>) -> Self {
        Self { path, object }
    }

    /// Wrap an arbitrary value, failing unless it is an object
    pub fn from_value(path: &'a str, value: &'a Value) -> Result<Self, FieldError> {
        match value {
            Value::Object(object) => Ok(Self::new(path, object)),
            _ => Err(FieldError::WrongType {
                field: path.to_string(),
                expected: "an object",
            }),
        }
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, FieldError> {
        match self.object.get(key) {
            Some(Value::Null) | None => Err(FieldError::Missing(self.field_path(key))),
            Some(value) => Ok(value),
        }
    }

    /// Required string field
    pub fn str_field(&self, key: &str) -> Result<&'a str, FieldError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| FieldError::WrongType {
                field: self.field_path(key),
                expected: "a string",
            })
    }

    /// Required numeric field. JSON integers are widened to f64.
    pub fn f64_field(&self, key: &str) -> Result<f64, FieldError> {
        self.required(key)?
            .as_f64()
            .ok_or_else(|| FieldError::WrongType {
                field: self.field_path(key),
                expected: "a number",
            })
    }

    /// Required nested object
    pub fn object_field(&self, key: &str) -> Result<&'a Map<String, Value>, FieldError> {
        self.required(key)?
            .as_object()
            .ok_or_else(|| FieldError::WrongType {
                field: self.field_path(key),
                expected: "an object",
            })
    }

    /// Optional string field; absent or non-string yields `None`
    pub fn opt_str(&self, key: &str) -> Option<&'a str> {
        self.object.get(key).and_then(Value::as_str)
    }

    /// Optional nested object; absent or non-object yields `None`
    pub fn opt_object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.object.get(key).and_then(Value::as_object)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_skips_null_buckets() {
        let body = br#"{"code":200,"data":[null,{"a":{"name":"a"}}]}"#;
        let response = AllocationResponse::from_slice(body).unwrap();

        assert_eq!(response.code, json!(200));
        assert_eq!(response.buckets.len(), 2);
        assert!(response.buckets[0].is_none());
        assert_eq!(response.item_count(), 1);
    }

    #[test]
    fn test_decode_rejects_malformed_envelopes() {
        assert!(matches!(
            AllocationResponse::from_slice(b"not json"),
            Err(EnvelopeError::InvalidJson(_))
        ));
        assert_eq!(
            AllocationResponse::from_slice(b"[1,2]").unwrap_err(),
            EnvelopeError::NotAnObject("an array")
        );
        assert_eq!(
            AllocationResponse::from_slice(br#"{"code":200}"#).unwrap_err(),
            EnvelopeError::MissingData
        );
        assert_eq!(
            AllocationResponse::from_slice(br#"{"code":200,"data":{}}"#).unwrap_err(),
            EnvelopeError::DataNotArray("an object")
        );

        let err = AllocationResponse::from_slice(br#"{"code":200,"data":[3]}"#).unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::BadBucket {
                index: 0,
                found: "a number"
            }
        );
        assert_eq!(err.to_string(), "data[0] must be an object or null, got a number");
    }

    #[test]
    fn test_null_data_is_not_an_empty_response() {
        let err = AllocationResponse::from_slice(br#"{"code":200,"data":null}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::DataNotArray("null"));
        assert_eq!(err.to_string(), "field `data` must be an array, got null");
    }

    #[test]
    fn test_code_is_not_validated() {
        let response = AllocationResponse::from_slice(br#"{"code":500,"data":[]}"#).unwrap();
        assert_eq!(response.code, json!(500));
        assert_eq!(response.item_count(), 0);
    }

    #[test]
    fn test_item_view_accessors() {
        let value = json!({
            "name": "web",
            "cpuCost": 1,
            "ramCost": "cheap",
            "pvCost": null,
            "properties": {"labels": {"team": "core"}}
        });
        let view = ItemView::from_value("web", &value).unwrap();

        assert_eq!(view.str_field("name").unwrap(), "web");
        assert_eq!(view.f64_field("cpuCost").unwrap(), 1.0);
        assert_eq!(
            view.f64_field("ramCost").unwrap_err(),
            FieldError::WrongType {
                field: "web.ramCost".to_string(),
                expected: "a number"
            }
        );
        assert_eq!(
            view.f64_field("pvCost").unwrap_err(),
            FieldError::Missing("web.pvCost".to_string())
        );
        assert!(view.object_field("properties").is_ok());
        assert!(view.opt_object("labels").is_none());
        assert_eq!(view.opt_str("cpuCost"), None);
    }

    #[test]
    fn test_item_view_requires_object() {
        let value = json!("scalar");
        assert!(ItemView::from_value("x", &value).is_err());
    }
}
