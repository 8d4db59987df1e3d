use crate::foundation::error::{UpgradeError, UpgradeResult};
use serde_json::{Map, Value};
use std::io::Read;

/// Name of the top-level section holding plane descriptions.
pub const PLANES_KEY: &str = "planes";

/// One pixel-format template document.
///
/// This is the JSON-facing object exactly as authored. Keys keep their on-disk order so a
/// rewritten template serializes back in the same layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatTemplate {
    root: Map<String, Value>,
}

impl FormatTemplate {
    /// Convert a parsed JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> UpgradeResult<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(UpgradeError::malformed(format!(
                "top level is {}, expected an object",
                json_type_name(&other)
            ))),
        }
    }

    /// Parse a template from a JSON reader.
    pub fn from_reader<R: Read>(r: R) -> UpgradeResult<Self> {
        let value: Value = serde_json::from_reader(r)
            .map_err(|e| UpgradeError::malformed(format!("parse format template JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a template from a JSON string.
    pub fn from_json_str(s: &str) -> UpgradeResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> UpgradeResult<String> {
        let mut out = serde_json::to_string_pretty(&self.root)
            .map_err(|e| UpgradeError::Other(anyhow::Error::new(e)))?;
        out.push('\n');
        Ok(out)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn planes(&self) -> Option<&Value> {
        self.root.get(PLANES_KEY)
    }

    pub(crate) fn planes_mut(&mut self) -> Option<&mut Value> {
        self.root.get_mut(PLANES_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }
}

/// Human-readable JSON type, used in error messages.
pub(crate) fn json_type_name(v: &Value) -> &'static str {
    match v {
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

    #[test]
    fn key_order_survives_round_trip() {
        let src = "{\n  \"fourcc\": \"NV12\",\n  \"planes\": [],\n  \"bits\": 8\n}\n";
        let t = FormatTemplate::from_json_str(src).unwrap();
        let keys: Vec<&str> = t.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, ["fourcc", "planes", "bits"]);
        assert_eq!(t.to_json_pretty().unwrap(), src);
    }

    #[test]
    fn non_object_top_level_is_rejected() {
        let err = FormatTemplate::from_json_str("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("top level is an array"));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = FormatTemplate::from_json_str("{\"planes\": [").unwrap_err();
        assert!(err.to_string().contains("parse format template JSON"));
    }
}
