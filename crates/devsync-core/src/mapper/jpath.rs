use serde_json::Value;
use serde_json_path::JsonPath;

use super::{ValueMapper, INCONCLUSIVE};
use crate::error::{Error, Result};

/// Evaluates a JSONPath query against a JSON document.
///
/// Input that is not a JSON object or array yields [`INCONCLUSIVE`], so a
/// device that answers with an error page can fall back to another action.
#[derive(Debug, Clone)]
pub struct JPathMapper {
    path: JsonPath,
    index: usize,
}

impl JPathMapper {
    pub fn new(jpath: &str, index: usize) -> Result<Self> {
        let path = JsonPath::parse(jpath).map_err(|e| Error::mapper("jpath", e.to_string()))?;
        Ok(Self { path, index })
    }
}

impl ValueMapper for JPathMapper {
    fn map(&self, value: &str) -> String {
        let json: Value = match serde_json::from_str(value) {
            Ok(json @ (Value::Object(_) | Value::Array(_))) => json,
            _ => return INCONCLUSIVE.to_string(),
        };

        let matches = self.path.query(&json).all();
        match matches.get(self.index) {
            Some(Value::String(s)) => s.clone(),
            Some(found) => found.to_string(),
            // Fewer matches than the index: hand back the whole match list
            None => Value::Array(matches.iter().map(|found| (*found).clone()).collect()).to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        "jpath"
    }
}
