use std::collections::HashMap;

use super::ValueMapper;

/// Dictionary lookup, e.g. `{"ON": "1", "OFF": "0"}`.
#[derive(Debug, Clone, Default)]
pub struct StaticMapper {
    mapping: HashMap<String, String>,
}

impl StaticMapper {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }
}

impl ValueMapper for StaticMapper {
    fn map(&self, value: &str) -> String {
        self.mapping
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}
