//! Value mappers.
//!
//! A mapper turns one string into another: the raw body of a get response into
//! a property value, or a property value into what a set URL expects. Actions
//! chain any number of mappers; see [`apply_mappers`].
//!
//! | type | behaviour | on no match |
//! |------|-----------|-------------|
//! | `static` | dictionary lookup | input unchanged |
//! | `regex` | capture group of the first match | input unchanged |
//! | `xpath` | text of the Nth selected XML node | input unchanged |
//! | `jpath` | Nth JSONPath match | `"inconclusive"` for non-JSON input |
//! | `eval` | trusted expression result | input unchanged |

mod eval;
mod jpath;
mod regex;
mod static_map;
mod xpath;

pub use self::eval::EvalMapper;
pub use self::jpath::JPathMapper;
pub use self::regex::RegexMapper;
pub use self::static_map::StaticMapper;
pub use self::xpath::XPathMapper;

use tracing::{debug, trace};

use crate::config::MapperConfig;
use crate::error::Result;
use crate::state::PropertyState;

/// Sentinel result meaning "not a definitive value".
pub const INCONCLUSIVE: &str = "inconclusive";

/// A string-to-string transformation.
///
/// Implementations never fail: input they cannot interpret is returned
/// unchanged, or turned into [`INCONCLUSIVE`].
pub trait ValueMapper {
    fn map(&self, value: &str) -> String;

    /// Configuration discriminator of the mapper.
    fn kind(&self) -> &'static str;
}

/// Every mapper variant that can appear in a configuration.
#[derive(Debug, Clone)]
pub enum Mapper {
    Static(StaticMapper),
    Regex(RegexMapper),
    XPath(XPathMapper),
    JPath(JPathMapper),
    Eval(EvalMapper),
}

impl Mapper {
    /// Build a mapper; eval mappers keep a handle on the accessory state.
    pub fn from_config(config: &MapperConfig, state: &PropertyState) -> Result<Self> {
        Ok(match config {
            MapperConfig::Static { mapping } => Self::Static(StaticMapper::new(mapping.clone())),
            MapperConfig::Regex { regexp, capture } => {
                Self::Regex(RegexMapper::new(regexp, capture.as_deref())?)
            }
            MapperConfig::XPath { xpath, index } => Self::XPath(XPathMapper::new(xpath, *index)?),
            MapperConfig::JPath { jpath, index } => Self::JPath(JPathMapper::new(jpath, *index)?),
            MapperConfig::Eval { expression } => {
                Self::Eval(EvalMapper::new(expression, state.clone())?)
            }
        })
    }

    fn inner(&self) -> &dyn ValueMapper {
        match self {
            Self::Static(m) => m,
            Self::Regex(m) => m,
            Self::XPath(m) => m,
            Self::JPath(m) => m,
            Self::Eval(m) => m,
        }
    }
}

impl ValueMapper for Mapper {
    fn map(&self, value: &str) -> String {
        self.inner().map(value)
    }

    fn kind(&self) -> &'static str {
        self.inner().kind()
    }
}

/// Run `input` through every mapper in order.
pub fn apply_mappers(mappers: &[Mapper], input: &str) -> String {
    if mappers.is_empty() {
        return input.to_string();
    }

    debug!("Applying {} mappers on '{}'", mappers.len(), input);
    let mut current = input.to_string();
    for (index, mapper) in mappers.iter().enumerate() {
        let next = mapper.map(&current);
        trace!(
            mapper = index,
            kind = mapper.kind(),
            "Mapped '{}' to '{}'",
            current,
            next
        );
        current = next;
    }
    debug!("Mapping result is '{}'", current);
    current
}
