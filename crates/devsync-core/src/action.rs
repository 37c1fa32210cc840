//! Compiled HTTP actions.

use std::fmt;

use crate::config::ActionConfig;
use crate::error::Result;
use crate::expression::Template;
use crate::mapper::Mapper;
use crate::state::PropertyState;

/// Direction of an action relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Read the device state
    Get,
    /// Change the device state
    Set,
}

impl Direction {
    /// Configuration key prefix (`get` / `set`).
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }

    /// Split a configuration key such as `getPower` into direction and property.
    pub fn split_key(key: &str) -> Option<(Self, &str)> {
        [Self::Get, Self::Set].into_iter().find_map(|direction| {
            key.strip_prefix(direction.prefix())
                .filter(|property| !property.is_empty())
                .map(|property| (direction, property))
        })
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One HTTP call with its mapping pipeline and optional fallback.
///
/// Immutable once built. The fallback chain comes from nested configuration
/// objects, so it is always finite.
#[derive(Debug, Clone)]
pub struct Action {
    pub url: Template,
    pub method: String,
    pub body: Template,
    pub result_on_error: Option<String>,
    pub mappers: Vec<Mapper>,
    pub inconclusive: Option<Box<Action>>,
}

impl Action {
    /// Compile an action and its fallbacks.
    ///
    /// Set-actions get `${expr}` template segments compiled; get-actions keep
    /// their URL and body verbatim.
    pub fn from_config(
        config: &ActionConfig,
        direction: Direction,
        state: &PropertyState,
    ) -> Result<Self> {
        let (url, body) = match direction {
            Direction::Get => (
                Template::literal(config.url.clone()),
                Template::literal(config.body.clone()),
            ),
            Direction::Set => (
                Template::parse(config.url.clone())?,
                Template::parse(config.body.clone())?,
            ),
        };

        let mappers = config
            .mappers
            .iter()
            .map(|mapper| Mapper::from_config(mapper, state))
            .collect::<Result<Vec<_>>>()?;

        let inconclusive = match &config.inconclusive {
            Some(fallback) => Some(Box::new(Self::from_config(fallback, direction, state)?)),
            None => None,
        };

        Ok(Self {
            url,
            method: config.http_method.clone(),
            body,
            result_on_error: config.result_on_error.clone(),
            mappers,
            inconclusive,
        })
    }

    pub fn has_url(&self) -> bool {
        !self.url.source().trim().is_empty()
    }

    /// Number of actions in the fallback chain, this one included.
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut current = self;
        while let Some(next) = current.inconclusive.as_deref() {
            len += 1;
            current = next;
        }
        len
    }
}
