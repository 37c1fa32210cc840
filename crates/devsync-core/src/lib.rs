//! Core types for devsync.
//!
//! This crate holds everything that does not touch the network: the
//! accessory configuration, typed property values, the value mapper pipeline,
//! trusted expressions and the compiled action tree. The I/O engine lives in
//! `devsync-devices`.

pub mod action;
pub mod config;
pub mod error;
pub mod expression;
pub mod mapper;
pub mod registry;
pub mod state;
pub mod value;

pub use action::{Action, Direction};
pub use config::{AccessoryConfig, ActionConfig, MapperConfig, PropertyProps};
pub use error::{Error, Result};
pub use expression::{ExpressionScope, Template, TrustedExpression};
pub use mapper::{apply_mappers, Mapper, ValueMapper, INCONCLUSIVE};
pub use registry::{action_name, compact_name, ActionRegistry};
pub use state::PropertyState;
pub use value::{PropertyFormat, PropertyValue};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::action::{Action, Direction};
    pub use crate::config::{AccessoryConfig, ActionConfig, MapperConfig};
    pub use crate::error::{Error, Result};
    pub use crate::mapper::{apply_mappers, ValueMapper, INCONCLUSIVE};
    pub use crate::registry::ActionRegistry;
    pub use crate::state::PropertyState;
    pub use crate::value::{PropertyFormat, PropertyValue};
}
