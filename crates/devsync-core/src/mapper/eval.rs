use tracing::warn;

use super::ValueMapper;
use crate::error::{Error, Result};
use crate::expression::{ExpressionScope, TrustedExpression};
use crate::state::PropertyState;

/// Computes a value with a trusted expression.
///
/// The expression sees the input as `value` and every property of the
/// accessory under its own name, so one property can be derived from another.
#[derive(Debug, Clone)]
pub struct EvalMapper {
    expression: TrustedExpression,
    state: PropertyState,
}

impl EvalMapper {
    pub fn new(expression: &str, state: PropertyState) -> Result<Self> {
        let expression = TrustedExpression::compile(expression)
            .map_err(|e| Error::mapper("eval", e.to_string()))?;
        Ok(Self { expression, state })
    }
}

impl ValueMapper for EvalMapper {
    fn map(&self, value: &str) -> String {
        let scope = ExpressionScope::new()
            .with_state(&self.state)
            .with_variable("value", value);

        match self.expression.evaluate(&scope) {
            Ok(result) => result,
            Err(e) => {
                warn!("Eval mapper failed, keeping input: {}", e);
                value.to_string()
            }
        }
    }

    fn kind(&self) -> &'static str {
        "eval"
    }
}
