//! Trusted expressions and URL/body templates.
//!
//! Configuration authors can compute values with expressions in two places:
//! the `eval` mapper and `${...}` segments of set-action URL and body
//! templates. Both go through [`TrustedExpression`], which evaluates the
//! `evalexpr` language: arithmetic, comparisons, string functions and
//! conditionals, without any access to I/O or the host process.
//!
//! ## Variables
//!
//! | name | content |
//! |------|---------|
//! | `value` | value being mapped or written |
//! | `mapped_value` | set templates only: the value after the action's mappers |
//! | `<Property>` | last known value of every property of the accessory |
//!
//! Strings that look like numbers or booleans are exposed as `Int`, `Float`
//! or `Boolean`, so `value * 2` and `Power == 1` work on raw response text.

use std::fmt;

use evalexpr::{ContextWithMutableVariables, HashMapContext, Node};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::state::PropertyState;
use crate::value::PropertyValue;

static VALUE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{value\}").expect("placeholder pattern is valid"));

/// A precompiled expression supplied by the configuration author.
#[derive(Clone)]
pub struct TrustedExpression {
    source: String,
    tree: Node,
}

impl TrustedExpression {
    pub fn compile(source: &str) -> Result<Self> {
        let tree = evalexpr::build_operator_tree(source)
            .map_err(|e| Error::Expression(format!("'{}': {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a scope and render the result as a string.
    pub fn evaluate(&self, scope: &ExpressionScope) -> Result<String> {
        let value = self
            .tree
            .eval_with_context(&scope.context)
            .map_err(|e| Error::Expression(format!("'{}': {}", self.source, e)))?;
        Ok(value_to_string(value))
    }
}

impl fmt::Debug for TrustedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrustedExpression").field(&self.source).finish()
    }
}

/// Variables visible to an expression.
#[derive(Default)]
pub struct ExpressionScope {
    context: HashMapContext,
}

impl ExpressionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose every property of the accessory under its own name.
    pub fn with_state(mut self, state: &PropertyState) -> Self {
        for (name, value) in state.snapshot() {
            self.set(name, property_to_value(&value));
        }
        self
    }

    pub fn with_variable(mut self, name: &str, raw: &str) -> Self {
        self.set(name.to_string(), text_to_value(raw));
        self
    }

    fn set(&mut self, name: String, value: evalexpr::Value) {
        if let Err(e) = self.context.set_value(name.clone(), value) {
            trace!("Skipping expression variable '{}': {}", name, e);
        }
    }
}

fn text_to_value(raw: &str) -> evalexpr::Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return evalexpr::Value::Int(i);
    }
    // f64 parsing also accepts "inf" and "NaN", which should stay strings
    if trimmed.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return evalexpr::Value::Float(f);
        }
    }
    match trimmed {
        "true" => evalexpr::Value::Boolean(true),
        "false" => evalexpr::Value::Boolean(false),
        _ => evalexpr::Value::String(raw.to_string()),
    }
}

fn property_to_value(value: &PropertyValue) -> evalexpr::Value {
    match value {
        PropertyValue::Integer(i) => evalexpr::Value::Int(*i),
        PropertyValue::Float(f) => evalexpr::Value::Float(*f),
        PropertyValue::Boolean(b) => evalexpr::Value::Boolean(*b),
        PropertyValue::String(s) => text_to_value(s),
    }
}

fn value_to_string(value: evalexpr::Value) -> String {
    match value {
        evalexpr::Value::String(s) => s,
        evalexpr::Value::Int(i) => i.to_string(),
        evalexpr::Value::Float(f) => f.to_string(),
        evalexpr::Value::Boolean(b) => b.to_string(),
        evalexpr::Value::Empty => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
enum TemplatePart {
    Literal(String),
    Expression(TrustedExpression),
}

/// URL or body template of an action.
///
/// Get-actions use their template text verbatim. Set-actions parse `${expr}`
/// segments into trusted expressions and replace `{value}` when rendered.
/// Byte offset of the `}` closing an expression, skipping string literals.
fn closing_brace(expression: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in expression.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '}' if !in_string => return Some(offset),
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Template that renders to its source text.
    pub fn literal(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            parts: vec![TemplatePart::Literal(source.clone())],
            source,
        }
    }

    /// Template with `${expr}` segments compiled as trusted expressions.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut parts = Vec::new();
        let mut rest = source.as_str();

        while let Some(start) = rest.find("${") {
            if start > 0 {
                parts.push(TemplatePart::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = closing_brace(after).ok_or_else(|| {
                Error::Expression(format!("unterminated '${{' in template '{}'", source))
            })?;
            parts.push(TemplatePart::Expression(TrustedExpression::compile(
                &after[..end],
            )?));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Literal(rest.to_string()));
        }

        Ok(Self { source, parts })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn has_expressions(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, TemplatePart::Expression(_)))
    }

    /// Evaluate expression segments, then substitute `{value}` (any case).
    ///
    /// A failing expression renders as an empty segment.
    pub fn render(&self, scope: &ExpressionScope, value: &str) -> String {
        let mut rendered = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => rendered.push_str(text),
                TemplatePart::Expression(expression) => match expression.evaluate(scope) {
                    Ok(result) => rendered.push_str(&result),
                    Err(e) => warn!("Template expression failed: {}", e),
                },
            }
        }
        replace_value_placeholder(&rendered, value)
    }
}

/// Replace every case-insensitive `{value}` in `text`.
pub fn replace_value_placeholder(text: &str, value: &str) -> String {
    VALUE_PLACEHOLDER
        .replace_all(text, NoExpand(value))
        .into_owned()
}
