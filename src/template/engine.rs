//! Pluggable template engine interface and the built-in brace engine

use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use serde_json::Value;

use super::syntax::{self, Comparison, Condition, Expr, Filter, Node, Operand};
use super::types::{EvaluationError, TemplateResult};

/// How interpolated values are written into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Plain text (subjects): values are written verbatim
    Text,
    /// HTML (bodies): values are escaped unless marked raw
    Html,
}

/// A template that has been parsed and is ready for evaluation
pub trait CompiledTemplate: Send + Sync + fmt::Debug {
    /// Evaluate against a JSON context object
    fn evaluate(&self, context: &Value) -> Result<String, EvaluationError>;
}

/// Compiles template source into an evaluable form
pub trait TemplateEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    fn compile(&self, source: &str, mode: OutputMode) -> TemplateResult<Arc<dyn CompiledTemplate>>;
}

/// Default engine: `{{ }}`, `{{{ }}}`, `{% if %}` and `{% for %}`
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceEngine;

impl TemplateEngine for BraceEngine {
    fn name(&self) -> &'static str {
        "brace"
    }

    fn compile(&self, source: &str, mode: OutputMode) -> TemplateResult<Arc<dyn CompiledTemplate>> {
        let nodes = syntax::parse(source)?;
        Ok(Arc::new(BraceTemplate { nodes, mode }))
    }
}

#[derive(Debug)]
struct BraceTemplate {
    nodes: Vec<Node>,
    mode: OutputMode,
}

impl CompiledTemplate for BraceTemplate {
    fn evaluate(&self, context: &Value) -> Result<String, EvaluationError> {
        let mut scope = Scope {
            root: context,
            locals: Vec::new(),
        };
        let mut out = String::new();
        render_nodes(&self.nodes, &mut scope, self.mode, &mut out)?;
        Ok(out)
    }
}

static NULL: Value = Value::Null;

/// Walk a dotted path through a JSON tree. Missing segments yield null.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> &'a Value {
    walk(root, path.split('.'))
}

fn walk<'a, I, S>(mut current: &'a Value, segments: I) -> &'a Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

struct Scope<'a> {
    root: &'a Value,
    locals: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn lookup(&self, path: &[String]) -> Value {
        let Some((head, tail)) = path.split_first() else {
            return Value::Null;
        };

        let base = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| name == head)
            .map(|(_, value)| value)
            .unwrap_or_else(|| walk(self.root, [head]));

        walk(base, tail).clone()
    }
}

fn render_nodes(
    nodes: &[Node],
    scope: &mut Scope<'_>,
    mode: OutputMode,
    out: &mut String,
) -> Result<(), EvaluationError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { expr, raw } => {
                let value = eval_expr(expr, scope)?;
                let text = display_value(&value);
                if mode == OutputMode::Html && !raw {
                    escape_html_into(&text, out);
                } else {
                    out.push_str(&text);
                }
            }
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let branch = if eval_condition(condition, scope)? {
                    then_branch
                } else {
                    else_branch
                };
                render_nodes(branch, scope, mode, out)?;
            }
            Node::For {
                binding,
                iterable,
                body,
            } => {
                let items = match eval_expr(iterable, scope)? {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(EvaluationError::new(format!(
                            "cannot iterate over {}",
                            type_name(&other)
                        )))
                    }
                };

                for item in items {
                    scope.locals.push((binding.clone(), item));
                    let result = render_nodes(body, scope, mode, out);
                    scope.locals.pop();
                    result?;
                }
            }
        }
    }
    Ok(())
}

fn eval_expr(expr: &Expr, scope: &Scope<'_>) -> Result<Value, EvaluationError> {
    let mut value = match &expr.operand {
        Operand::Path(path) => scope.lookup(path),
        Operand::Literal(value) => value.clone(),
    };
    for filter in &expr.filters {
        value = apply_filter(filter, value);
    }
    Ok(value)
}

fn eval_condition(condition: &Condition, scope: &Scope<'_>) -> Result<bool, EvaluationError> {
    let left = eval_expr(&condition.left, scope)?;
    let result = match &condition.compare {
        None => is_truthy(&left),
        Some((op, right)) => {
            let equal = values_equal(&left, &eval_expr(right, scope)?);
            match op {
                Comparison::Eq => equal,
                Comparison::Ne => !equal,
            }
        }
    };
    Ok(result != condition.negated)
}

fn apply_filter(filter: &Filter, value: Value) -> Value {
    match filter {
        Filter::Default(fallback) => {
            if is_blank(&value) {
                fallback.clone()
            } else {
                value
            }
        }
        Filter::Upper => Value::String(display_value(&value).to_uppercase()),
        Filter::Lower => Value::String(display_value(&value).to_lowercase()),
        Filter::Trim => Value::String(display_value(&value).trim().to_string()),
        Filter::Length => {
            let len = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::Null => 0,
                other => display_value(other).chars().count(),
            };
            Value::from(len as u64)
        }
        Filter::Join(separator) => match value {
            Value::Array(items) => Value::String(
                items
                    .iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(separator.as_str()),
            ),
            other => other,
        },
        Filter::Pluralize { singular, plural } => {
            let word = if as_number(&value) == Some(1.0) {
                singular
            } else {
                plural
            };
            Value::String(word.clone())
        }
        Filter::Date(format) => {
            let formatted = value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.format(format).to_string());
            formatted.map(Value::String).unwrap_or(value)
        }
    }
}

/// Render a JSON value as template text
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // For arrays and objects, use JSON representation
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => Some(items.len() as f64),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            display_value(left) == display_value(right)
        }
        _ => left == right,
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

/// Escape text for safe inclusion in HTML element content and attribute values
fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
}
