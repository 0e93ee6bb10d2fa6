//! Appearance expressions.
//!
//! An expression is a string that may contain `${...}` references. Every reference is replaced
//! with the value it points to and the resulting text is evaluated as a small side-effect-free
//! script: arithmetic, comparisons, logical operators, the ternary operator and a fixed set of
//! [built-in functions](self#built-in-functions).
//!
//! A reference is one of:
//! * a JSONPath query when its text starts with `$.`, run against the feature properties
//!   (or the whole feature if it has no properties);
//! * a define of the layer, which is evaluated recursively;
//! * a feature property key, taken verbatim: `${he[llo]world}` reads the property
//!   `he[llo]world`.
//!
//! An expression consisting of a single reference returns the referenced value as is. Otherwise
//! referenced values are spliced into the text: inside a string literal as plain text, elsewhere
//! as literals that evaluate back to the same value.
//!
//! # Built-in functions
//!
//! `atan2`, `Number`, `String`, `Boolean`, `isNaN`, `color`, `rgb`, `rgba`, `hsl`, `hsla`, `abs`,
//! `floor`, `ceil`, `round`, `sqrt`, `pow`, `min`, `max`, `clamp`. Color functions return opaque
//! colors, alpha arguments are accepted and ignored.
//!
//! ```
//! use geoscene::expression::{evaluate, EvalContext, Value};
//! use geoscene_types::{Coord, Feature};
//!
//! let feature = Feature::new("f", Coord::new(0.0, 0.0))
//!     .with_property("a", "x")
//!     .with_property("b", "x");
//! let context = EvalContext::new().with_feature(&feature);
//! assert_eq!(evaluate("${a} === '${b}'", &context).unwrap(), Value::Bool(true));
//! ```

use crate::error::ExpressionError;
use geoscene_types::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod eval;
mod functions;
mod json_path;
mod lexer;
mod parser;
mod value;

pub use json_path::JsonPath;
pub use value::{format_number, Value};

/// Named expressions of a layer, referenced from other expressions as `${name}`.
pub type Defines = BTreeMap<String, String>;

/// Expression given for an appearance property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    /// Single expression.
    Single(String),
    /// Condition list: the value paired with the first truthy condition is the result.
    Conditions {
        /// `[condition, value]` pairs, tested in order.
        conditions: Vec<(String, String)>,
    },
}

impl Expression {
    /// Evaluates the expression. Returns [`Value::Undefined`] if no condition matches.
    pub fn evaluate(&self, context: &EvalContext) -> Result<Value, ExpressionError> {
        match self {
            Expression::Single(source) => evaluate(source, context),
            Expression::Conditions { conditions } => evaluate_conditions(conditions, context),
        }
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::Single(value.to_string())
    }
}

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// Feature whose properties references resolve to. Without it any reference to feature
    /// data makes the whole expression `undefined`.
    pub feature: Option<&'a Feature>,
    /// Defines of the layer.
    pub defines: Option<&'a Defines>,
}

impl<'a> EvalContext<'a> {
    /// Context without a feature and without defines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the feature.
    pub fn with_feature(mut self, feature: &'a Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Sets the defines.
    pub fn with_defines(mut self, defines: &'a Defines) -> Self {
        self.defines = Some(defines);
        self
    }
}

/// Evaluates an expression string.
pub fn evaluate(expression: &str, context: &EvalContext) -> Result<Value, ExpressionError> {
    let value = Evaluator {
        context,
        stack: vec![],
    }
    .evaluate(expression)?;
    Ok(value.unwrap_or_default())
}

/// Evaluates a condition list: the value expression of the first truthy condition is evaluated
/// and returned. Returns [`Value::Undefined`] if no condition matches.
pub fn evaluate_conditions(
    conditions: &[(String, String)],
    context: &EvalContext,
) -> Result<Value, ExpressionError> {
    for (condition, value) in conditions {
        if evaluate(condition, context)?.is_truthy() {
            return evaluate(value, context);
        }
    }

    Ok(Value::Undefined)
}

/// Target of a `${...}` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference<'a> {
    JsonPath(&'a str),
    Define(&'a str),
    Property(&'a str),
}

impl<'a> Reference<'a> {
    fn classify(inner: &'a str, defines: Option<&Defines>) -> Self {
        let inner = inner.trim();
        if inner.starts_with("$.") {
            Reference::JsonPath(inner)
        } else if defines.is_some_and(|d| d.contains_key(inner)) {
            Reference::Define(inner)
        } else {
            Reference::Property(inner)
        }
    }
}

/// A `${...}` span of an expression, with byte offsets of the whole span.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span<'a> {
    start: usize,
    end: usize,
    inner: &'a str,
    /// Quote character of the string literal the span is in.
    quote: Option<char>,
}

/// Finds `${...}` spans. Braces inside a span are balanced, so `${a{b}c}` is one span.
fn scan(expression: &str) -> Result<Vec<Span<'_>>, ExpressionError> {
    let mut spans = vec![];
    let mut quote = None;
    let mut escaped = false;
    let mut chars = expression.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c == '$' && chars.peek().map(|(_, next)| *next) == Some('{') {
            chars.next();
            let inner_start = start + 2;
            let mut depth = 1;
            let mut end = None;
            for (i, c) in chars.by_ref() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            let inner_end = end.ok_or_else(|| {
                ExpressionError::Syntax(format!("unclosed `${{` in `{expression}`"))
            })?;
            spans.push(Span {
                start,
                end: inner_end + 1,
                inner: &expression[inner_start..inner_end],
                quote,
            });
            escaped = false;
            continue;
        }

        match (quote, c) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            _ => {}
        }
    }

    Ok(spans)
}

struct Evaluator<'c, 'a> {
    context: &'c EvalContext<'a>,
    /// Defines being evaluated, outermost first.
    stack: Vec<String>,
}

impl Evaluator<'_, '_> {
    /// Evaluates the expression. `None` if a reference needs a feature and there is none, in
    /// which case the expression as a whole is `undefined`.
    fn evaluate(&mut self, expression: &str) -> Result<Option<Value>, ExpressionError> {
        let spans = scan(expression)?;
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Ok(Some(Value::Undefined));
        }

        if let [span] = spans.as_slice() {
            if span.quote.is_none() && &expression[span.start..span.end] == trimmed {
                return self.resolve(span.inner);
            }
        }

        let mut source = String::with_capacity(expression.len());
        let mut last = 0;
        for span in &spans {
            let Some(value) = self.resolve(span.inner)? else {
                return Ok(None);
            };

            source.push_str(&expression[last..span.start]);
            match span.quote {
                Some(quote) => {
                    if !value.is_undefined() {
                        source.push_str(&escape(&value.to_string(), quote));
                    }
                }
                None => source.push_str(&value.to_literal()),
            }
            last = span.end;
        }
        source.push_str(&expression[last..]);

        eval::eval(&parser::parse(&source)?).map(Some)
    }

    /// Value of a reference. `None` if the reference needs a feature and there is none.
    fn resolve(&mut self, inner: &str) -> Result<Option<Value>, ExpressionError> {
        let reference = Reference::classify(inner, self.context.defines);
        log::trace!("Resolving {reference:?}");

        match reference {
            Reference::Define(name) => self.resolve_define(name),
            Reference::JsonPath(path) => {
                let Some(feature) = self.context.feature else {
                    return Ok(None);
                };
                let path = JsonPath::parse(path)?;
                let value = if feature.properties.is_empty() {
                    let target = serde_json::to_value(feature)
                        .map_err(|e| ExpressionError::Syntax(e.to_string()))?;
                    path.first(&target).map(Value::from_json)
                } else {
                    let target = serde_json::Value::Object(feature.properties.clone());
                    path.first(&target).map(Value::from_json)
                };
                Ok(Some(value.unwrap_or_default()))
            }
            Reference::Property(key) => Ok(self
                .context
                .feature
                .map(|feature| feature.property(key).map(Value::from_json).unwrap_or_default())),
        }
    }

    fn resolve_define(&mut self, name: &str) -> Result<Option<Value>, ExpressionError> {
        if self.stack.iter().any(|n| n == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(ExpressionError::CyclicDefine(chain.join(" -> ")));
        }

        let Some(source) = self.context.defines.and_then(|d| d.get(name)) else {
            return Ok(Some(Value::Undefined));
        };

        self.stack.push(name.to_string());
        let result = self.evaluate(source);
        self.stack.pop();
        result
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == quote {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
