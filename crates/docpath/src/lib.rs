//! A restricted path-query and assignment language over JSON documents.
//!
//! Expressions locate values inside nested maps and sequences. Reads support
//! field access (`a.b`), index access (`a[0]`, negative from the end),
//! projections (`a[*].b`), filters (`[?grade > 1]`), fallbacks
//! (`key || name`), and comparisons against literals. Writes are restricted
//! to plain field/index chains: field steps auto-create missing intermediate
//! maps, index steps never extend a sequence.
//!
//! ```
//! use serde_json::json;
//! use docpath::PathExpression;
//!
//! let expr = PathExpression::compile("a.b.c").unwrap();
//! let mut doc = json!({});
//! expr.assign(&mut doc, json!(5)).unwrap();
//! assert_eq!(doc, json!({"a": {"b": {"c": 5}}}));
//! assert_eq!(expr.search(&doc), Some(json!(5)));
//! ```

use serde_json::Value;

mod assign;
mod error;
mod eval;
mod parse;

pub use error::{Error, Result};

use assign::AssignStep;
use parse::Node;

/// A compiled, immutable path expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    source: String,
    root: Node,
}

impl PathExpression {
    /// Compile an expression, failing with [`Error::Syntax`] on malformed
    /// input.
    pub fn compile(expression: &str) -> Result<Self> {
        let root = parse::parse(expression)?;
        Ok(Self {
            source: expression.to_string(),
            root,
        })
    }

    /// The expression source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the expression against a document. Returns `None` when the
    /// location is absent (a missing field is not an error). Reads never
    /// mutate the document.
    ///
    /// A JSON `null` at the target location is also reported as absent, so
    /// that optional fields written as null and omitted fields behave the
    /// same.
    pub fn search(&self, document: &Value) -> Option<Value> {
        eval::eval(&self.root, document).filter(|v| !v.is_null())
    }

    /// Whether this expression is a plain field/index chain and may be used
    /// with [`assign`](Self::assign) and [`delete`](Self::delete).
    pub fn is_assignable(&self) -> bool {
        self.assignment_steps().is_ok()
    }

    /// Assign `new_value` at the expression's location, replacing whatever
    /// was there. Missing intermediate maps are created; index steps require
    /// an existing in-range sequence.
    pub fn assign(&self, document: &mut Value, new_value: Value) -> Result<()> {
        let steps = self.assignment_steps()?;
        assign::assign(&steps, &self.source, document, new_value)
    }

    /// Remove the field or index at the expression's location; a no-op when
    /// absent. Same shape restrictions as [`assign`](Self::assign).
    pub fn delete(&self, document: &mut Value) -> Result<()> {
        let steps = self.assignment_steps()?;
        assign::delete(&steps, &self.source, document)
    }

    /// Join a relative expression onto this one, producing the path of a
    /// nested location. Both sides must be assignable chains.
    pub fn join(&self, relative: &str) -> Result<PathExpression> {
        let appended = PathExpression::compile(relative)?;
        let mut steps = self.assignment_steps()?;
        steps.extend(appended.assignment_steps()?);

        let source = if relative.starts_with('[') {
            format!("{}{}", self.source, relative)
        } else {
            format!("{}.{}", self.source, relative)
        };
        let root = parse::parse(&source)?;
        Ok(PathExpression { source, root })
    }

    fn assignment_steps(&self) -> Result<Vec<AssignStep>> {
        assign::assignment_steps(&self.root, &self.source)
    }
}

impl std::fmt::Display for PathExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile and evaluate an expression in one call.
pub fn search(expression: &str, document: &Value) -> Result<Option<Value>> {
    Ok(PathExpression::compile(expression)?.search(document))
}
