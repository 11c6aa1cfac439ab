//! Typed accessors over raw object documents.
//!
//! A [`SchemaModel`] is a tree of [`SchemaProperty`] accessors rooted at a
//! [`ModelPath`]. Models never own document data; every read and write goes
//! through the document itself, so the document stays the single source of
//! truth and models can be rebuilt from it at any time.

use std::marker::PhantomData;

use docpath::PathExpression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Whether a model's sub-document is a map or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Map,
    List,
}

/// Locates a model's sub-document within the root document. The root model
/// has no expression and addresses the whole document.
#[derive(Debug, Clone)]
pub struct ModelPath {
    expr: Option<PathExpression>,
}

impl ModelPath {
    pub fn root() -> Self {
        Self { expr: None }
    }

    pub fn at(expression: &str) -> Result<Self> {
        Ok(Self {
            expr: Some(PathExpression::compile(expression)?),
        })
    }

    pub fn expression(&self) -> Option<&PathExpression> {
        self.expr.as_ref()
    }

    fn describe(&self) -> &str {
        self.expr
            .as_ref()
            .map(PathExpression::source)
            .unwrap_or("<root>")
    }

    /// The path of a nested location relative to this one.
    pub fn child(&self, relative: &str) -> Result<ModelPath> {
        match &self.expr {
            None => Self::at(relative),
            Some(expr) => Ok(Self {
                expr: Some(expr.join(relative)?),
            }),
        }
    }

    /// The sub-document at this path, if present.
    pub fn get(&self, document: &Value) -> Option<Value> {
        match &self.expr {
            None => Some(document.clone()),
            Some(expr) => expr.search(document),
        }
    }

    /// Create an empty container at this path when the location is absent.
    pub fn ensure(&self, document: &mut Value, kind: ContainerKind) -> Result<()> {
        if let Some(expr) = &self.expr {
            if expr.search(document).is_none() {
                let empty = match kind {
                    ContainerKind::Map => Value::Object(Map::new()),
                    ContainerKind::List => Value::Array(Vec::new()),
                };
                expr.assign(document, empty)?;
            }
        }
        Ok(())
    }

    /// A typed accessor for a value nested under this path.
    pub fn property<T>(&self, relative: &str) -> Result<SchemaProperty<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let child = self.child(relative)?;
        let expr = child.expr.ok_or_else(|| {
            Error::validation(relative, "property paths must be non-root")
        })?;
        Ok(SchemaProperty::from_expression(expr))
    }

    /// Bind a nested model, creating its container when absent.
    pub fn submodel<M: SchemaModel>(&self, relative: &str, document: &mut Value) -> Result<M> {
        let child = self.child(relative)?;
        child.ensure(document, M::kind())?;
        M::bind(&child, document)
    }

    /// Bind a nested model only when its sub-document exists.
    pub fn submodel_opt<M: SchemaModel>(
        &self,
        relative: &str,
        document: &mut Value,
    ) -> Result<Option<M>> {
        let child = self.child(relative)?;
        if child.get(document).is_none() {
            return Ok(None);
        }
        M::bind(&child, document).map(Some)
    }
}

/// A typed accessor for one document location.
#[derive(Debug, Clone)]
pub struct SchemaProperty<T> {
    path: PathExpression,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaProperty<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(expression: &str) -> Result<Self> {
        Ok(Self::from_expression(PathExpression::compile(expression)?))
    }

    pub(crate) fn from_expression(path: PathExpression) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn source(&self) -> &str {
        self.path.source()
    }

    /// Read the value, failing when it is absent or the wrong shape.
    pub fn get(&self, document: &Value) -> Result<T> {
        let raw = self
            .path
            .search(document)
            .ok_or_else(|| Error::validation(self.path.source(), "required value is missing"))?;
        serde_json::from_value(raw)
            .map_err(|err| Error::validation(self.path.source(), err.to_string()))
    }

    /// Read the value, mapping absence to `None`.
    pub fn get_opt(&self, document: &Value) -> Result<Option<T>> {
        let Some(raw) = self.path.search(document) else {
            return Ok(None);
        };
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|err| Error::validation(self.path.source(), err.to_string()))
    }

    /// Write the value, creating missing intermediate maps.
    pub fn set(&self, document: &mut Value, value: &T) -> Result<()> {
        let raw = serde_json::to_value(value)?;
        self.path.assign(document, raw)?;
        Ok(())
    }

    /// Write the value, or remove the location entirely for `None`.
    pub fn set_opt(&self, document: &mut Value, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.set(document, value),
            None => {
                self.path.delete(document)?;
                Ok(())
            }
        }
    }
}

/// A typed view over part of a document.
pub trait SchemaModel: Sized {
    /// The container shape of this model's sub-document.
    fn kind() -> ContainerKind {
        ContainerKind::Map
    }

    /// Construct the accessor tree for the sub-document at `base`. Required
    /// containers are created as a side effect, so binding a model against
    /// an empty document yields a writable skeleton.
    fn bind(base: &ModelPath, document: &mut Value) -> Result<Self>;

    /// Check model-specific constraints against the current document.
    fn validate(&self, document: &Value) -> Result<()> {
        let _ = document;
        Ok(())
    }
}
