use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::parse::Node;

/// A single step of an assignment target chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AssignStep {
    Field(String),
    Index(i64),
}

/// Reduce a parsed expression to a flat chain of field/index steps.
///
/// Any other construct (filters, projections, fallbacks, comparisons) is not
/// a writable location.
pub(crate) fn assignment_steps(root: &Node, source: &str) -> Result<Vec<AssignStep>> {
    let mut steps = Vec::new();
    collect_steps(root, source, &mut steps)?;
    Ok(steps)
}

fn collect_steps(node: &Node, source: &str, out: &mut Vec<AssignStep>) -> Result<()> {
    match node {
        Node::Field(name) => {
            out.push(AssignStep::Field(name.clone()));
            Ok(())
        }
        Node::Index(index) => {
            out.push(AssignStep::Index(*index));
            Ok(())
        }
        Node::Chain(steps) => {
            for step in steps {
                collect_steps(step, source, out)?;
            }
            Ok(())
        }
        _ => Err(Error::UnsupportedAssignmentTarget {
            expression: source.to_string(),
        }),
    }
}

fn invalid(source: &str, message: impl Into<String>) -> Error {
    Error::InvalidAssignmentTarget {
        expression: source.to_string(),
        message: message.into(),
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index as usize;
        (index < len).then_some(index)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

/// Assign `new_value` at the location described by `steps`.
///
/// Field steps auto-create empty maps for missing keys so that nested
/// assignment works without pre-creating parents. Index steps require an
/// existing in-range sequence; sequences are never extended.
pub(crate) fn assign(
    steps: &[AssignStep],
    source: &str,
    document: &mut Value,
    new_value: Value,
) -> Result<()> {
    let (last, init) = steps
        .split_last()
        .ok_or_else(|| invalid(source, "empty assignment target"))?;

    let mut current = document;
    for step in init {
        match step {
            AssignStep::Field(name) => {
                let map = current
                    .as_object_mut()
                    .ok_or_else(|| invalid(source, format!("'{name}' is not a map field")))?;
                current = map
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            AssignStep::Index(index) => {
                let array = current
                    .as_array_mut()
                    .ok_or_else(|| invalid(source, format!("index [{index}] on a non-sequence")))?;
                let resolved = resolve_index(*index, array.len())
                    .ok_or_else(|| invalid(source, format!("index [{index}] out of range")))?;
                current = &mut array[resolved];
            }
        }
    }

    match last {
        AssignStep::Field(name) => {
            let map = current
                .as_object_mut()
                .ok_or_else(|| invalid(source, format!("'{name}' is not a map field")))?;
            map.insert(name.clone(), new_value);
        }
        AssignStep::Index(index) => {
            let array = current
                .as_array_mut()
                .ok_or_else(|| invalid(source, format!("index [{index}] on a non-sequence")))?;
            let resolved = resolve_index(*index, array.len())
                .ok_or_else(|| invalid(source, format!("index [{index}] out of range")))?;
            array[resolved] = new_value;
        }
    }
    Ok(())
}

/// Remove the field or index described by `steps` if present. Absent
/// locations, including missing intermediate containers, are a no-op.
pub(crate) fn delete(steps: &[AssignStep], source: &str, document: &mut Value) -> Result<()> {
    let (last, init) = steps
        .split_last()
        .ok_or_else(|| invalid(source, "empty assignment target"))?;

    let mut current = document;
    for step in init {
        let next = match step {
            AssignStep::Field(name) => current.as_object_mut().and_then(|map| map.get_mut(name)),
            AssignStep::Index(index) => match current.as_array_mut() {
                Some(array) => match resolve_index(*index, array.len()) {
                    Some(i) => Some(&mut array[i]),
                    None => None,
                },
                None => None,
            },
        };
        match next {
            Some(value) => current = value,
            None => return Ok(()),
        }
    }

    match last {
        AssignStep::Field(name) => {
            if let Some(map) = current.as_object_mut() {
                map.shift_remove(name);
            }
        }
        AssignStep::Index(index) => {
            if let Some(array) = current.as_array_mut() {
                if let Some(resolved) = resolve_index(*index, array.len()) {
                    array.remove(resolved);
                }
            }
        }
    }
    Ok(())
}
