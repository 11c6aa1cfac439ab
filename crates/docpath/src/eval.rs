use serde_json::Value;

use crate::parse::{CmpOp, Node};

/// JMESPath-style truthiness: null, false, and empty strings/sequences/maps
/// are all falsy.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Evaluate a node against a context value. `None` means the location is
/// absent; reads are side-effect-free.
pub(crate) fn eval(node: &Node, ctx: &Value) -> Option<Value> {
    match node {
        Node::Field(name) => ctx.as_object()?.get(name).cloned(),
        Node::Index(index) => {
            let array = ctx.as_array()?;
            let resolved = resolve_index(*index, array.len())?;
            array.get(resolved).cloned()
        }
        Node::Literal(value) => Some(value.clone()),
        Node::Chain(steps) => eval_chain(steps, ctx),
        Node::Flatten => eval_chain(std::slice::from_ref(node), ctx),
        Node::Filter(_) => eval_chain(std::slice::from_ref(node), ctx),
        Node::Or(left, right) => {
            let left_value = eval(left, ctx);
            match left_value {
                Some(ref v) if truthy(v) => left_value,
                _ => eval(right, ctx),
            }
        }
        Node::Compare(lhs, op, literal) => {
            let left = eval(lhs, ctx).unwrap_or(Value::Null);
            compare(*op, &left, literal)
        }
    }
}

/// Evaluate a subexpression step by step. Projections (`[*]` and `[?...]`)
/// map the remaining steps over each element, dropping absent results.
fn eval_chain(steps: &[Node], ctx: &Value) -> Option<Value> {
    let mut current = ctx.clone();
    for (i, step) in steps.iter().enumerate() {
        match step {
            Node::Flatten => {
                let array = current.as_array()?;
                return Some(project(array, &steps[i + 1..]));
            }
            Node::Filter(predicate) => {
                let array = current.as_array()?;
                let kept: Vec<Value> = array
                    .iter()
                    .filter(|element| {
                        eval(predicate, element)
                            .map(|v| truthy(&v))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                return Some(project(&kept, &steps[i + 1..]));
            }
            other => {
                current = eval(other, &current)?;
            }
        }
    }
    Some(current)
}

fn project(elements: &[Value], rest: &[Node]) -> Value {
    if rest.is_empty() {
        return Value::Array(elements.to_vec());
    }
    let mapped: Vec<Value> = elements
        .iter()
        .filter_map(|element| eval_chain(rest, element))
        .filter(|v| !v.is_null())
        .collect();
    Value::Array(mapped)
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let index = index as usize;
        (index < len).then_some(index)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Option<Value> {
    match op {
        CmpOp::Eq => Some(Value::Bool(left == right)),
        CmpOp::Ne => Some(Value::Bool(left != right)),
        // Ordering comparisons are only defined for numbers; anything else
        // evaluates to absent, matching JMESPath.
        _ => {
            let l = left.as_f64()?;
            let r = right.as_f64()?;
            let result = match op {
                CmpOp::Lt => l < r,
                CmpOp::Le => l <= r,
                CmpOp::Gt => l > r,
                CmpOp::Ge => l >= r,
                CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
            };
            Some(Value::Bool(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use serde_json::json;

    fn search(expr: &str, doc: &Value) -> Option<Value> {
        eval(&parse(expr).unwrap(), doc)
    }

    #[test]
    fn test_field_and_index() {
        let doc = json!({"a": {"b": [10, 20, 30]}});
        assert_eq!(search("a.b[1]", &doc), Some(json!(20)));
        assert_eq!(search("a.b[-1]", &doc), Some(json!(30)));
        assert_eq!(search("a.b[5]", &doc), None);
        assert_eq!(search("a.missing", &doc), None);
    }

    #[test]
    fn test_filter_projection() {
        let doc = json!([
            {"name": "au", "grade": 3},
            {"name": "cu", "grade": 1},
            {"name": "ag", "grade": 2}
        ]);
        assert_eq!(
            search("[?grade > 1].name", &doc),
            Some(json!(["au", "ag"]))
        );
        assert_eq!(
            search("[?name == 'cu']", &doc),
            Some(json!([{"name": "cu", "grade": 1}]))
        );
    }

    #[test]
    fn test_flatten_projection() {
        let doc = json!({"rows": [{"v": 1}, {"v": 2}, {"other": 3}]});
        assert_eq!(search("rows[*].v", &doc), Some(json!([1, 2])));
    }

    #[test]
    fn test_or_fallback() {
        let doc = json!({"name": "grade"});
        assert_eq!(search("key || name", &doc), Some(json!("grade")));
        let doc = json!({"key": "k1", "name": "grade"});
        assert_eq!(search("key || name", &doc), Some(json!("k1")));
    }

    #[test]
    fn test_filter_on_non_array_is_absent() {
        let doc = json!({"a": 5});
        assert_eq!(search("a[?x > 1]", &doc), None);
    }
}
