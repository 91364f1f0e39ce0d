/// Operand resolution and condition evaluation over a variable store.
///
/// Evaluation is total: a missing variable or an operand of the wrong
/// kind makes the comparison false instead of failing.

use crate::core::store::VariableStore;
use crate::schema::condition::{Comparator, Condition, Operand, SimpleCondition};
use crate::schema::value::Value;

/// Resolve an operand. Variables are looked up without a fallback.
pub fn resolve_operand(store: &VariableStore, operand: &Operand) -> Option<Value> {
    match operand {
        Operand::Variable { target } => store.get(target).cloned(),
        Operand::Value { value } => Some(value.clone()),
    }
}

pub fn evaluate_condition(store: &VariableStore, condition: &Condition) -> bool {
    match condition {
        Condition::And { and } => and.iter().all(|c| evaluate_condition(store, c)),
        Condition::Or { or } => or.iter().any(|c| evaluate_condition(store, c)),
        Condition::Not { not } => !evaluate_condition(store, not),
        Condition::Simple(simple) => evaluate_simple(store, simple),
    }
}

fn evaluate_simple(store: &VariableStore, cond: &SimpleCondition) -> bool {
    let (Some(left), Some(right)) = (
        resolve_operand(store, &cond.left),
        resolve_operand(store, &cond.right),
    ) else {
        return false;
    };
    let (left, right) = if cond.case_insensitive {
        fold_case(left, right)
    } else {
        (left, right)
    };
    compare(cond.op, &left, &right)
}

/// Lowercase both sides, but only when both are strings.
fn fold_case(left: Value, right: Value) -> (Value, Value) {
    match (left, right) {
        (Value::String(a), Value::String(b)) => (
            Value::String(a.to_lowercase()),
            Value::String(b.to_lowercase()),
        ),
        other => other,
    }
}

/// Compare two resolved values.
pub fn compare(op: Comparator, left: &Value, right: &Value) -> bool {
    match op {
        Comparator::Eq => left == right,
        Comparator::Ne => left != right,
        Comparator::Gt | Comparator::Lt | Comparator::Ge | Comparator::Le => {
            let (Some(a), Some(b)) = (left.to_number(), right.to_number()) else {
                return false;
            };
            match op {
                Comparator::Gt => a > b,
                Comparator::Lt => a < b,
                Comparator::Ge => a >= b,
                _ => a <= b,
            }
        }
        Comparator::Contains
        | Comparator::NotContains
        | Comparator::StartsWith
        | Comparator::EndsWith => {
            let Some(haystack) = left.as_str() else {
                return false;
            };
            let needle = right.to_string();
            match op {
                Comparator::Contains => haystack.contains(needle.as_str()),
                Comparator::NotContains => !haystack.contains(needle.as_str()),
                Comparator::StartsWith => haystack.starts_with(needle.as_str()),
                _ => haystack.ends_with(needle.as_str()),
            }
        }
    }
}
