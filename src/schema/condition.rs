use serde::{Deserialize, Serialize};

use super::value::Value;

/// One side of a comparison: a variable lookup or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operand {
    Variable { target: String },
    Value { value: Value },
}

impl Operand {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable {
            target: name.into(),
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value {
            value: value.into(),
        }
    }
}

/// Comparison operators available to simple conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains", alias = "not-contains")]
    NotContains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
}

/// A leaf comparison between two operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleCondition {
    pub op: Comparator,
    pub left: Operand,
    pub right: Operand,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub case_insensitive: bool,
}

/// A boolean expression over variables and literals.
///
/// Logical nodes nest without limit; the document shape is
/// `{"and": [...]}`, `{"or": [...]}`, `{"not": {...}}` or a simple
/// `{"op", "left", "right"}` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    And { and: Vec<Condition> },
    Or { or: Vec<Condition> },
    Not { not: Box<Condition> },
    Simple(SimpleCondition),
}

impl Condition {
    pub fn simple(op: Comparator, left: Operand, right: Operand) -> Self {
        Self::Simple(SimpleCondition {
            op,
            left,
            right,
            case_insensitive: false,
        })
    }

    /// Same comparison with string case folding enabled.
    pub fn simple_ci(op: Comparator, left: Operand, right: Operand) -> Self {
        Self::Simple(SimpleCondition {
            op,
            left,
            right,
            case_insensitive: true,
        })
    }

    /// Every variable name referenced anywhere in this condition.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::And { and: items } | Self::Or { or: items } => {
                for c in items {
                    c.collect_variables(out);
                }
            }
            Self::Not { not } => not.collect_variables(out),
            Self::Simple(s) => {
                for operand in [&s.left, &s.right] {
                    if let Operand::Variable { target } = operand {
                        out.push(target);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_condition() {
        let c: Condition = serde_json::from_str(
            r#"{
                "op": "=",
                "left": { "type": "variable", "target": "username" },
                "right": { "type": "value", "value": "sonya" },
                "caseInsensitive": true
            }"#,
        )
        .unwrap();
        assert_eq!(
            c,
            Condition::simple_ci(
                Comparator::Eq,
                Operand::variable("username"),
                Operand::value("sonya")
            )
        );
    }

    #[test]
    fn parse_nested_logical_condition() {
        let c: Condition = serde_json::from_str(
            r#"{ "and": [
                { "not": { "op": "contains",
                           "left": { "type": "variable", "target": "log" },
                           "right": { "type": "value", "value": "x" } } },
                { "or": [] }
            ] }"#,
        )
        .unwrap();
        match c {
            Condition::And { and } => {
                assert_eq!(and.len(), 2);
                assert!(matches!(and[0], Condition::Not { .. }));
                assert!(matches!(and[1], Condition::Or { ref or } if or.is_empty()));
            }
            other => panic!("expected and, got {:?}", other),
        }
    }

    #[test]
    fn comparator_spellings() {
        let ops: Vec<Comparator> =
            serde_json::from_str(r#"["not contains", "not-contains", ">=", "endswith"]"#).unwrap();
        assert_eq!(
            ops,
            vec![
                Comparator::NotContains,
                Comparator::NotContains,
                Comparator::Ge,
                Comparator::EndsWith
            ]
        );
    }

    #[test]
    fn collects_referenced_variables() {
        let c = Condition::Or {
            or: vec![
                Condition::simple(Comparator::Gt, Operand::variable("a"), Operand::value(1)),
                Condition::Not {
                    not: Box::new(Condition::simple(
                        Comparator::Eq,
                        Operand::variable("b"),
                        Operand::variable("c"),
                    )),
                },
            ],
        };
        assert_eq!(c.variables(), vec!["a", "b", "c"]);
    }
}
