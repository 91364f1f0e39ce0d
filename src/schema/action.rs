use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::value::Value;

/// A single action or an ordered chain executed as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Chain(Vec<SingleAction>),
    Single(SingleAction),
}

impl Action {
    /// The actions of this unit, in execution order.
    pub fn steps(&self) -> &[SingleAction] {
        match self {
            Self::Chain(steps) => steps,
            Self::Single(step) => std::slice::from_ref(step),
        }
    }

    pub fn link(target: impl Into<String>) -> Self {
        Self::Single(SingleAction::Link {
            target: target.into(),
            shift_key: false,
        })
    }

    pub fn dialog(target: impl Into<String>) -> Self {
        Self::Single(SingleAction::Dialog {
            target: target.into(),
        })
    }
}

impl From<SingleAction> for Action {
    fn from(action: SingleAction) -> Self {
        Self::Single(action)
    }
}

impl From<Vec<SingleAction>> for Action {
    fn from(steps: Vec<SingleAction>) -> Self {
        Self::Chain(steps)
    }
}

/// One step of an action chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SingleAction {
    /// Navigate to a screen.
    Link {
        target: String,
        #[serde(default, rename = "shiftKey", skip_serializing_if = "std::ops::Not::not")]
        shift_key: bool,
    },
    /// Open a dialog.
    #[serde(alias = "alert")]
    Dialog { target: String },
    /// Cycle a toggle content item to its next state.
    Toggle { target: String },
    /// Mutate a variable.
    Variable {
        target: String,
        context: VariableContext,
    },
    /// Evaluate a condition once and run exactly one branch.
    Condition {
        condition: Condition,
        #[serde(rename = "true")]
        when_true: Box<Action>,
        #[serde(rename = "false")]
        when_false: Box<Action>,
    },
    /// Any `type` tag this interpreter does not know.
    #[serde(other)]
    Unknown,
}

impl SingleAction {
    pub fn variable(target: impl Into<String>, op: VariableOp) -> Self {
        Self::Variable {
            target: target.into(),
            context: VariableContext {
                action: op,
                value: None,
                rule: None,
            },
        }
    }

    pub fn set(target: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Variable {
            target: target.into(),
            context: VariableContext {
                action: VariableOp::Set,
                value: Some(value.into()),
                rule: None,
            },
        }
    }
}

/// Parameters of a variable mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableContext {
    pub action: VariableOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Rule template for `set`, or `"pre"` to make `concatenate` prepend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// Mutation kinds. Unrecognized names are kept so the executor can
/// report them instead of the whole document failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VariableOp {
    Set,
    Toggle,
    Increment,
    Decrement,
    Concatenate,
    Unsupported(String),
}

impl From<String> for VariableOp {
    fn from(s: String) -> Self {
        match s.as_str() {
            "set" => Self::Set,
            "toggle" => Self::Toggle,
            "increment" => Self::Increment,
            "decrement" => Self::Decrement,
            "concatenate" => Self::Concatenate,
            _ => Self::Unsupported(s),
        }
    }
}

impl From<VariableOp> for String {
    fn from(op: VariableOp) -> Self {
        match op {
            VariableOp::Set => "set".to_string(),
            VariableOp::Toggle => "toggle".to_string(),
            VariableOp::Increment => "increment".to_string(),
            VariableOp::Decrement => "decrement".to_string(),
            VariableOp::Concatenate => "concatenate".to_string(),
            VariableOp::Unsupported(s) => s,
        }
    }
}

/// The pattern(s) a command answers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandPattern {
    One(String),
    Many(Vec<String>),
}

impl CommandPattern {
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::One(p) => std::slice::from_ref(p),
            Self::Many(ps) => ps,
        }
    }
}

/// An entry in a prompt's command table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(alias = "pattern")]
    pub command: CommandPattern,
    pub action: Action,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_regex: bool,
}

impl Command {
    pub fn literal(patterns: &[&str], action: impl Into<Action>) -> Self {
        Self {
            command: CommandPattern::Many(patterns.iter().map(|p| p.to_string()).collect()),
            action: action.into(),
            allow_regex: false,
        }
    }

    pub fn regex(pattern: &str, action: impl Into<Action>) -> Self {
        Self {
            command: CommandPattern::One(pattern.to_string()),
            action: action.into(),
            allow_regex: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_and_chained_actions() {
        let single: Action =
            serde_json::from_str(r#"{ "type": "link", "target": "menu" }"#).unwrap();
        assert_eq!(single, Action::link("menu"));

        let chain: Action = serde_json::from_str(
            r#"[
                { "type": "variable", "target": "username", "context": { "action": "set", "value": "" } },
                { "type": "alert", "target": "saved" },
                { "type": "link", "target": "menu", "shiftKey": true }
            ]"#,
        )
        .unwrap();
        assert_eq!(chain.steps().len(), 3);
        assert_eq!(chain.steps()[0], SingleAction::set("username", ""));
        assert_eq!(
            chain.steps()[1],
            SingleAction::Dialog {
                target: "saved".to_string()
            }
        );
        assert!(matches!(
            chain.steps()[2],
            SingleAction::Link { shift_key: true, .. }
        ));
    }

    #[test]
    fn parse_conditional_with_list_branch() {
        let action: Action = serde_json::from_str(
            r#"{
                "type": "condition",
                "condition": { "op": "=",
                               "left": { "type": "variable", "target": "a" },
                               "right": { "type": "value", "value": 1 } },
                "true": { "type": "link", "target": "yes" },
                "false": [ { "type": "dialog", "target": "no" }, { "type": "link", "target": "back" } ]
            }"#,
        )
        .unwrap();
        match action.steps() {
            [SingleAction::Condition { when_true, when_false, .. }] => {
                assert_eq!(when_true.steps().len(), 1);
                assert_eq!(when_false.steps().len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_kinds_survive_parsing() {
        let action: Action =
            serde_json::from_str(r#"{ "type": "teleport", "target": "moon" }"#).unwrap();
        assert_eq!(action.steps(), &[SingleAction::Unknown]);

        let ctx: VariableContext = serde_json::from_str(r#"{ "action": "multiply" }"#).unwrap();
        assert_eq!(ctx.action, VariableOp::Unsupported("multiply".to_string()));
    }

    #[test]
    fn command_pattern_forms() {
        let one: Command = serde_json::from_str(
            r#"{ "command": "k", "action": { "type": "link", "target": "incidents" } }"#,
        )
        .unwrap();
        assert_eq!(one.command.patterns(), &["k".to_string()]);
        assert!(!one.allow_regex);

        let many: Command = serde_json::from_str(
            r#"{ "pattern": ["back", "exit"], "allowRegex": true,
                 "action": { "type": "link", "target": "menu" } }"#,
        )
        .unwrap();
        assert_eq!(many.command.patterns().len(), 2);
        assert!(many.allow_regex);
    }
}
