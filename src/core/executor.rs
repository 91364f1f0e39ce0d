/// Action executor: runs action chains against the variable store.
///
/// Navigation and dialogs are not performed here. They come back as
/// [`Signal`]s once the whole chain has run, so every mutation in the
/// chain is visible to whatever screen the host shows next.

use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::eval::evaluate_condition;
use crate::core::rule::{self, RuleError};
use crate::core::store::{StoreError, VariableStore};
use crate::schema::action::{Action, SingleAction, VariableContext, VariableOp};
use crate::schema::content::ToggleState;
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("unknown action kind: {0}")]
    UnknownAction(String),
}

/// Where control should go after a chain completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Navigate(String),
    Dialog(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ToggleSlot {
    active: usize,
    len: usize,
}

/// Active state index of every toggle item, keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct ToggleBoard {
    slots: FxHashMap<String, ToggleSlot>,
}

impl ToggleBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a toggle. The first state flagged `active` starts
    /// selected, else the first state.
    pub fn register(&mut self, id: &str, states: &[ToggleState]) {
        let active = states.iter().position(|s| s.active).unwrap_or(0);
        self.slots.insert(
            id.to_string(),
            ToggleSlot {
                active,
                len: states.len(),
            },
        );
    }

    pub fn from_toggles<'a>(toggles: impl IntoIterator<Item = (&'a str, &'a [ToggleState])>) -> Self {
        let mut board = Self::new();
        for (id, states) in toggles {
            board.register(id, states);
        }
        board
    }

    pub fn active(&self, id: &str) -> Option<usize> {
        self.slots.get(id).map(|s| s.active)
    }

    /// Advance to the next state, wrapping to the first. Returns the new
    /// index, or `None` for an unknown id.
    pub fn flip(&mut self, id: &str) -> Option<usize> {
        let slot = self.slots.get_mut(id)?;
        if slot.len > 0 {
            slot.active = (slot.active + 1) % slot.len;
        }
        Some(slot.active)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }
}

/// Mutable state an action chain runs against.
pub struct ExecutionContext<'a> {
    pub store: &'a mut VariableStore,
    pub toggles: &'a mut ToggleBoard,
    pub rng: &'a mut StdRng,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(store: &'a mut VariableStore, toggles: &'a mut ToggleBoard, rng: &'a mut StdRng) -> Self {
        Self { store, toggles, rng }
    }

    /// Run an action chain. `last_command` is the raw input that
    /// triggered it, used by `set` and `concatenate` without a value.
    ///
    /// On error the remaining steps are skipped and no signals are
    /// returned. Mutations already applied stay applied.
    pub fn apply(
        &mut self,
        action: &Action,
        last_command: Option<&str>,
    ) -> Result<Vec<Signal>, ActionError> {
        let mut signals = Vec::new();
        self.run(action, last_command, &mut signals)?;
        Ok(signals)
    }

    fn run(
        &mut self,
        action: &Action,
        last_command: Option<&str>,
        signals: &mut Vec<Signal>,
    ) -> Result<(), ActionError> {
        for step in action.steps() {
            self.step(step, last_command, signals)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        step: &SingleAction,
        last_command: Option<&str>,
        signals: &mut Vec<Signal>,
    ) -> Result<(), ActionError> {
        match step {
            SingleAction::Link { target, .. } => {
                debug!(id = %target, "link");
                signals.push(Signal::Navigate(target.clone()));
            }
            SingleAction::Dialog { target } => {
                debug!(id = %target, "dialog");
                signals.push(Signal::Dialog(target.clone()));
            }
            SingleAction::Toggle { target } => match self.toggles.flip(target) {
                Some(index) => debug!(id = %target, index, "toggle flipped"),
                None => warn!(id = %target, "toggle action names an unknown toggle"),
            },
            SingleAction::Variable { target, context } => {
                self.apply_variable(target, context, last_command)?;
            }
            SingleAction::Condition {
                condition,
                when_true,
                when_false,
            } => {
                let outcome = evaluate_condition(&*self.store, condition);
                debug!(outcome, "condition");
                let branch = if outcome { when_true } else { when_false };
                self.run(branch, last_command, signals)?;
            }
            SingleAction::Unknown => {
                return Err(ActionError::UnknownAction("unrecognized action type".to_string()));
            }
        }
        Ok(())
    }

    /// Apply one variable mutation.
    pub fn apply_variable(
        &mut self,
        target: &str,
        context: &VariableContext,
        last_command: Option<&str>,
    ) -> Result<(), ActionError> {
        debug!(id = %target, op = ?context.action, "variable");
        match &context.action {
            VariableOp::Set => {
                let value = match (&context.value, &context.rule) {
                    (Some(value), _) => value.clone(),
                    (None, Some(rule)) => rule::generate(rule, &mut *self.rng)?,
                    (None, None) => Value::from(last_command.unwrap_or_default()),
                };
                self.store.set(target, value);
            }
            VariableOp::Toggle => self.store.toggle(target),
            VariableOp::Increment => self.store.increment(target, step_amount(context))?,
            VariableOp::Decrement => self.store.decrement(target, step_amount(context))?,
            VariableOp::Concatenate => {
                let value = match &context.value {
                    Some(value) => value.to_string(),
                    None => last_command.unwrap_or_default().to_string(),
                };
                let prepend = matches!(context.rule.as_deref(), Some("pre" | "prepend"));
                self.store.concatenate(target, &value, prepend);
            }
            VariableOp::Unsupported(kind) => {
                return Err(ActionError::UnknownAction(kind.clone()));
            }
        }
        Ok(())
    }
}

/// Increment/decrement amount: a numeric `value`, else 1.
fn step_amount(context: &VariableContext) -> f64 {
    match context.value {
        Some(Value::Number(n)) => n,
        _ => 1.0,
    }
}
