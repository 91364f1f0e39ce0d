/// Variable store: the single source of truth for narrative state.
///
/// Every mutation is applied in one step and then reported to all
/// subscribers synchronously, so views that depend on a variable never
/// observe a half-applied change.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::schema::document::VariableDecl;
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot {op} non-numeric variable \"{name}\"")]
    InvalidOperand { name: String, op: &'static str },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonEncode(#[from] ron::Error),
}

/// A change notification delivered to subscribers after a mutation.
#[derive(Debug, Clone, Copy)]
pub struct VariableChange<'a> {
    pub name: &'a str,
    pub previous: Option<&'a Value>,
    pub current: Option<&'a Value>,
}

/// Handle returned by [`VariableStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&VariableChange<'_>)>;

/// Flat name -> value export of the store, for external persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, Value>);

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Snapshot, SnapshotError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        Ok(ron::to_string(self)?)
    }

    pub fn from_ron(input: &str) -> Result<Snapshot, SnapshotError> {
        Ok(ron::from_str(input)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Default)]
pub struct VariableStore {
    vars: FxHashMap<String, Value>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("vars", &self.vars)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with each declaration's default value.
    pub fn with_defaults(decls: &[VariableDecl]) -> Self {
        let mut store = Self::new();
        for decl in decls {
            store.vars.insert(decl.id.clone(), decl.default.clone());
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Value of `name`, or `fallback` when it has never been written.
    pub fn get_or(&self, name: &str, fallback: Value) -> Value {
        self.vars.get(name).cloned().unwrap_or(fallback)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// All variables, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        let mut entries: Vec<(&str, &Value)> =
            self.vars.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let previous = self.vars.insert(name.to_string(), value.into());
        self.notify(name, previous);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let previous = self.vars.remove(name);
        if previous.is_some() {
            let removed = previous.clone();
            self.notify(name, removed);
        }
        previous
    }

    /// Remove every variable, notifying once per removed name.
    pub fn clear(&mut self) {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        for name in names {
            self.remove(&name);
        }
    }

    /// Flip a variable in place.
    ///
    /// Booleans invert. An unset variable becomes `true`. Any other value
    /// becomes the negation of its truthiness, so `"abc"` turns into
    /// `false` and `0` into `true`.
    pub fn toggle(&mut self, name: &str) {
        let next = match self.vars.get(name) {
            Some(Value::Bool(b)) => !*b,
            None => true,
            Some(other) => !other.is_truthy(),
        };
        self.set(name, next);
    }

    /// Add `by` to the numeric reading of the variable; unset counts as 0.
    pub fn increment(&mut self, name: &str, by: f64) -> Result<(), StoreError> {
        self.add(name, by, "increment")
    }

    pub fn decrement(&mut self, name: &str, by: f64) -> Result<(), StoreError> {
        self.add(name, -by, "decrement")
    }

    fn add(&mut self, name: &str, by: f64, op: &'static str) -> Result<(), StoreError> {
        let current = match self.vars.get(name) {
            None => 0.0,
            Some(v) => v.to_number().ok_or_else(|| StoreError::InvalidOperand {
                name: name.to_string(),
                op,
            })?,
        };
        self.set(name, current + by);
        Ok(())
    }

    /// Join `value` onto the string reading of the variable.
    pub fn concatenate(&mut self, name: &str, value: &str, prepend: bool) {
        let current = self.vars.get(name).map(Value::to_string).unwrap_or_default();
        let joined = if prepend {
            format!("{}{}", value, current)
        } else {
            format!("{}{}", current, value)
        };
        self.set(name, joined);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Write every snapshot entry into the store. Variables absent from
    /// the snapshot are left untouched.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        for (name, value) in &snapshot.0 {
            self.set(name, value.clone());
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&VariableChange<'_>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn notify(&mut self, name: &str, previous: Option<Value>) {
        let change = VariableChange {
            name,
            previous: previous.as_ref(),
            current: self.vars.get(name),
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unset_reads_as_none_or_fallback() {
        let store = VariableStore::new();
        assert!(store.get("missing").is_none());
        assert_eq!(store.get_or("missing", Value::from(7)), Value::from(7));
    }

    #[test]
    fn toggle_rules() {
        let mut store = VariableStore::new();
        store.toggle("flag");
        assert_eq!(store.get("flag"), Some(&Value::Bool(true)));
        store.toggle("flag");
        assert_eq!(store.get("flag"), Some(&Value::Bool(false)));

        store.set("name", "abc");
        store.toggle("name");
        assert_eq!(store.get("name"), Some(&Value::Bool(false)));

        store.set("zero", 0);
        store.toggle("zero");
        assert_eq!(store.get("zero"), Some(&Value::Bool(true)));
    }

    #[test]
    fn double_toggle_restores_boolean() {
        for start in [true, false] {
            let mut store = VariableStore::new();
            store.set("b", start);
            store.toggle("b");
            store.toggle("b");
            assert_eq!(store.get("b"), Some(&Value::Bool(start)));
        }
    }

    #[test]
    fn increment_then_decrement_restores() {
        let mut store = VariableStore::new();
        store.set("n", 10);
        store.increment("n", 5.0).unwrap();
        assert_eq!(store.get("n"), Some(&Value::Number(15.0)));
        store.decrement("n", 5.0).unwrap();
        assert_eq!(store.get("n"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn increment_coerces_missing_and_numeric_strings() {
        let mut store = VariableStore::new();
        store.increment("fresh", 1.0).unwrap();
        assert_eq!(store.get("fresh"), Some(&Value::Number(1.0)));

        store.set("s", "41");
        store.increment("s", 1.0).unwrap();
        assert_eq!(store.get("s"), Some(&Value::Number(42.0)));
    }

    #[test]
    fn increment_non_numeric_fails_without_change() {
        let mut store = VariableStore::new();
        store.set("word", "hello");
        let err = store.increment("word", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperand { ref name, op: "increment" } if name == "word"));
        assert_eq!(store.get("word"), Some(&Value::from("hello")));
    }

    #[test]
    fn concatenate_prepend_and_append() {
        let mut store = VariableStore::new();
        store.set("v", "Y");
        store.concatenate("v", "X", true);
        assert_eq!(store.get("v"), Some(&Value::from("XY")));

        store.set("v", "Y");
        store.concatenate("v", "X", false);
        assert_eq!(store.get("v"), Some(&Value::from("YX")));

        store.concatenate("fresh", "abc", false);
        assert_eq!(store.get("fresh"), Some(&Value::from("abc")));

        store.set("n", 3);
        store.concatenate("n", "rd", false);
        assert_eq!(store.get("n"), Some(&Value::from("3rd")));
    }

    #[test]
    fn observers_see_every_mutation_after_it_applies() {
        let seen: Rc<RefCell<Vec<(String, Option<Value>, Option<Value>)>>> =
            Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut store = VariableStore::new();
        let id = store.subscribe(move |change| {
            sink.borrow_mut().push((
                change.name.to_string(),
                change.previous.cloned(),
                change.current.cloned(),
            ));
        });

        store.set("a", 1);
        store.increment("a", 2.0).unwrap();
        store.remove("a");
        assert!(store.unsubscribe(id));
        store.set("b", true);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("a".to_string(), None, Some(Value::from(1))));
        assert_eq!(
            seen[1],
            ("a".to_string(), Some(Value::from(1)), Some(Value::from(3)))
        );
        assert_eq!(seen[2], ("a".to_string(), Some(Value::from(3)), None));
    }

    #[test]
    fn snapshot_round_trips_through_json_and_ron() {
        let mut store = VariableStore::new();
        store.set("username", "sonya");
        store.set("counter", 3);
        store.set("repaired", false);

        let snap = store.snapshot();
        let json = snap.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&json).unwrap(), snap);
        let ron_text = snap.to_ron().unwrap();
        assert_eq!(Snapshot::from_ron(&ron_text).unwrap(), snap);

        let mut other = VariableStore::new();
        other.set("untouched", 1);
        other.restore(&snap);
        assert_eq!(other.get("username"), Some(&Value::from("sonya")));
        assert_eq!(other.get("untouched"), Some(&Value::from(1)));
        assert_eq!(other.len(), 4);
    }

    #[test]
    fn clear_empties_store() {
        let mut store = VariableStore::new();
        store.set("a", 1);
        store.set("b", 2);
        store.clear();
        assert!(store.is_empty());
    }
}
