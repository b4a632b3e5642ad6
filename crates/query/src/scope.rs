//! Bind variables, save values and change notification.
//!
//! Every query owns a [`Scope`]. A scope created for a sub-query is linked to
//! its enclosing query's scope and from then on reads and writes go to the
//! top-most ancestor's [`VariableStore`]. The link is a `Weak` handle: a child
//! never keeps its ancestors alive.

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use hashbrown::HashMap;
use objql_core::Value;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback = Rc<dyn Fn(&VariableChange)>;

/// Names with a built-in meaning.
pub const RESERVED_NAMES: [&str; 6] = ["_query", "_currobj", "_allobjs", "_parent", "_grpby", "_grpbys"];

/// Returns true if `name` is reserved, ignoring case.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Variable names are case-insensitive.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Private name given to the `index`-th anonymous bind variable (1-based).
pub fn anonymous_name(index: usize) -> String {
    alloc::format!("?{}", index)
}

/// Which map a variable lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Caller-supplied bind variable.
    Bind,
    /// Engine-computed save value.
    Save,
}

/// A change notification.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableChange {
    pub kind: VariableKind,
    pub name: String,
    pub old: Value,
    pub new: Value,
}

struct Subscription {
    kind: VariableKind,
    callback: ChangeCallback,
}

/// The maps owned by a top-level query.
#[derive(Default)]
pub struct VariableStore {
    binds: BTreeMap<String, Value>,
    saves: BTreeMap<String, Value>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_id: SubscriptionId,
    anonymous: usize,
}

impl VariableStore {
    fn map(&self, kind: VariableKind) -> &BTreeMap<String, Value> {
        match kind {
            VariableKind::Bind => &self.binds,
            VariableKind::Save => &self.saves,
        }
    }

    fn map_mut(&mut self, kind: VariableKind) -> &mut BTreeMap<String, Value> {
        match kind {
            VariableKind::Bind => &mut self.binds,
            VariableKind::Save => &mut self.saves,
        }
    }

    fn subscribe(&mut self, kind: VariableKind, callback: ChangeCallback) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        self.subscriptions.insert(id, Subscription { kind, callback });
        id
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    fn callbacks(&self, kind: VariableKind) -> Vec<ChangeCallback> {
        self.subscriptions
            .values()
            .filter(|s| s.kind == kind)
            .map(|s| s.callback.clone())
            .collect()
    }
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("binds", &self.binds)
            .field("saves", &self.saves)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Handle on the variable store a query reads and writes.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    own: Rc<RefCell<VariableStore>>,
    parent: Option<Weak<RefCell<VariableStore>>>,
}

impl Scope {
    /// Creates a scope that owns a fresh store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegates this scope to `parent`'s top-most store.
    pub fn link_parent(&mut self, parent: &Scope) {
        self.parent = Some(Rc::downgrade(&parent.root()));
    }

    /// Returns true if this scope delegates to an ancestor.
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// The store all operations act on: the top-most live ancestor's, or
    /// this scope's own.
    fn root(&self) -> Rc<RefCell<VariableStore>> {
        // `link_parent` already points at the ancestor's root
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .unwrap_or_else(|| self.own.clone())
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<VariableStore>> {
        Rc::downgrade(&self.root())
    }

    /// Returns the next anonymous bind variable position.
    pub(crate) fn next_anonymous(&self) -> usize {
        let root = self.root();
        let mut store = root.borrow_mut();
        store.anonymous += 1;
        store.anonymous
    }

    fn get(&self, kind: VariableKind, name: &str) -> Option<Value> {
        self.root().borrow().map(kind).get(&normalize(name)).cloned()
    }

    fn set(&self, kind: VariableKind, name: &str, value: Value) {
        let root = self.root();
        let name = normalize(name);
        let (old, callbacks) = {
            let mut store = root.borrow_mut();
            let old = store
                .map_mut(kind)
                .insert(name.clone(), value.clone())
                .unwrap_or(Value::Null);
            if old == value {
                return;
            }
            (old, store.callbacks(kind))
        };
        let change = VariableChange {
            kind,
            name,
            old,
            new: value,
        };
        for callback in callbacks {
            callback(&change);
        }
    }

    /// Returns a bind variable, `Null` if unset.
    pub fn variable(&self, name: &str) -> Value {
        self.get(VariableKind::Bind, name).unwrap_or(Value::Null)
    }

    /// Returns true if a bind variable has been set.
    pub fn has_variable(&self, name: &str) -> bool {
        self.get(VariableKind::Bind, name).is_some()
    }

    /// Sets a bind variable and notifies subscribers if its value changed.
    pub fn set_variable(&self, name: &str, value: Value) {
        self.set(VariableKind::Bind, name, value);
    }

    /// Snapshot of all bind variables.
    pub fn variables(&self) -> BTreeMap<String, Value> {
        self.root().borrow().binds.clone()
    }

    /// Returns a save value.
    pub fn save_value(&self, name: &str) -> Option<Value> {
        self.get(VariableKind::Save, name)
    }

    /// Sets a save value and notifies subscribers if its value changed.
    pub fn set_save_value(&self, name: &str, value: Value) {
        self.set(VariableKind::Save, name, value);
    }

    /// Snapshot of all save values.
    pub fn save_values(&self) -> BTreeMap<String, Value> {
        self.root().borrow().saves.clone()
    }

    /// Replaces every save value, notifying for each name whose value changed.
    pub fn replace_save_values(&self, values: BTreeMap<String, Value>) {
        let root = self.root();
        let (changes, callbacks) = {
            let mut store = root.borrow_mut();
            let previous = core::mem::replace(&mut store.saves, values);
            let mut changes = Vec::new();
            for (name, old) in &previous {
                let new = store.saves.get(name).cloned().unwrap_or(Value::Null);
                if *old != new {
                    changes.push(VariableChange {
                        kind: VariableKind::Save,
                        name: name.clone(),
                        old: old.clone(),
                        new,
                    });
                }
            }
            for (name, new) in &store.saves {
                if !previous.contains_key(name) && !new.is_null() {
                    changes.push(VariableChange {
                        kind: VariableKind::Save,
                        name: name.clone(),
                        old: Value::Null,
                        new: new.clone(),
                    });
                }
            }
            let callbacks = if changes.is_empty() {
                Vec::new()
            } else {
                store.callbacks(VariableKind::Save)
            };
            (changes, callbacks)
        };
        for change in &changes {
            for callback in &callbacks {
                callback(change);
            }
        }
    }

    /// Subscribes to changes of one kind of variable.
    pub fn subscribe<F>(&self, kind: VariableKind, callback: F) -> SubscriptionId
    where
        F: Fn(&VariableChange) + 'static,
    {
        self.root().borrow_mut().subscribe(kind, Rc::new(callback))
    }

    /// Unsubscribes by ID. Returns true if the subscription was found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.root().borrow_mut().unsubscribe(id)
    }

    /// Number of live subscriptions on the store.
    pub fn listener_count(&self) -> usize {
        self.root().borrow().subscriptions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn test_case_insensitive_variables() {
        let scope = Scope::new();
        scope.set_variable("Limit", Value::Int64(3));
        assert_eq!(scope.variable("LIMIT"), Value::Int64(3));
        assert!(scope.has_variable("limit"));
        assert_eq!(scope.variable("other"), Value::Null);
        assert!(!scope.has_variable("other"));
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("_currobj"));
        assert!(is_reserved("_CurrObj"));
        assert!(is_reserved("_grpbys"));
        assert!(!is_reserved("_custom"));
        assert!(!is_reserved("currobj"));
        assert_eq!(anonymous_name(2), "?2");
    }

    #[test]
    fn test_child_delegates_to_root() {
        let parent = Scope::new();
        let mut middle = Scope::new();
        middle.link_parent(&parent);
        let mut child = Scope::new();
        child.link_parent(&middle);

        child.set_variable("x", Value::Int64(1));
        child.set_save_value("avg", Value::Float64(2.5));
        assert_eq!(parent.variable("x"), Value::Int64(1));
        assert_eq!(parent.save_value("AVG"), Some(Value::Float64(2.5)));
        assert!(child.is_child());
        assert!(!parent.is_child());
    }

    #[test]
    fn test_child_outliving_parent_uses_own_store() {
        let mut child = Scope::new();
        {
            let parent = Scope::new();
            child.link_parent(&parent);
        }
        child.set_variable("x", Value::Int64(9));
        assert_eq!(child.variable("x"), Value::Int64(9));
    }

    #[test]
    fn test_notifications() {
        let scope = Scope::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let id = scope.subscribe(VariableKind::Bind, move |c| {
            seen_clone.borrow_mut().push(c.clone());
        });

        scope.set_variable("a", Value::Int64(1));
        scope.set_variable("a", Value::Int64(1)); // unchanged
        scope.set_variable("A", Value::Int64(2));
        scope.set_save_value("s", Value::Int64(5)); // other kind

        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[1].name, "a");
            assert_eq!(seen[1].old, Value::Int64(1));
            assert_eq!(seen[1].new, Value::Int64(2));
        }

        assert!(scope.unsubscribe(id));
        assert!(!scope.unsubscribe(id));
        scope.set_variable("a", Value::Int64(3));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_listener_may_read_store() {
        let scope = Scope::new();
        let reader = scope.clone();
        let observed = Rc::new(Cell::new(0i64));
        let observed_clone = observed.clone();
        scope.subscribe(VariableKind::Save, move |c| {
            if let Some(Value::Int64(i)) = reader.save_value(&c.name) {
                observed_clone.set(i);
            }
        });
        scope.set_save_value("n", Value::Int64(4));
        assert_eq!(observed.get(), 4);
    }

    #[test]
    fn test_replace_save_values_notifies_diff() {
        let scope = Scope::new();
        scope.set_save_value("a", Value::Int64(1));
        scope.set_save_value("b", Value::Int64(2));

        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        scope.subscribe(VariableKind::Save, move |_| count_clone.set(count_clone.get() + 1));

        let mut next = BTreeMap::new();
        next.insert(String::from("a"), Value::Int64(1));
        next.insert(String::from("c"), Value::Int64(3));
        scope.replace_save_values(next);

        // b removed, c added
        assert_eq!(count.get(), 2);
        assert_eq!(scope.save_value("b"), None);
        assert_eq!(scope.save_value("c"), Some(Value::Int64(3)));
    }

    #[test]
    fn test_anonymous_counter_shared_with_root() {
        let parent = Scope::new();
        let mut child = Scope::new();
        child.link_parent(&parent);
        assert_eq!(parent.next_anonymous(), 1);
        assert_eq!(child.next_anonymous(), 2);
    }
}
