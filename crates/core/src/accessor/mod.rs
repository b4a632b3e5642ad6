//! Path accessors.
//!
//! An [`Accessor`] turns a dotted/bracketed path such as `address.city` or
//! `items[0].tags['x']` into a chain of [`Step`]s resolved against a
//! [`DataType`], then replays that chain against any value of the same shape.
//!
//! Resolution happens once. Each member step is bound to the record type it
//! was resolved against; when a later instance carries a different record
//! type the step is re-resolved against the runtime type and the rebound
//! step replaces the old one.

mod parser;

pub use parser::{AccessorPath, Segment};

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::error::{Error, Result};
use crate::record::RecordType;
use crate::registry::TypeRegistry;
use crate::types::DataType;
use crate::value::Value;

/// One resolved step of an accessor chain.
#[derive(Clone, Debug)]
pub enum Step {
    /// A record member bound to the record type it was resolved against.
    Member {
        owner: Rc<RecordType>,
        segment: String,
        member: String,
    },
    /// A dotted name applied to a map: key lookup by the name.
    Entry(String),
    /// `[n]`: list position, or numeric key of a map.
    Index(i64),
    /// `['k']`: map key.
    Key(String),
    /// A dotted name whose owner is not known until run time.
    Deferred(String),
}

impl Step {
    fn segment_text(&self) -> String {
        match self {
            Step::Member { segment, .. } | Step::Entry(segment) | Step::Deferred(segment) => {
                segment.clone()
            }
            Step::Index(i) => alloc::format!("[{}]", i),
            Step::Key(k) => alloc::format!("['{}']", k),
        }
    }
}

/// A resolved path accessor.
#[derive(Debug)]
pub struct Accessor {
    path: AccessorPath,
    root_type: DataType,
    result_type: DataType,
    steps: RefCell<Vec<Step>>,
}

impl Clone for Accessor {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            root_type: self.root_type.clone(),
            result_type: self.result_type.clone(),
            steps: RefCell::new(self.steps.borrow().clone()),
        }
    }
}

impl Accessor {
    /// Resolves `path` against `root`.
    ///
    /// Record types are looked up in `registry`; a record type the registry
    /// doesn't know, like `Any`, defers member resolution to the first
    /// instance seen at run time.
    pub fn resolve(path: &AccessorPath, root: &DataType, registry: &TypeRegistry) -> Result<Self> {
        let mut steps = Vec::with_capacity(path.segments().len());
        let mut current = root.clone();

        for segment in path.segments() {
            let (step, next) = match segment {
                Segment::Name(name) => resolve_name(name, &current, registry)?,
                Segment::Index(i) => {
                    check_container(path, segment, &current, true)?;
                    (Step::Index(*i), DataType::Any)
                }
                Segment::Key(k) => {
                    check_container(path, segment, &current, false)?;
                    (Step::Key(k.clone()), DataType::Any)
                }
            };
            steps.push(step);
            current = next;
        }

        Ok(Self {
            path: path.clone(),
            root_type: root.clone(),
            result_type: current,
            steps: RefCell::new(steps),
        })
    }

    /// Parses and resolves a path in one go.
    pub fn parse(text: &str, root: &DataType, registry: &TypeRegistry) -> Result<Self> {
        Self::resolve(&AccessorPath::parse(text)?, root, registry)
    }

    /// An accessor that resolves everything at run time.
    pub fn unbound(path: &AccessorPath) -> Result<Self> {
        Self::resolve(path, &DataType::Any, &TypeRegistry::new())
    }

    #[inline]
    pub fn path(&self) -> &AccessorPath {
        &self.path
    }

    #[inline]
    pub fn root_type(&self) -> &DataType {
        &self.root_type
    }

    /// Declared type of the final step, `Any` when it is only known at run time.
    #[inline]
    pub fn result_type(&self) -> &DataType {
        &self.result_type
    }

    /// Number of steps in the chain.
    pub fn len(&self) -> usize {
        self.steps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.borrow().is_empty()
    }

    /// Replays the chain against `value`.
    ///
    /// Stops with `Null` as soon as a step yields null or an index falls out
    /// of range.
    pub fn get(&self, value: &Value) -> Result<Value> {
        let mut steps = self.steps.borrow_mut();
        let mut current: Option<Value> = None;
        for step in steps.iter_mut() {
            let next = {
                let input = current.as_ref().unwrap_or(value);
                if input.is_null() {
                    return Ok(Value::Null);
                }
                apply(step, input, &self.path)?
            };
            current = Some(next);
        }
        Ok(current.unwrap_or_else(|| value.clone()))
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

fn resolve_name(name: &str, current: &DataType, registry: &TypeRegistry) -> Result<(Step, DataType)> {
    match current {
        DataType::Record(type_name) => match registry.get(type_name) {
            Some(rt) => {
                let member = rt
                    .resolve(name)
                    .ok_or_else(|| Error::unresolved_member(name, type_name.as_str()))?;
                let next = member.data_type().clone();
                Ok((
                    Step::Member {
                        owner: rt.clone(),
                        segment: name.to_string(),
                        member: member.name().to_string(),
                    },
                    next,
                ))
            }
            None => Ok((Step::Deferred(name.to_string()), DataType::Any)),
        },
        DataType::Map => Ok((Step::Entry(name.to_string()), DataType::Any)),
        DataType::Any => Ok((Step::Deferred(name.to_string()), DataType::Any)),
        other => Err(Error::unresolved_member(name, other.to_string())),
    }
}

fn check_container(path: &AccessorPath, segment: &Segment, current: &DataType, numeric: bool) -> Result<()> {
    let legal = match current {
        DataType::Any | DataType::Map => true,
        DataType::List => numeric,
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(Error::invalid_index(
            path.text(),
            segment.to_string(),
            current.to_string(),
        ))
    }
}

fn type_label(value: &Value) -> String {
    value
        .data_type()
        .map(|t| t.to_string())
        .unwrap_or_else(|| String::from("null"))
}

fn bind_member(rt: Rc<RecordType>, segment: &str) -> Result<Step> {
    let member = rt
        .resolve(segment)
        .ok_or_else(|| Error::unresolved_member(segment, rt.name()))?
        .name()
        .to_string();
    Ok(Step::Member {
        owner: rt,
        segment: segment.to_string(),
        member,
    })
}

fn apply(step: &mut Step, input: &Value, path: &AccessorPath) -> Result<Value> {
    // Rebind member steps against the runtime record type when it differs
    if let Value::Object(record) = input {
        let rebind = match step {
            Step::Member { owner, .. } => owner.name() != record.record_type().name(),
            Step::Deferred(_) => true,
            _ => false,
        };
        if rebind {
            let segment = step.segment_text();
            *step = bind_member(record.record_type(), &segment)?;
        }
    }

    match (&*step, input) {
        (Step::Member { member, .. }, Value::Object(record)) => {
            Ok(record.get(member).unwrap_or(Value::Null))
        }
        (Step::Entry(name) | Step::Deferred(name), Value::Map(entries)) => Ok(entries
            .get(&Value::String(name.clone()))
            .cloned()
            .unwrap_or(Value::Null)),
        (Step::Index(i), Value::List(items)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Step::Index(i), Value::Map(entries)) => Ok(entries
            .get(&Value::Int64(*i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Step::Key(k), Value::Map(entries)) => Ok(entries
            .get(&Value::String(k.clone()))
            .cloned()
            .unwrap_or(Value::Null)),
        (step, other) => Err(Error::accessor_mismatch(
            alloc::format!("{} at {}", path.text(), step.segment_text()),
            type_label(other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DynamicRecord;
    use alloc::collections::BTreeMap;
    use alloc::vec;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_type(Rc::new(
            RecordType::new("Address")
                .with_field("city", DataType::String)
                .with_field("lines", DataType::List),
        ));
        registry.register_type(Rc::new(
            RecordType::new("Person")
                .with_field("name", DataType::String)
                .with_getter("getAge", DataType::Int64)
                .with_field("address", DataType::record("Address"))
                .with_field("props", DataType::Map),
        ));
        registry
    }

    fn person(registry: &TypeRegistry) -> Value {
        let address = DynamicRecord::new(registry.get("Address").unwrap().clone())
            .with("city", "Oslo")
            .with("lines", Value::List(vec!["a".into(), "b".into()]))
            .into_value();
        let mut props = BTreeMap::new();
        props.insert(Value::from("color"), Value::from("red"));
        props.insert(Value::Int64(7), Value::from("seven"));
        DynamicRecord::new(registry.get("Person").unwrap().clone())
            .with("name", "Ann")
            .with("getAge", 31i64)
            .with("address", address)
            .with("props", Value::Map(props))
            .into_value()
    }

    #[test]
    fn test_resolve_members_and_types() {
        let registry = registry();
        let root = DataType::record("Person");
        let a = Accessor::parse("age", &root, &registry).unwrap();
        assert_eq!(a.result_type(), &DataType::Int64);
        assert_eq!(a.get(&person(&registry)).unwrap(), Value::Int64(31));

        let a = Accessor::parse("address.city", &root, &registry).unwrap();
        assert_eq!(a.result_type(), &DataType::String);
        assert_eq!(a.get(&person(&registry)).unwrap(), Value::from("Oslo"));
    }

    #[test]
    fn test_brackets() {
        let registry = registry();
        let root = DataType::record("Person");
        let p = person(&registry);
        let a = Accessor::parse("address.lines[1]", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::from("b"));
        let a = Accessor::parse("address.lines[5]", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::Null);
        let a = Accessor::parse("address.lines[-1]", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::Null);
        let a = Accessor::parse("props['color']", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::from("red"));
        let a = Accessor::parse("props[7]", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::from("seven"));
        let a = Accessor::parse("props.color", &root, &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::from("red"));
    }

    #[test]
    fn test_resolution_errors() {
        let registry = registry();
        let root = DataType::record("Person");
        let err = Accessor::parse("missing", &root, &registry).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMember { .. }));
        assert!(err.is_resolution());

        // brackets after a non-container
        let err = Accessor::parse("name[0]", &root, &registry).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { .. }));
        // string key into a list
        let err = Accessor::parse("address.lines['x']", &root, &registry).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { .. }));
        // member of a primitive
        let err = Accessor::parse("name.length", &root, &registry).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMember { .. }));
    }

    #[test]
    fn test_null_short_circuit() {
        let registry = registry();
        let p = DynamicRecord::new(registry.get("Person").unwrap().clone()).into_value();
        let a = Accessor::parse("address.city", &DataType::record("Person"), &registry).unwrap();
        assert_eq!(a.get(&p).unwrap(), Value::Null);
        assert_eq!(a.get(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_deferred_and_rebind() {
        let registry = registry();
        let a = Accessor::unbound(&AccessorPath::parse("city").unwrap()).unwrap();
        assert_eq!(a.result_type(), &DataType::Any);
        let addr = DynamicRecord::new(registry.get("Address").unwrap().clone())
            .with("city", "Rome")
            .into_value();
        assert_eq!(a.get(&addr).unwrap(), Value::from("Rome"));

        // Same accessor against a different type that also has `city`
        let other = Rc::new(RecordType::new("Office").with_getter("getCity", DataType::String));
        let office = DynamicRecord::new(other).with("getCity", "Paris").into_value();
        assert_eq!(a.get(&office).unwrap(), Value::from("Paris"));

        // And against a type without it
        let plain = Rc::new(RecordType::new("Plain"));
        let err = a.get(&DynamicRecord::new(plain).into_value()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMember { .. }));
    }

    #[test]
    fn test_runtime_mismatch() {
        let a = Accessor::unbound(&AccessorPath::parse("x['k']").unwrap()).unwrap();
        let mut m = BTreeMap::new();
        m.insert(Value::from("x"), Value::List(vec![Value::Int64(1)]));
        let err = a.get(&Value::Map(m)).unwrap_err();
        assert!(matches!(err, Error::AccessorMismatch { .. }));
        assert!(!err.is_resolution());

        let a = Accessor::unbound(&AccessorPath::parse("len").unwrap()).unwrap();
        assert!(a.get(&Value::from("text")).is_err());
    }
}
