//! Record capabilities.
//!
//! The engine never sees concrete application types. Anything queried as an
//! object implements [`Record`]: it describes itself with a [`RecordType`]
//! (named members, each a field, a `get<Name>` getter or a zero-argument
//! method) and hands out member values by name. Accessor chains are resolved
//! against the `RecordType` once and replayed against every instance.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use crate::error::{Error, Result};
use crate::types::DataType;
use crate::value::Value;

/// How a member is exposed by its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A directly accessible field.
    Field,
    /// A conventionally named zero-argument accessor (`getName`).
    Getter,
    /// Any other zero-argument operation.
    Method,
}

/// A named member of a record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    name: String,
    kind: MemberKind,
    data_type: DataType,
}

impl Member {
    /// Creates a new member description.
    pub fn new(name: impl Into<String>, kind: MemberKind, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind,
            data_type,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// Describes the shape of a record: its name and members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    members: Vec<Member>,
}

impl RecordType {
    /// Creates a record type with no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a field member.
    pub fn with_field(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with_member(Member::new(name, MemberKind::Field, data_type))
    }

    /// Adds a getter member. `name` is the full accessor name, e.g. `getAge`.
    pub fn with_getter(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with_member(Member::new(name, MemberKind::Getter, data_type))
    }

    /// Adds a zero-argument method member.
    pub fn with_method(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with_member(Member::new(name, MemberKind::Method, data_type))
    }

    /// Adds a member, replacing any existing member with the same name.
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.retain(|m| m.name != member.name);
        self.members.push(member);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Returns the member with the given name, of any kind.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Returns the member with the given name and kind.
    pub fn find(&self, kind: MemberKind, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.kind == kind && m.name == name)
    }

    /// Resolves an accessor segment to a member.
    ///
    /// Order: a field named `segment`, then a getter named
    /// `get<Segment>`, then a method named `segment`. First match wins.
    pub fn resolve(&self, segment: &str) -> Option<&Member> {
        self.find(MemberKind::Field, segment)
            .or_else(|| self.find(MemberKind::Getter, &getter_name(segment)))
            .or_else(|| self.find(MemberKind::Method, segment))
    }
}

/// Returns the conventional getter name for a segment: `age` -> `getAge`.
pub fn getter_name(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => {
            let mut name = String::from("get");
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
            name
        }
        None => String::from("get"),
    }
}

/// An object the engine can query.
pub trait Record: fmt::Debug {
    /// Returns the type descriptor for this record.
    fn record_type(&self) -> Rc<RecordType>;

    /// Returns the value of a declared member, by its declared name.
    fn get(&self, member: &str) -> Option<Value>;

    /// Ordering capability. Records that have a natural order return it here.
    fn compare(&self, other: &dyn Record) -> Option<Ordering> {
        let _ = other;
        None
    }

    /// Value equality; defaults to the ordering capability.
    fn equals(&self, other: &dyn Record) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Human-readable form used for string conversion.
    fn text(&self) -> String {
        alloc::format!("{:?}", self)
    }
}

/// A record whose properties can be assigned after construction.
pub trait MutableRecord: Record {
    /// Assigns a property.
    fn set(&mut self, property: &str, value: Value) -> Result<()>;

    /// Finishes construction.
    fn into_record(self: Box<Self>) -> Rc<dyn Record>;
}

/// Creates records for constructor expressions.
pub trait RecordFactory: fmt::Debug {
    /// The type this factory creates.
    fn record_type(&self) -> Rc<RecordType>;

    /// Parameter types of each constructor, in declaration order.
    fn constructors(&self) -> &[Vec<DataType>];

    /// Invokes the constructor at `index` with already-coerced arguments.
    fn construct(&self, index: usize, args: Vec<Value>) -> Result<Box<dyn MutableRecord>>;
}

/// A general-purpose record backed by a member map.
#[derive(Clone, Debug)]
pub struct DynamicRecord {
    record_type: Rc<RecordType>,
    values: BTreeMap<String, Value>,
}

impl DynamicRecord {
    /// Creates a record with every member unset (null).
    pub fn new(record_type: Rc<RecordType>) -> Self {
        Self {
            record_type,
            values: BTreeMap::new(),
        }
    }

    /// Sets a member, builder style. Undeclared members are ignored.
    pub fn with(mut self, member: &str, value: impl Into<Value>) -> Self {
        if self.record_type.member(member).is_some() {
            self.values.insert(member.to_string(), value.into());
        }
        self
    }

    /// Wraps this record into a value.
    pub fn into_value(self) -> Value {
        Value::Object(Rc::new(self))
    }

    fn assign(&mut self, property: &str, value: Value) -> Result<()> {
        let member = self
            .record_type
            .resolve(property)
            .or_else(|| self.record_type.member(property))
            .ok_or_else(|| Error::unresolved_member(property, self.record_type.name()))?;
        let name = member.name().to_string();
        self.values.insert(name, value);
        Ok(())
    }
}

impl Record for DynamicRecord {
    fn record_type(&self) -> Rc<RecordType> {
        self.record_type.clone()
    }

    fn get(&self, member: &str) -> Option<Value> {
        self.record_type.member(member)?;
        Some(self.values.get(member).cloned().unwrap_or(Value::Null))
    }

    fn equals(&self, other: &dyn Record) -> bool {
        let other_type = other.record_type();
        if other_type.name() != self.record_type.name() {
            return false;
        }
        self.record_type
            .members()
            .iter()
            .all(|m| self.get(m.name()) == other.get(m.name()))
    }

    fn text(&self) -> String {
        let parts: Vec<String> = self
            .record_type
            .members()
            .iter()
            .map(|m| {
                let v = self.values.get(m.name()).cloned().unwrap_or(Value::Null);
                alloc::format!("{}={}", m.name(), v.to_text())
            })
            .collect();
        alloc::format!("{}{{{}}}", self.record_type.name(), parts.join(", "))
    }
}

impl MutableRecord for DynamicRecord {
    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        self.assign(property, value)
    }

    fn into_record(self: Box<Self>) -> Rc<dyn Record> {
        Rc::new(*self)
    }
}

/// Factory producing [`DynamicRecord`]s. Each constructor assigns its
/// arguments, in order, to a list of members.
#[derive(Clone, Debug)]
pub struct DynamicRecordFactory {
    record_type: Rc<RecordType>,
    signatures: Vec<Vec<DataType>>,
    assignments: Vec<Vec<String>>,
}

impl DynamicRecordFactory {
    /// Creates a factory with a single no-argument constructor.
    pub fn new(record_type: Rc<RecordType>) -> Self {
        Self {
            record_type,
            signatures: alloc::vec![Vec::new()],
            assignments: alloc::vec![Vec::new()],
        }
    }

    /// Adds a constructor assigning its arguments to `members`.
    /// Parameter types are the members' declared types.
    pub fn with_constructor(mut self, members: &[&str]) -> Result<Self> {
        let mut signature = Vec::with_capacity(members.len());
        for name in members {
            let member = self
                .record_type
                .member(name)
                .ok_or_else(|| Error::unresolved_member(*name, self.record_type.name()))?;
            signature.push(member.data_type().clone());
        }
        self.signatures.push(signature);
        self.assignments
            .push(members.iter().map(|m| m.to_string()).collect());
        Ok(self)
    }
}

impl RecordFactory for DynamicRecordFactory {
    fn record_type(&self) -> Rc<RecordType> {
        self.record_type.clone()
    }

    fn constructors(&self) -> &[Vec<DataType>] {
        &self.signatures
    }

    fn construct(&self, index: usize, args: Vec<Value>) -> Result<Box<dyn MutableRecord>> {
        let members = self.assignments.get(index).ok_or_else(|| {
            Error::construction(self.record_type.name(), "no such constructor")
        })?;
        if members.len() != args.len() {
            return Err(Error::construction(
                self.record_type.name(),
                alloc::format!("expected {} arguments, got {}", members.len(), args.len()),
            ));
        }
        let mut record = DynamicRecord::new(self.record_type.clone());
        for (member, value) in members.iter().zip(args) {
            record.values.insert(member.clone(), value);
        }
        Ok(Box::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_type() -> Rc<RecordType> {
        Rc::new(
            RecordType::new("Person")
                .with_field("name", DataType::String)
                .with_getter("getAge", DataType::Int64)
                .with_method("age", DataType::String)
                .with_method("describe", DataType::String),
        )
    }

    #[test]
    fn test_getter_name() {
        assert_eq!(getter_name("age"), "getAge");
        assert_eq!(getter_name("x"), "getX");
        assert_eq!(getter_name(""), "get");
    }

    #[test]
    fn test_resolution_order() {
        let t = person_type();
        assert_eq!(t.resolve("name").map(|m| m.kind()), Some(MemberKind::Field));
        // getter wins over a method with the literal segment name
        let age = t.resolve("age").unwrap();
        assert_eq!(age.kind(), MemberKind::Getter);
        assert_eq!(age.name(), "getAge");
        assert_eq!(t.resolve("describe").map(|m| m.kind()), Some(MemberKind::Method));
        assert!(t.resolve("missing").is_none());
    }

    #[test]
    fn test_dynamic_record() {
        let r = DynamicRecord::new(person_type())
            .with("name", "Ann")
            .with("getAge", 31i64)
            .with("undeclared", 1i64);
        assert_eq!(r.get("name"), Some(Value::from("Ann")));
        assert_eq!(r.get("getAge"), Some(Value::Int64(31)));
        assert_eq!(r.get("describe"), Some(Value::Null));
        assert_eq!(r.get("undeclared"), None);
        assert_eq!(r.text(), "Person{name=Ann, getAge=31, age=null, describe=null}");
    }

    #[test]
    fn test_dynamic_record_equality() {
        let a = DynamicRecord::new(person_type()).with("name", "Ann").into_value();
        let b = DynamicRecord::new(person_type()).with("name", "Ann").into_value();
        let c = DynamicRecord::new(person_type()).with("name", "Bob").into_value();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_factory_construct_and_set() {
        let factory = DynamicRecordFactory::new(person_type())
            .with_constructor(&["name"])
            .unwrap();
        assert_eq!(factory.constructors().len(), 2);
        assert_eq!(factory.constructors()[1], alloc::vec![DataType::String]);

        let mut record = factory.construct(1, alloc::vec![Value::from("Ann")]).unwrap();
        record.set("age", Value::Int64(3)).unwrap();
        assert!(record.set("nope", Value::Null).is_err());
        let record = record.into_record();
        assert_eq!(record.get("getAge"), Some(Value::Int64(3)));
        assert_eq!(record.get("name"), Some(Value::from("Ann")));
    }

    #[test]
    fn test_factory_rejects_unknown_member() {
        let err = DynamicRecordFactory::new(person_type()).with_constructor(&["nope"]);
        assert!(err.is_err());
    }
}
