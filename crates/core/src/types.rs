//! Data type definitions for ObjQL.
//!
//! Types describe what an expression or record member is expected to produce.
//! They drive static accessor resolution and function overload scoring; the
//! engine never requires a value to carry more than its runtime variant.

use alloc::string::String;
use core::fmt;

use crate::value::Value;

/// Types known to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// The universal unknown type; resolution is deferred to run time.
    #[default]
    Any,
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
    /// Ordered sequence of values
    List,
    /// Associative container
    Map,
    /// A record type, identified by its registered name
    Record(String),
}

impl DataType {
    /// Returns the type of a runtime value. `Null` has no type and maps to `Any`.
    pub fn of(value: &Value) -> DataType {
        value.data_type().unwrap_or(DataType::Any)
    }

    /// Creates a record type reference.
    pub fn record(name: impl Into<String>) -> Self {
        DataType::Record(name.into())
    }

    /// Returns whether this is the universal unknown type.
    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, DataType::Any)
    }

    /// Returns whether values of this type are numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns whether this type is a primitive scalar (boolean or number).
    pub fn is_primitive(&self) -> bool {
        matches!(self, DataType::Boolean) || self.is_numeric()
    }

    /// Returns whether this type supports bracketed index/key lookups.
    pub fn is_container(&self) -> bool {
        matches!(self, DataType::List | DataType::Map)
    }

    /// Returns whether a value of `other` can be passed where `self` is declared.
    pub fn is_assignable_from(&self, other: &DataType) -> bool {
        self.is_any() || self == other
    }

    /// Returns the record type name, if this is a record type.
    pub fn record_name(&self) -> Option<&str> {
        match self {
            DataType::Record(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Any => f.write_str("Any"),
            DataType::Boolean => f.write_str("Boolean"),
            DataType::Int32 => f.write_str("Int32"),
            DataType::Int64 => f.write_str("Int64"),
            DataType::Float64 => f.write_str("Float64"),
            DataType::String => f.write_str("String"),
            DataType::DateTime => f.write_str("DateTime"),
            DataType::Bytes => f.write_str("Bytes"),
            DataType::List => f.write_str("List"),
            DataType::Map => f.write_str("Map"),
            DataType::Record(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int32, DataType::Int32);
        assert_ne!(DataType::Int32, DataType::Int64);
        assert_eq!(DataType::record("Person"), DataType::Record("Person".into()));
    }

    #[test]
    fn test_numeric_and_primitive() {
        assert!(DataType::Int32.is_numeric());
        assert!(DataType::Float64.is_numeric());
        assert!(!DataType::String.is_numeric());
        assert!(DataType::Boolean.is_primitive());
        assert!(!DataType::Boolean.is_numeric());
        assert!(!DataType::String.is_primitive());
    }

    #[test]
    fn test_assignable() {
        assert!(DataType::Any.is_assignable_from(&DataType::String));
        assert!(DataType::String.is_assignable_from(&DataType::String));
        assert!(!DataType::Int64.is_assignable_from(&DataType::Int32));
        assert!(!DataType::String.is_assignable_from(&DataType::Any));
    }

    #[test]
    fn test_of_value() {
        assert_eq!(DataType::of(&Value::Null), DataType::Any);
        assert_eq!(DataType::of(&Value::Float64(1.0)), DataType::Float64);
        assert_eq!(DataType::of(&Value::List(alloc::vec![])), DataType::List);
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Int64.to_string(), "Int64");
        assert_eq!(DataType::record("Person").to_string(), "Person");
    }
}
