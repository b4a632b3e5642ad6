//! Value type definitions for ObjQL.
//!
//! This module defines the `Value` enum which represents anything a record
//! member, an expression or a query result can produce.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::record::Record;
use crate::types::DataType;

/// A dynamically typed value.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime stored as Unix timestamp in milliseconds
    DateTime(i64),
    /// Binary data
    Bytes(Vec<u8>),
    /// Ordered sequence
    List(Vec<Value>),
    /// Associative container
    Map(BTreeMap<Value, Value>),
    /// An application record
    Object(Rc<dyn Record>),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Bytes(_) => Some(DataType::Bytes),
            Value::List(_) => Some(DataType::List),
            Value::Map(_) => Some(DataType::Map),
            Value::Object(r) => Some(DataType::Record(r.record_type().name().to_string())),
        }
    }

    /// Wraps a record into a value.
    pub fn object<R: Record + 'static>(record: R) -> Self {
        Value::Object(Rc::new(record))
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is a number.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Float64(_))
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i32 value if this is an Int32, None otherwise.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int64, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float64, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the datetime timestamp if this is a DateTime, None otherwise.
    pub fn as_datetime(&self) -> Option<i64> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the bytes if this is Bytes, None otherwise.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Returns the items if this is a List, None otherwise.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Returns the entries if this is a Map, None otherwise.
    pub fn as_map(&self) -> Option<&BTreeMap<Value, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the record if this is an Object, None otherwise.
    pub fn as_record(&self) -> Option<&Rc<dyn Record>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Coerces a numeric value to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Truth value of any value: null is false, booleans are themselves,
    /// numbers are true when greater than zero, anything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int32(i) => *i > 0,
            Value::Int64(i) => *i > 0,
            Value::Float64(f) => *f > 0.0,
            _ => true,
        }
    }

    /// String representation used for concatenation and fallback comparison.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::from("null"),
            Value::Boolean(b) => alloc::format!("{}", b),
            Value::Int32(i) => alloc::format!("{}", i),
            Value::Int64(i) => alloc::format!("{}", i),
            Value::Float64(f) => alloc::format!("{}", f),
            Value::String(s) => s.clone(),
            Value::DateTime(d) => alloc::format!("{}", d),
            Value::Bytes(b) => alloc::format!("{:?}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_text).collect();
                alloc::format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| alloc::format!("{}={}", k.to_text(), v.to_text()))
                    .collect();
                alloc::format!("{{{}}}", parts.join(", "))
            }
            Value::Object(r) => r.text(),
        }
    }

    /// Number of items for containers and characters for strings.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(v) => Some(v.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) => 4,
            Value::Bytes(_) => 5,
            Value::List(_) => 6,
            Value::Map(_) => 7,
            Value::Object(_) => 8,
        }
    }
}

/// Returns the integer a float represents exactly, if any.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        let i = f as i64;
        if i as f64 == f {
            return Some(i);
        }
    }
    None
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(i) => Some(*i as i64),
        Value::Int64(i) => Some(*i),
        _ => None,
    }
}

// 2^63, the first float above every i64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Compares an integer with a float without rounding the integer. NaN sorts
/// after every integer.
fn int_float_cmp(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    // in range, so truncation is exact
    let t = f as i64;
    i.cmp(&t).then_with(|| {
        let fraction = f - t as f64;
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

fn numeric_cmp(a: &Value, b: &Value) -> Ordering {
    match (integer_of(a), integer_of(b)) {
        (Some(x), Some(y)) => return x.cmp(&y),
        (Some(x), None) => return int_float_cmp(x, b.to_f64().unwrap_or(f64::NAN)),
        (None, Some(y)) => return int_float_cmp(y, a.to_f64().unwrap_or(f64::NAN)).reverse(),
        (None, None) => {}
    }
    let x = a.to_f64().unwrap_or(0.0);
    let y = b.to_f64().unwrap_or(0.0);
    // NaN sorts after every other number
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (integer_of(a), integer_of(b)) {
        (Some(x), Some(y)) => x == y,
        (Some(x), None) => integral(b.to_f64().unwrap_or(f64::NAN)) == Some(x),
        (None, Some(y)) => integral(a.to_f64().unwrap_or(f64::NAN)) == Some(y),
        (None, None) => {
            let x = a.to_f64().unwrap_or(f64::NAN);
            let y = b.to_f64().unwrap_or(f64::NAN);
            (x.is_nan() && y.is_nan()) || x == y
        }
    }
}

fn record_addr(r: &Rc<dyn Record>) -> usize {
    Rc::as_ptr(r) as *const u8 as usize
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (a, b) if a.is_numeric() && b.is_numeric() => numeric_eq(a, b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || a.equals(b.as_ref()),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_order().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) => {
                // Equal numbers of different widths must hash alike
                if let Some(i) = integer_of(self) {
                    i.hash(state);
                } else {
                    let f = self.to_f64().unwrap_or(f64::NAN);
                    match integral(f) {
                        Some(i) => i.hash(state),
                        None if f.is_nan() => u64::MAX.hash(state),
                        None => f.to_bits().hash(state),
                    }
                }
            }
            Value::String(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(entries) => {
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Object(r) => r.record_type().name().hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => numeric_cmp(a, b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.iter().cmp(b.iter()),
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) || a.equals(b.as_ref()) {
                    return Ordering::Equal;
                }
                if let Some(ord) = a.compare(b.as_ref()) {
                    return ord;
                }
                a.record_type()
                    .name()
                    .cmp(b.record_type().name())
                    .then_with(|| a.text().cmp(&b.text()))
                    .then_with(|| record_addr(a).cmp(&record_addr(b)))
            }
            // Different types: order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "'{}'", s),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<Value, Value>> for Value {
    fn from(v: BTreeMap<Value, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<Rc<dyn Record>> for Value {
    fn from(v: Rc<dyn Record>) -> Self {
        Value::Object(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
