//! ObjQL Core - value model and record capabilities for the ObjQL engine.
//!
//! This crate provides the foundational types shared by the query engine:
//!
//! - `Value`: dynamically typed values produced by records and expressions
//! - `DataType`: static type descriptors used during statement resolution
//! - `Record` / `RecordType`: the capability through which the engine reads
//!   application objects it knows nothing about
//! - `TypeRegistry`: named record types and factories
//! - `Accessor`: dotted/bracketed member paths resolved once and replayed
//! - `Error`: resolution and evaluation errors
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use objql_core::{Accessor, DataType, DynamicRecord, RecordType, TypeRegistry, Value};
//!
//! let person = Rc::new(
//!     RecordType::new("Person")
//!         .with_field("name", DataType::String)
//!         .with_getter("getAge", DataType::Int64),
//! );
//! let mut registry = TypeRegistry::new();
//! registry.register_type(person.clone());
//!
//! let ann = DynamicRecord::new(person)
//!     .with("name", "Ann")
//!     .with("getAge", 31i64)
//!     .into_value();
//!
//! let age = Accessor::parse("age", &DataType::record("Person"), &registry).unwrap();
//! assert_eq!(age.result_type(), &DataType::Int64);
//! assert_eq!(age.get(&ann).unwrap(), Value::Int64(31));
//! ```

#![no_std]

extern crate alloc;

pub mod accessor;
mod error;
pub mod pattern_match;
mod record;
mod registry;
mod types;
mod value;

pub use accessor::{Accessor, AccessorPath};
pub use error::{Error, Result};
pub use record::{
    getter_name, DynamicRecord, DynamicRecordFactory, Member, MemberKind, MutableRecord, Record,
    RecordFactory, RecordType,
};
pub use registry::TypeRegistry;
pub use types::DataType;
pub use value::Value;
