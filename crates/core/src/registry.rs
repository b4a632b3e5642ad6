//! Registry of record types and record factories known to a statement.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};

use crate::record::{RecordFactory, RecordType};

/// Name-indexed record types and factories.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Rc<RecordType>>,
    factories: BTreeMap<String, Rc<dyn RecordFactory>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type under its name.
    pub fn register_type(&mut self, record_type: Rc<RecordType>) {
        self.types
            .insert(record_type.name().to_string(), record_type);
    }

    /// Registers a factory, and the type it creates.
    pub fn register_factory(&mut self, factory: Rc<dyn RecordFactory>) {
        let record_type = factory.record_type();
        let name = record_type.name().to_string();
        self.types.entry(name.clone()).or_insert(record_type);
        self.factories.insert(name, factory);
    }

    /// Returns the record type registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Rc<RecordType>> {
        self.types.get(name)
    }

    /// Returns the factory registered under `name`.
    pub fn factory(&self, name: &str) -> Option<&Rc<dyn RecordFactory>> {
        self.factories.get(name)
    }

    /// Adds every type and factory of `other` not already registered here.
    pub fn merge(&mut self, other: &TypeRegistry) {
        for (name, record_type) in &other.types {
            self.types.entry(name.clone()).or_insert_with(|| record_type.clone());
        }
        for (name, factory) in &other.factories {
            self.factories.entry(name.clone()).or_insert_with(|| factory.clone());
        }
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DynamicRecordFactory;
    use crate::types::DataType;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TypeRegistry::new();
        registry.register_type(Rc::new(
            RecordType::new("Item").with_field("id", DataType::Int64),
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("Item").is_some());
        assert!(registry.get("item").is_none());
        assert!(registry.factory("Item").is_none());
    }

    #[test]
    fn test_factory_registers_type() {
        let mut registry = TypeRegistry::new();
        let rt = Rc::new(RecordType::new("Pair").with_field("a", DataType::Any));
        registry.register_factory(Rc::new(DynamicRecordFactory::new(rt)));
        assert!(registry.get("Pair").is_some());
        assert!(registry.factory("Pair").is_some());
    }

    #[test]
    fn test_merge_keeps_own_entries() {
        let mut own = TypeRegistry::new();
        own.register_type(Rc::new(RecordType::new("Item").with_field("id", DataType::Int64)));
        let mut other = TypeRegistry::new();
        other.register_type(Rc::new(RecordType::new("Item")));
        other.register_type(Rc::new(RecordType::new("Order")));

        own.merge(&other);
        assert_eq!(own.len(), 2);
        assert!(own.get("Item").unwrap().member("id").is_some());
    }
}
