//! Error types for ObjQL.
//!
//! Errors fall into two families. Resolution errors are raised while a
//! statement is initialized and prevent execution from starting; evaluation
//! errors are raised while rows are processed and abort the execution that
//! produced them.

use alloc::boxed::Box;
use alloc::string::String;
use thiserror::Error;

use crate::types::DataType;

/// Result type alias for ObjQL operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for ObjQL operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An accessor path segment matched no field, getter or method.
    #[error("cannot resolve `{segment}` on type {type_name}")]
    UnresolvedMember { segment: String, type_name: String },

    /// A bracketed index or key was applied to a type that cannot take it.
    #[error("invalid index `{index}` in `{path}`: {type_name} does not support it")]
    InvalidIndex {
        path: String,
        index: String,
        type_name: String,
    },

    /// The accessor path text is malformed.
    #[error("invalid accessor path `{path}`: {message}")]
    InvalidPath { path: String, message: String },

    /// No registered handler has a function matching the call.
    #[error("no function matches {name}/{arity} in `{expression}`")]
    UnresolvedFunction {
        name: String,
        arity: usize,
        expression: String,
    },

    /// No constructor of the record factory matches the arguments.
    #[error("no constructor of {type_name} matches `{expression}`")]
    UnresolvedConstructor {
        type_name: String,
        expression: String,
    },

    /// The statement combines clauses in an unsupported way.
    #[error("invalid statement: {message}")]
    InvalidStatement { message: String },

    /// A `_`-prefixed variable name that is not one of the reserved names.
    #[error("unknown reserved variable `{name}`")]
    ReservedName { name: String },

    /// An accessor step met a value of an incompatible runtime type.
    #[error("accessor `{path}` cannot be applied to {found}")]
    AccessorMismatch { path: String, found: String },

    /// A function handler failed while being invoked.
    #[error("function {name} failed: {message}")]
    Function { name: String, message: String },

    /// A record factory or property assignment failed.
    #[error("cannot construct {type_name}: {message}")]
    Construction { type_name: String, message: String },

    /// A value had a different type than the operation required.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: DataType, got: DataType },

    /// An error annotated with where it happened.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates an unresolved member error.
    pub fn unresolved_member(segment: impl Into<String>, type_name: impl Into<String>) -> Self {
        Error::UnresolvedMember {
            segment: segment.into(),
            type_name: type_name.into(),
        }
    }

    /// Creates an invalid index error.
    pub fn invalid_index(
        path: impl Into<String>,
        index: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Error::InvalidIndex {
            path: path.into(),
            index: index.into(),
            type_name: type_name.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an unresolved function error.
    pub fn unresolved_function(
        name: impl Into<String>,
        arity: usize,
        expression: impl Into<String>,
    ) -> Self {
        Error::UnresolvedFunction {
            name: name.into(),
            arity,
            expression: expression.into(),
        }
    }

    /// Creates an unresolved constructor error.
    pub fn unresolved_constructor(
        type_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Error::UnresolvedConstructor {
            type_name: type_name.into(),
            expression: expression.into(),
        }
    }

    /// Creates an invalid statement error.
    pub fn invalid_statement(message: impl Into<String>) -> Self {
        Error::InvalidStatement {
            message: message.into(),
        }
    }

    /// Creates a reserved name error.
    pub fn reserved_name(name: impl Into<String>) -> Self {
        Error::ReservedName { name: name.into() }
    }

    /// Creates an accessor mismatch error.
    pub fn accessor_mismatch(path: impl Into<String>, found: impl Into<String>) -> Self {
        Error::AccessorMismatch {
            path: path.into(),
            found: found.into(),
        }
    }

    /// Creates a function invocation error.
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a construction error.
    pub fn construction(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Construction {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Wraps this error with a description of where it happened.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if this error is raised at statement initialization time.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self.root(),
            Error::UnresolvedMember { .. }
                | Error::InvalidIndex { .. }
                | Error::InvalidPath { .. }
                | Error::UnresolvedFunction { .. }
                | Error::UnresolvedConstructor { .. }
                | Error::InvalidStatement { .. }
                | Error::ReservedName { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch(DataType::Int32, DataType::String);
        assert!(err.to_string().contains("type mismatch"));

        let err = Error::unresolved_member("nmae", "Person");
        assert_eq!(err.to_string(), "cannot resolve `nmae` on type Person");

        let err = Error::unresolved_function("foo", 2, "foo(a, b)");
        assert!(err.to_string().contains("foo/2"));
    }

    #[test]
    fn test_context_wrapping() {
        let err = Error::function("avg", "not a number").context("column 2");
        assert_eq!(err.to_string(), "column 2: function avg failed: not a number");
        assert!(matches!(err.root(), Error::Function { .. }));
        assert!(!err.is_resolution());
    }

    #[test]
    fn test_resolution_classification() {
        assert!(Error::invalid_statement("x").is_resolution());
        assert!(Error::reserved_name("_foo").context("where").is_resolution());
        assert!(!Error::accessor_mismatch("a.b", "String").is_resolution());
    }
}
