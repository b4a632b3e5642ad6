//! Leaf nodes: constants, accessors, bind variables and save values.

use alloc::string::String;
use core::fmt;
use objql_core::{Accessor, AccessorPath, DataType, Error, Result, Value};

use super::Node;
use crate::context::{EvalContext, InitContext};
use crate::scope::{anonymous_name, is_reserved, normalize, Scope};

/// A literal value.
#[derive(Clone, Debug)]
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Node for Constant {
    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn init(&mut self, _ctx: &InitContext<'_>) -> Result<()> {
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::of(&self.value)
    }

    fn is_fixed(&self) -> bool {
        true
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

/// A member path evaluated against the current row.
#[derive(Debug)]
pub struct AccessorExpr {
    path: AccessorPath,
    accessor: Option<Accessor>,
}

impl AccessorExpr {
    pub fn new(path: AccessorPath) -> Self {
        Self {
            path,
            accessor: None,
        }
    }

    #[inline]
    pub fn path(&self) -> &AccessorPath {
        &self.path
    }
}

impl Node for AccessorExpr {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let accessor = self.accessor.as_ref().ok_or_else(|| {
            Error::invalid_statement(alloc::format!("accessor {} used before initialization", self.path))
        })?;
        match ctx.row() {
            Some(row) => accessor.get(row),
            None => Ok(Value::Null),
        }
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.accessor = Some(Accessor::resolve(&self.path, ctx.row_type(), ctx.types())?);
        Ok(())
    }

    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        match &self.accessor {
            Some(a) => a.result_type().clone(),
            None => Accessor::resolve(&self.path, ctx.row_type(), ctx.types())
                .map(|a| a.result_type().clone())
                .unwrap_or(DataType::Any),
        }
    }

    fn is_fixed(&self) -> bool {
        false
    }
}

impl fmt::Display for AccessorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path, f)
    }
}

fn resolve_path(path: &Option<AccessorPath>, root: &DataType, ctx: &InitContext<'_>) -> Result<Option<Accessor>> {
    path.as_ref()
        .map(|p| Accessor::resolve(p, root, ctx.types()))
        .transpose()
}

fn apply_path(accessor: &Option<Accessor>, value: Value) -> Result<Value> {
    match accessor {
        Some(a) => a.get(&value),
        None => Ok(value),
    }
}

fn fmt_path(path: &Option<AccessorPath>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match path {
        Some(p) if p.segments().first().is_some_and(|s| s.is_bracket()) => write!(f, "{}", p),
        Some(p) => write!(f, ".{}", p),
        None => Ok(()),
    }
}

/// A bind variable, optionally followed by a member path: `:name.path`.
///
/// Names are case-insensitive. Anonymous (`?`) variables receive the name
/// `?n` at initialization, numbered from 1 in initialization order. The
/// reserved names evaluate to engine state:
///
/// | name | value |
/// |------|-------|
/// | `_currobj` | the current row |
/// | `_allobjs` | the current row-set, as a list |
/// | `_parent` | the enclosing statement's current row |
/// | `_query` | the textual form of the statement |
/// | `_grpby` | the group key, unwrapped when it has a single element |
/// | `_grpbys` | the group key, as a list |
#[derive(Debug)]
pub struct BindVariable {
    name: Option<String>,
    resolved: Option<String>,
    path: Option<AccessorPath>,
    accessor: Option<Accessor>,
}

impl BindVariable {
    pub fn named(name: impl Into<String>) -> Self {
        let name = normalize(&name.into());
        Self {
            resolved: Some(name.clone()),
            name: Some(name),
            path: None,
            accessor: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: None,
            resolved: None,
            path: None,
            accessor: None,
        }
    }

    pub fn with_path(mut self, path: AccessorPath) -> Self {
        self.path = Some(path);
        self
    }

    /// The store key: the lowercased name, or `?n` once an anonymous
    /// variable has been initialized.
    pub fn resolved_name(&self) -> &str {
        self.resolved.as_deref().unwrap_or("?")
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// Takes the next `?n` position from `scope` unless one is held already.
    pub(crate) fn number(&mut self, scope: &Scope) {
        if self.name.is_none() && self.resolved.is_none() {
            self.resolved = Some(anonymous_name(scope.next_anonymous()));
        }
    }

    fn base_type(&self, ctx: &InitContext<'_>) -> DataType {
        match self.resolved_name() {
            "_currobj" => ctx.row_type().clone(),
            "_allobjs" | "_grpbys" => DataType::List,
            "_query" => DataType::String,
            "_parent" | "_grpby" => DataType::Any,
            name => {
                let value = ctx.scope().variable(name);
                DataType::of(&value)
            }
        }
    }

    fn base_value(&self, ctx: &EvalContext<'_>) -> Value {
        match self.resolved_name() {
            "_currobj" => ctx.row().cloned().unwrap_or(Value::Null),
            "_allobjs" => Value::List(ctx.rows().to_vec()),
            "_parent" => ctx
                .parent()
                .and_then(|p| p.row())
                .cloned()
                .unwrap_or(Value::Null),
            "_query" => Value::String(alloc::format!("{}", ctx.query())),
            "_grpby" => match ctx.group_key() {
                Some([single]) => single.clone(),
                Some(key) => Value::List(key.to_vec()),
                None => Value::Null,
            },
            "_grpbys" => ctx
                .group_key()
                .map(|key| Value::List(key.to_vec()))
                .unwrap_or(Value::Null),
            name => ctx.scope().variable(name),
        }
    }
}

impl Node for BindVariable {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        apply_path(&self.accessor, self.base_value(ctx))
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        match &self.name {
            Some(name) if name.starts_with('_') && !is_reserved(name) => {
                return Err(Error::reserved_name(name.as_str()));
            }
            Some(_) => {}
            None => self.number(ctx.scope()),
        }
        // Only the current row has a declared type; other values are
        // resolved against whatever they hold at run time.
        let root = if self.resolved_name() == "_currobj" {
            ctx.row_type().clone()
        } else {
            DataType::Any
        };
        self.accessor = resolve_path(&self.path, &root, ctx)?;
        Ok(())
    }

    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        match (&self.path, &self.accessor) {
            (None, _) => self.base_type(ctx),
            (Some(_), Some(a)) => a.result_type().clone(),
            (Some(_), None) => DataType::Any,
        }
    }

    fn is_fixed(&self) -> bool {
        false
    }
}

impl fmt::Display for BindVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, ":{}", name)?,
            None => f.write_str("?")?,
        }
        fmt_path(&self.path, f)
    }
}

/// A save value, optionally followed by a member path: `@name.path`.
#[derive(Debug)]
pub struct SaveValue {
    name: String,
    path: Option<AccessorPath>,
    accessor: Option<Accessor>,
}

impl SaveValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize(&name.into()),
            path: None,
            accessor: None,
        }
    }

    pub fn with_path(mut self, path: AccessorPath) -> Self {
        self.path = Some(path);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Node for SaveValue {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let value = ctx.scope().save_value(&self.name).unwrap_or(Value::Null);
        apply_path(&self.accessor, value)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.accessor = resolve_path(&self.path, &DataType::Any, ctx)?;
        Ok(())
    }

    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        if self.path.is_some() {
            return DataType::Any;
        }
        ctx.scope()
            .save_value(&self.name)
            .map(|v| DataType::of(&v))
            .unwrap_or(DataType::Any)
    }

    fn is_fixed(&self) -> bool {
        false
    }
}

impl fmt::Display for SaveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        fmt_path(&self.path, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::testing::{eval, eval_with};
    use crate::QueryBuilder;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use alloc::vec;
    use objql_core::{DynamicRecord, RecordType};

    #[test]
    fn test_bind_variable_values() {
        let builder = QueryBuilder::new().variable("Limit", 3i64);
        assert_eq!(eval_with(builder, Expr::bind("LIMIT")).unwrap(), Value::Int64(3));
        assert_eq!(eval(Expr::bind("unset")).unwrap(), Value::Null);
    }

    #[test]
    fn test_bind_path_into_value() {
        let ty = Rc::new(RecordType::new("Box").with_field("size", DataType::Int32));
        let boxed = DynamicRecord::new(ty).with("size", 7).into_value();
        let builder = QueryBuilder::new().variable("b", boxed);
        let e = Expr::bind_path("b", "size").unwrap();
        assert_eq!(e.to_string(), ":b.size");
        assert_eq!(eval_with(builder, e).unwrap(), Value::Int32(7));
    }

    #[test]
    fn test_reserved_names() {
        let query = QueryBuilder::new()
            .select(vec![Expr::bind("_allobjs"), Expr::bind("_CurrObj"), Expr::bind("_grpby")])
            .build()
            .unwrap();
        let rows = vec![Value::Int32(1), Value::Int32(2)];
        let results = query.execute(&rows).unwrap();
        assert_eq!(
            results.rows()[1],
            Value::List(vec![Value::List(rows.clone()), Value::Int32(2), Value::Null])
        );

        let text = eval(Expr::bind("_query")).unwrap();
        assert_eq!(text, Value::from("SELECT :_query FROM null"));
    }

    #[test]
    fn test_save_value_reads_store() {
        let query = QueryBuilder::new().select(vec![Expr::save("Avg")]).build().unwrap();
        query.scope().set_save_value("avg", Value::Float64(1.5));
        let results = query.execute(&[Value::Null]).unwrap();
        assert_eq!(results.rows()[0], Value::List(vec![Value::Float64(1.5)]));
        assert_eq!(Expr::save("Avg").to_string(), "@avg");
    }

    #[test]
    fn test_accessor_without_row_is_null() {
        let mut e = Expr::accessor("a.b").unwrap();
        let q = QueryBuilder::new().build().unwrap();
        crate::testing::init_all(core::slice::from_mut(&mut e), &q);
        let rows: [Value; 0] = [];
        let ctx = EvalContext::new(&q, &rows);
        assert_eq!(e.evaluate(&ctx).unwrap(), Value::Null);
    }
}
