//! Range, pattern and membership predicates.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::OnceCell;
use core::fmt;
use objql_core::pattern_match::LikePattern;
use objql_core::{DataType, Result, Value};

use super::operator::{compare_values, CompareOp};
use super::{Expr, Node};
use crate::context::{EvalContext, InitContext};

/// Evaluates `expr`, remembering the result in `memo` when it is fixed.
fn memoized(expr: &Expr, memo: &OnceCell<Value>, ctx: &EvalContext<'_>) -> Result<Value> {
    if !expr.is_fixed() {
        return expr.evaluate(ctx);
    }
    if let Some(v) = memo.get() {
        return Ok(v.clone());
    }
    let v = expr.evaluate(ctx)?;
    let _ = memo.set(v.clone());
    Ok(v)
}

/// `expr [NOT] BETWEEN start AND end`, inclusive on both ends.
#[derive(Debug)]
pub struct Between {
    expr: Box<Expr>,
    start: Box<Expr>,
    end: Box<Expr>,
    negated: bool,
    start_memo: OnceCell<Value>,
    end_memo: OnceCell<Value>,
}

impl Between {
    pub fn new(expr: Expr, start: Expr, end: Expr) -> Self {
        Self {
            expr: Box::new(expr),
            start: Box::new(start),
            end: Box::new(end),
            negated: false,
            start_memo: OnceCell::new(),
            end_memo: OnceCell::new(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }
}

impl Node for Between {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let v = self.expr.evaluate(ctx)?;
        let start = memoized(&self.start, &self.start_memo, ctx)?;
        let end = memoized(&self.end, &self.end_memo, ctx)?;
        let within = CompareOp::Ge.test(compare_values(&v, &start, false))
            && CompareOp::Le.test(compare_values(&v, &end, false));
        Ok(within != self.negated)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)?;
        self.start.init(ctx)?;
        self.end.init(ctx)?;
        self.start_memo = OnceCell::new();
        self.end_memo = OnceCell::new();
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed() && self.start.is_fixed() && self.end.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
        f(&self.start);
        f(&self.end);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
        f(&mut self.start);
        f(&mut self.end);
    }
}

impl fmt::Display for Between {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { "NOT " } else { "" };
        write!(f, "{} {}BETWEEN {} AND {}", self.expr, not, self.start, self.end)
    }
}

/// `expr [NOT] LIKE pattern`.
///
/// A fixed pattern is compiled on first use. A null subject or pattern never
/// matches, with or without `NOT`.
#[derive(Debug)]
pub struct Like {
    expr: Box<Expr>,
    pattern: Box<Expr>,
    negated: bool,
    ignore_case: bool,
    compiled: OnceCell<LikePattern>,
}

impl Like {
    pub fn new(expr: Expr, pattern: Expr) -> Self {
        Self {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            negated: false,
            ignore_case: false,
            compiled: OnceCell::new(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

impl Node for Like {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let v = self.expr.evaluate(ctx)?;
        if v.is_null() {
            return Ok(false);
        }
        let subject = v.to_text();
        let matched = if self.pattern.is_fixed() {
            match self.compiled.get() {
                Some(p) => p.matches(&subject),
                None => {
                    let p = self.pattern.evaluate(ctx)?;
                    if p.is_null() {
                        return Ok(false);
                    }
                    self.compiled
                        .get_or_init(|| LikePattern::compile(&p.to_text(), self.ignore_case))
                        .matches(&subject)
                }
            }
        } else {
            let p = self.pattern.evaluate(ctx)?;
            if p.is_null() {
                return Ok(false);
            }
            LikePattern::compile(&p.to_text(), self.ignore_case).matches(&subject)
        };
        Ok(matched != self.negated)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)?;
        self.pattern.init(ctx)?;
        self.compiled = OnceCell::new();
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed() && self.pattern.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
        f(&self.pattern);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
        f(&mut self.pattern);
    }
}

impl fmt::Display for Like {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { "NOT " } else { "" };
        let case = if self.ignore_case { "$" } else { "" };
        write!(f, "{} {}{}LIKE {}", self.expr, not, case, self.pattern)
    }
}

/// `expr [NOT] IN [LIKE] [ALL] (item, ...)`.
///
/// List items contribute each element and map items each key. Without
/// `ALL` the test passes on the first matching candidate; with `ALL` every
/// candidate must match. `NOT` passes only when no candidate matches, so
/// `NOT IN ALL` is true only for zero matches.
#[derive(Debug)]
pub struct InList {
    expr: Box<Expr>,
    items: Vec<Expr>,
    negated: bool,
    like: bool,
    all: bool,
    ignore_case: bool,
    patterns: Vec<OnceCell<LikePattern>>,
}

impl InList {
    pub fn new(expr: Expr, items: Vec<Expr>) -> Self {
        let patterns = items.iter().map(|_| OnceCell::new()).collect();
        Self {
            expr: Box::new(expr),
            items,
            negated: false,
            like: false,
            all: false,
            ignore_case: false,
            patterns,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    /// Matches candidates as LIKE patterns.
    pub fn like(mut self) -> Self {
        self.like = true;
        self
    }

    /// Requires every candidate to match.
    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn candidate_matches(
        &self,
        v: &Value,
        subject: &str,
        candidate: &Value,
        slot: Option<&OnceCell<LikePattern>>,
    ) -> bool {
        if !self.like {
            return CompareOp::Eq.test(compare_values(v, candidate, self.ignore_case));
        }
        if v.is_null() || candidate.is_null() {
            return false;
        }
        match slot {
            Some(cell) => cell
                .get_or_init(|| LikePattern::compile(&candidate.to_text(), self.ignore_case))
                .matches(subject),
            None => LikePattern::compile(&candidate.to_text(), self.ignore_case).matches(subject),
        }
    }

    /// Counts matches, stopping as soon as the outcome is decided.
    fn is_match(&self, v: &Value, ctx: &EvalContext<'_>) -> Result<bool> {
        let subject = if self.like { v.to_text() } else { String::new() };
        for (item, cell) in self.items.iter().zip(&self.patterns) {
            let value = item.evaluate(ctx)?;
            let candidates: Vec<&Value> = match &value {
                Value::List(items) => items.iter().collect(),
                Value::Map(entries) => entries.keys().collect(),
                other => alloc::vec![other],
            };
            // Only a fixed scalar item keeps its compiled pattern.
            let scalar = !matches!(value, Value::List(_) | Value::Map(_));
            let slot = (item.is_fixed() && scalar).then_some(cell);
            for candidate in candidates {
                let hit = self.candidate_matches(v, &subject, candidate, slot);
                match (self.all && !self.negated, hit) {
                    (true, false) => return Ok(false),
                    (false, true) => return Ok(true),
                    _ => {}
                }
            }
        }
        // ALL with every candidate matched, or no candidate matched at all
        Ok(self.all && !self.negated)
    }
}

impl Node for InList {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let v = self.expr.evaluate(ctx)?;
        let matched = self.is_match(&v, ctx)?;
        Ok(matched != self.negated)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)?;
        for item in &mut self.items {
            item.init(ctx)?;
        }
        self.patterns = self.items.iter().map(|_| OnceCell::new()).collect();
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed() && self.items.iter().all(Expr::is_fixed)
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
        self.items.iter().for_each(|item| f(item));
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
        self.items.iter_mut().for_each(|item| f(item));
    }
}

impl fmt::Display for InList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.expr)?;
        if self.negated {
            f.write_str("NOT ")?;
        }
        if self.ignore_case {
            f.write_str("$")?;
        }
        f.write_str("IN ")?;
        if self.like {
            f.write_str("LIKE ")?;
        }
        if self.all {
            f.write_str("ALL ")?;
        }
        f.write_str("(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::eval;
    use alloc::collections::BTreeMap;
    use alloc::string::ToString;
    use alloc::vec;

    fn nums(ns: &[i32]) -> Vec<Expr> {
        ns.iter().map(|n| Expr::number(*n)).collect()
    }

    fn truth(e: impl Into<Expr>) -> bool {
        eval(e.into()).unwrap() == Value::Boolean(true)
    }

    #[test]
    fn test_between_negation() {
        let bounds = || (Expr::number(1), Expr::number(10));
        let (s, e) = bounds();
        assert!(!truth(Expr::not_between(Expr::number(5), s, e)));
        let (s, e) = bounds();
        assert!(truth(Expr::not_between(Expr::number(15), s, e)));
        let (s, e) = bounds();
        assert!(truth(Expr::between(Expr::number(10), s, e)));
    }

    #[test]
    fn test_between_null_subject() {
        assert!(!truth(Expr::between(Expr::null(), Expr::number(1), Expr::number(2))));
    }

    #[test]
    fn test_like_wildcards() {
        let like = |s: &str| truth(Expr::like(Expr::string(s), Expr::string("a%c")));
        assert!(like("abc"));
        assert!(like("ac"));
        assert!(!like("abD"));
    }

    #[test]
    fn test_like_null_never_matches() {
        assert!(!truth(Expr::like(Expr::null(), Expr::string("%"))));
        assert!(!truth(Expr::not_like(Expr::null(), Expr::string("%"))));
    }

    #[test]
    fn test_like_ignore_case() {
        let e = Like::new(Expr::string("HeLLo"), Expr::string("h_llo")).ignore_case();
        assert!(truth(e));
    }

    #[test]
    fn test_in_all() {
        assert!(!truth(InList::new(Expr::number(2), nums(&[1, 2, 3])).all()));
        assert!(truth(InList::new(Expr::number(2), nums(&[2, 2, 2])).all()));
    }

    #[test]
    fn test_not_in_all_requires_zero_matches() {
        assert!(!truth(InList::new(Expr::number(2), nums(&[2, 2, 2])).negated().all()));
        // one match is enough to fail, even though not all match
        assert!(!truth(InList::new(Expr::number(2), nums(&[1, 2, 3])).negated().all()));
        assert!(truth(InList::new(Expr::number(2), nums(&[4, 5])).negated().all()));
    }

    #[test]
    fn test_in_expands_containers() {
        let list = Value::List(vec![Value::Int32(7), Value::Int32(8)]);
        assert!(truth(Expr::in_list(Expr::number(8), vec![Expr::constant(list)])));

        let mut map = BTreeMap::new();
        map.insert(Value::from("k"), Value::Int32(1));
        let e = Expr::in_list(Expr::string("k"), vec![Expr::constant(Value::Map(map))]);
        assert!(truth(e));
    }

    #[test]
    fn test_in_like() {
        let items = vec![Expr::string("b%"), Expr::string("a%")];
        let e = InList::new(Expr::string("apple"), items).like();
        assert!(truth(e));
        let e = InList::new(Expr::string("apple"), vec![Expr::string("b%")]).like().negated();
        assert!(truth(e));
    }

    #[test]
    fn test_in_display() {
        let e = InList::new(Expr::bind("x"), nums(&[1])).negated().like().all();
        assert_eq!(e.to_string(), ":x NOT IN LIKE ALL (1)");
    }
}
