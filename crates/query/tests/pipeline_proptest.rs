//! Property-based tests for the execution pipeline.
//!
//! Rows are plain integers or `[key, value]` pairs, addressed through
//! `:_currobj` and the `get` function, so every statement runs untyped.

use objql_core::Value;
use objql_query::{Direction, Expr, OrderBy, QueryBuilder};
use proptest::prelude::*;
use std::collections::HashSet;

fn me() -> Expr {
    Expr::bind("_currobj")
}

fn element(index: i32) -> Expr {
    Expr::call("get", vec![me(), Expr::number(index)])
}

/// Strategy for small integers, so that duplicates are common.
fn ints_strategy(max_rows: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-20i64..20i64, 0..max_rows)
}

/// Strategy for `[key, value]` rows with few distinct keys.
fn pairs_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((0i64..5i64, -100i64..100i64), 0..max_rows).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| Value::List(vec![Value::Int64(k), Value::Int64(v)]))
            .collect()
    })
}

/// Strategy for a value of any scalar kind, numbers of several widths
/// included.
fn mixed_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        (-20i32..20i32).prop_map(Value::Int32),
        (-20i64..20i64).prop_map(Value::Int64),
        (-20.0f64..20.0f64).prop_map(Value::Float64),
        "[0-9a-c]{0,3}".prop_map(Value::from),
    ]
}

/// Strategy for mixed rows paired with a shuffled copy of themselves.
fn mixed_rows_and_shuffle(max_rows: usize) -> impl Strategy<Value = (Vec<Value>, Vec<Value>)> {
    prop::collection::vec(mixed_value(), 0..max_rows)
        .prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle()))
}

fn values(ns: &[i64]) -> Vec<Value> {
    ns.iter().map(|n| Value::Int64(*n)).collect()
}

proptest! {
    /// Property: WHERE keeps exactly the rows its predicate holds for, in
    /// input order.
    #[test]
    fn where_keeps_matching_rows_in_order(ns in ints_strategy(60), threshold in -20i64..20i64) {
        let query = QueryBuilder::new()
            .where_(Expr::ge(me(), Expr::bind("t")))
            .variable("t", threshold)
            .build()
            .unwrap();
        let results = query.execute(&values(&ns)).unwrap();

        let expected: Vec<i64> = ns.iter().copied().filter(|n| *n >= threshold).collect();
        prop_assert_eq!(results.rows(), &values(&expected)[..]);
        prop_assert_eq!(results.where_results(), results.rows());
    }

    /// Property: GROUP BY partitions the filtered rows. Every row lands in
    /// the group of its key, keys are unique and in first-seen order.
    #[test]
    fn group_by_partitions_rows(rows in pairs_strategy(60)) {
        let query = QueryBuilder::new()
            .group_by(vec![element(0)])
            .select_objects()
            .build()
            .unwrap();
        let results = query.execute(&rows).unwrap();
        let groups = results.group_by_results().unwrap();

        let total: usize = groups.values().map(Vec::len).sum();
        prop_assert_eq!(total, rows.len());

        let mut first_seen: Vec<Vec<Value>> = Vec::new();
        for row in &rows {
            let key = vec![row.as_list().unwrap()[0].clone()];
            if !first_seen.contains(&key) {
                first_seen.push(key);
            }
        }
        let keys: Vec<Vec<Value>> = groups.keys().cloned().collect();
        prop_assert_eq!(keys, first_seen);

        for (key, members) in groups {
            for member in members {
                prop_assert_eq!(&member.as_list().unwrap()[0], &key[0]);
            }
        }
    }

    /// Property: ORDER BY is stable. Rows with equal sort keys keep their
    /// input order.
    #[test]
    fn order_by_is_stable(rows in pairs_strategy(60), descending in any::<bool>()) {
        let direction = if descending { Direction::Desc } else { Direction::Asc };
        let query = QueryBuilder::new()
            .order_by(OrderBy::new(objql_query::SortKey::Expr(element(0)), direction))
            .build()
            .unwrap();
        let results = query.execute(&rows).unwrap();

        let mut expected = rows.clone();
        expected.sort_by(|a, b| {
            let ord = a.as_list().unwrap()[0].cmp(&b.as_list().unwrap()[0]);
            if descending { ord.reverse() } else { ord }
        });
        prop_assert_eq!(results.rows(), &expected[..]);
    }

    /// Property: DISTINCT output has no duplicates, keeps first-seen order,
    /// and is unchanged by a second DISTINCT pass.
    #[test]
    fn distinct_is_idempotent(ns in ints_strategy(60)) {
        let query = QueryBuilder::new()
            .select(vec![me()])
            .distinct(true)
            .build()
            .unwrap();
        let once = query.execute(&values(&ns)).unwrap().into_rows();

        let mut seen = HashSet::new();
        let expected: Vec<Value> = ns
            .iter()
            .filter(|n| seen.insert(**n))
            .map(|n| Value::List(vec![Value::Int64(*n)]))
            .collect();
        prop_assert_eq!(&once, &expected);

        let mut twice = once.clone();
        objql_query::executor::distinct(&mut twice);
        prop_assert_eq!(twice, once);
    }

    /// Property: a LIKE pattern without wildcards matches exactly the equal
    /// strings.
    #[test]
    fn like_without_wildcards_is_equality(subject in "[a-z]{0,6}", pattern in "[a-z]{0,6}") {
        let query = QueryBuilder::new()
            .select(vec![
                Expr::like(Expr::string(subject.clone()), Expr::string(pattern.clone())),
            ])
            .build()
            .unwrap();
        let results = query.execute(&[Value::Null]).unwrap();
        prop_assert_eq!(
            results.rows(),
            &[Value::List(vec![Value::Boolean(subject == pattern)])][..]
        );
    }

    /// Property: LIMIT keeps the window it names, clamped to the input.
    #[test]
    fn limit_takes_window(ns in ints_strategy(40), offset in 0usize..50, count in 0usize..50) {
        let query = QueryBuilder::new()
            .limit(objql_query::Limit::new(offset, count))
            .build()
            .unwrap();
        let results = query.execute(&values(&ns)).unwrap();
        let expected: Vec<i64> = ns.iter().copied().skip(offset).take(count).collect();
        prop_assert_eq!(results.rows(), &values(&expected)[..]);
    }

    /// Property: sorting mixed kinds yields the same ascending sequence
    /// whatever the input order.
    #[test]
    fn order_by_mixed_kinds_ignores_input_order((rows, shuffled) in mixed_rows_and_shuffle(40)) {
        let query = QueryBuilder::new()
            .order_by(OrderBy::new(objql_query::SortKey::Expr(me()), Direction::Asc))
            .build()
            .unwrap();
        let sorted = query.execute(&rows).unwrap().into_rows();
        let resorted = query.execute(&shuffled).unwrap().into_rows();

        prop_assert_eq!(&sorted, &resorted);
        for pair in sorted.windows(2) {
            prop_assert!(pair[0] <= pair[1], "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    /// Property: once ties are broken, flipping every direction exactly
    /// reverses the output.
    #[test]
    fn reversed_directions_reverse_order(
        firsts in prop::collection::vec(mixed_value(), 0..40),
        seconds in prop::collection::vec(mixed_value(), 40),
    ) {
        let rows: Vec<Value> = firsts
            .into_iter()
            .zip(seconds)
            .enumerate()
            .map(|(i, (a, b))| Value::List(vec![a, b, Value::Int64(i as i64)]))
            .collect();
        let ordered = |direction: Direction| {
            QueryBuilder::new()
                .order_by(OrderBy::new(objql_query::SortKey::Expr(element(0)), direction))
                .order_by(OrderBy::new(objql_query::SortKey::Expr(element(1)), direction))
                .order_by(OrderBy::new(objql_query::SortKey::Expr(element(2)), direction))
                .build()
                .unwrap()
                .execute(&rows)
                .unwrap()
                .into_rows()
        };

        let mut descending = ordered(Direction::Desc);
        descending.reverse();
        prop_assert_eq!(ordered(Direction::Asc), descending);
    }
}
