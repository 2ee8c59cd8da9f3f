/// Row filters, ordering and limits
///
/// Rows are JSON objects; predicates address top-level fields. Strings that
/// parse as RFC 3339 timestamps compare chronologically, so timestamps with
/// different sub-second precision still order correctly.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eq,
    Neq,
    Gt,
    Lt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Predicate {
    pub fn matches(&self, row: &Value) -> bool {
        let actual = row.get(&self.field).unwrap_or(&Value::Null);
        let ordering = compare_values(actual, &self.value);
        match self.op {
            Op::Eq => ordering == Some(Ordering::Equal),
            Op::Neq => ordering != Some(Ordering::Equal),
            Op::Gt => ordering == Some(Ordering::Greater),
            Op::Lt => ordering == Some(Ordering::Less),
        }
    }
}

/// Conjunction of predicates; an empty filter matches every row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, field: &str, value: Value) -> Self {
        self.with(field, Op::Eq, value)
    }

    pub fn neq(self, field: &str, value: Value) -> Self {
        self.with(field, Op::Neq, value)
    }

    pub fn gt(self, field: &str, value: Value) -> Self {
        self.with(field, Op::Gt, value)
    }

    pub fn lt(self, field: &str, value: Value) -> Self {
        self.with(field, Op::Lt, value)
    }

    fn with(mut self, field: &str, op: Op, value: Value) -> Self {
        self.predicates.push(Predicate {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: Value) -> Self {
        self.filter = self.filter.eq(field, value);
        self
    }

    pub fn neq(mut self, field: &str, value: Value) -> Self {
        self.filter = self.filter.neq(field, value);
        self
    }

    pub fn gt(mut self, field: &str, value: Value) -> Self {
        self.filter = self.filter.gt(field, value);
        self
    }

    pub fn lt(mut self, field: &str, value: Value) -> Self {
        self.filter = self.filter.lt(field, value);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate against rows held in insertion order
    ///
    /// Ties keep insertion order when ascending and reverse it when
    /// descending, so "newest first" stays stable for equal timestamps.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut matched: Vec<(usize, &Value)> = rows
            .into_iter()
            .enumerate()
            .filter(|(_, row)| self.filter.matches(row))
            .collect();

        if let Some(order) = &self.order {
            matched.sort_by(|(ia, a), (ib, b)| {
                let fa = a.get(&order.field).unwrap_or(&Value::Null);
                let fb = b.get(&order.field).unwrap_or(&Value::Null);
                let by_field = compare_values(fa, fb).unwrap_or(Ordering::Equal);
                match order.direction {
                    Direction::Asc => by_field.then(ia.cmp(ib)),
                    Direction::Desc => by_field.reverse().then(ib.cmp(ia)),
                }
            });
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        matched
            .into_iter()
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect()
    }
}

/// Compare two JSON scalars; `None` when the types are not comparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": "a", "coins": 10, "created_at": "2026-01-01T00:00:00.5Z"}),
            json!({"id": "b", "coins": 30, "created_at": "2026-01-01T00:00:00.123456Z"}),
            json!({"id": "c", "coins": 20, "created_at": "2026-01-01T00:00:01Z"}),
        ]
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn timestamps_order_chronologically() {
        let rows = rows();
        let result = Query::new()
            .order_by("created_at", Direction::Desc)
            .apply(&rows);
        assert_eq!(ids(&result), vec!["c", "a", "b"]);
    }

    #[test]
    fn predicates_are_conjunctive() {
        let rows = rows();
        let result = Query::new()
            .gt("coins", json!(10))
            .neq("id", json!("c"))
            .apply(&rows);
        assert_eq!(ids(&result), vec!["b"]);
    }

    #[test]
    fn descending_ties_prefer_latest_insert() {
        let rows = vec![
            json!({"id": "first", "at": "2026-01-01T00:00:00Z"}),
            json!({"id": "second", "at": "2026-01-01T00:00:00Z"}),
        ];
        let result = Query::new()
            .order_by("at", Direction::Desc)
            .limit(1)
            .apply(&rows);
        assert_eq!(ids(&result), vec!["second"]);
    }

    #[test]
    fn missing_field_only_equals_null() {
        let row = json!({"id": "x"});
        assert!(Filter::new().eq("phone_number", Value::Null).matches(&row));
        assert!(!Filter::new().eq("phone_number", json!("+91")).matches(&row));
        assert!(Filter::new().neq("phone_number", json!("+91")).matches(&row));
    }
}
