//! Query predicates.
//!
//! A small AST over top-level payload fields. The memory backend evaluates
//! it directly; the SQL backend compiles it to parameterized `data->>`
//! comparisons. Tenant and soft-delete filtering are NOT expressed here:
//! the gate applies those unconditionally before any predicate runs.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    Lt(String, Value),
    Gt(String, Value),
    /// SQL LIKE semantics: `%` any run, `_` any single character.
    Like(String, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Ne(field.to_string(), value.into())
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    /// Evaluate against a record payload (a JSON object).
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(field, value) => data.get(field) == Some(value),
            Predicate::Ne(field, value) => data.get(field) != Some(value),
            Predicate::In(field, values) => data
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Predicate::Lt(field, value) => compare(data.get(field), value)
                .map(|ord| ord == std::cmp::Ordering::Less)
                .unwrap_or(false),
            Predicate::Gt(field, value) => compare(data.get(field), value)
                .map(|ord| ord == std::cmp::Ordering::Greater)
                .unwrap_or(false),
            Predicate::Like(field, pattern) => data
                .get(field)
                .and_then(Value::as_str)
                .map(|s| like_match(s, pattern))
                .unwrap_or(false),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(data)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(data)),
        }
    }
}

fn compare(lhs: Option<&Value>, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs?, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Iterative LIKE matcher with backtracking on `%`.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_and_ne() {
        let data = json!({"name": "Acme", "tier": 2});
        assert!(Predicate::eq("name", "Acme").matches(&data));
        assert!(!Predicate::eq("name", "Other").matches(&data));
        assert!(Predicate::ne("tier", 3).matches(&data));
        // Missing field never equals anything.
        assert!(!Predicate::eq("missing", "x").matches(&data));
    }

    #[test]
    fn in_and_ranges() {
        let data = json!({"tier": 2, "code": "INV-5"});
        assert!(Predicate::In("tier".into(), vec![json!(1), json!(2)]).matches(&data));
        assert!(Predicate::Lt("tier".into(), json!(3)).matches(&data));
        assert!(Predicate::Gt("tier".into(), json!(1)).matches(&data));
        assert!(!Predicate::Gt("tier".into(), json!(2)).matches(&data));
    }

    #[test]
    fn like_patterns() {
        let data = json!({"code": "INV-2026-000042"});
        assert!(Predicate::Like("code".into(), "INV-%".into()).matches(&data));
        assert!(Predicate::Like("code".into(), "%000042".into()).matches(&data));
        assert!(Predicate::Like("code".into(), "INV-____-%".into()).matches(&data));
        assert!(!Predicate::Like("code".into(), "CRN-%".into()).matches(&data));
    }

    #[test]
    fn boolean_composition() {
        let data = json!({"name": "Acme", "tier": 2});
        let p = Predicate::and(vec![
            Predicate::eq("name", "Acme"),
            Predicate::Or(vec![Predicate::eq("tier", 1), Predicate::eq("tier", 2)]),
        ]);
        assert!(p.matches(&data));
    }
}
