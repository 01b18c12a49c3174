use serde_json::Value;

use super::types::{CompareOp, FilterCondition, QueryParams, RESERVED_KEYS};

/// Translates raw query parameters into filter conditions.
///
/// `price[gte]=100` parses to (price, >=, 100); a bare `difficulty=easy` is
/// an equality. Field names are taken as-is: an unknown field reaches the
/// database and simply matches nothing, which is the documented behavior.
pub fn parse_filters(params: &QueryParams) -> Vec<FilterCondition> {
    let mut conditions: Vec<FilterCondition> = params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, raw)| match split_bracketed(key) {
            Some((field, op)) => FilterCondition {
                column: field.to_string(),
                op,
                value: coerce_scalar(raw),
            },
            None => FilterCondition {
                column: key.clone(),
                op: CompareOp::Eq,
                value: coerce_scalar(raw),
            },
        })
        .collect();

    // HashMap iteration order is arbitrary; keep the output deterministic.
    conditions.sort_by(|a, b| a.column.cmp(&b.column).then(a.op.cmp(&b.op)));
    conditions
}

/// `price[gte]` -> (price, Gte). An unrecognized operator suffix falls
/// through to equality on the raw key, which matches no column downstream.
fn split_bracketed(key: &str) -> Option<(&str, CompareOp)> {
    let open = key.find('[')?;
    let field = &key[..open];
    let rest = key[open + 1..].strip_suffix(']')?;
    if field.is_empty() {
        return None;
    }
    CompareOp::parse(rest).map(|op| (field, op))
}

/// Query-string values arrive as text; comparisons against numeric and
/// boolean columns need typed bind parameters.
pub fn coerce_scalar(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Renders conditions into `"column" op $n` fragments, numbering parameters
/// from `start_index + 1`.
pub fn render(
    conditions: &[FilterCondition],
    start_index: usize,
) -> (Vec<String>, Vec<Value>) {
    let mut fragments = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());
    for condition in conditions {
        params.push(condition.value.clone());
        fragments.push(format!(
            "\"{}\" {} ${}",
            condition.column,
            condition.op.to_sql(),
            start_index + params.len()
        ));
    }
    (fragments, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reserved_keys_never_become_filters() {
        let p = params(&[("page", "2"), ("sort", "price"), ("limit", "10"), ("fields", "name")]);
        assert!(parse_filters(&p).is_empty());
    }

    #[test]
    fn bracketed_operator_parses_to_comparison() {
        let p = params(&[("price[gte]", "100")]);
        let conditions = parse_filters(&p);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].column, "price");
        assert_eq!(conditions[0].op, CompareOp::Gte);
        assert_eq!(conditions[0].value, json!(100));
    }

    #[test]
    fn bare_key_is_equality() {
        let p = params(&[("difficulty", "easy")]);
        let conditions = parse_filters(&p);
        assert_eq!(conditions[0].op, CompareOp::Eq);
        assert_eq!(conditions[0].value, json!("easy"));
    }

    #[test]
    fn scalar_coercion() {
        assert_eq!(coerce_scalar("100"), json!(100));
        assert_eq!(coerce_scalar("4.5"), json!(4.5));
        assert_eq!(coerce_scalar("true"), json!(true));
        assert_eq!(coerce_scalar("easy"), json!("easy"));
    }

    #[test]
    fn closed_range_renders_both_bounds() {
        let p = params(&[("price[gte]", "100"), ("price[lte]", "500")]);
        let conditions = parse_filters(&p);
        let (fragments, bound) = render(&conditions, 0);
        assert_eq!(fragments, vec!["\"price\" >= $1", "\"price\" <= $2"]);
        assert_eq!(bound, vec![json!(100), json!(500)]);
    }

    #[test]
    fn param_numbering_continues_from_start_index() {
        let p = params(&[("duration", "5")]);
        let conditions = parse_filters(&p);
        let (fragments, _) = render(&conditions, 2);
        assert_eq!(fragments, vec!["\"duration\" = $3"]);
    }
}
