use serde_json::Value;

use super::sort;
use super::types::{
    CompareOp, FilterCondition, QueryParams, SortDirection, SortKey, SqlResult, DEFAULT_LIMIT,
    VERSION_COLUMN,
};
use super::where_clause;

/// Builds one list retrieval from raw query parameters.
///
/// Stages mirror the request surface: `filter` for `field[op]=value` pairs,
/// `sort` for `sort=a,-b`, `set_field` for `fields=a,b`, `paginate` for
/// `page`/`limit`. Each stage mutates the builder and hands it back for
/// chaining; the builder itself never fails on user input. Scoped base
/// predicates (parent ids, soft-delete flags) are composed ahead of
/// caller-supplied filters and cannot be overridden by them.
#[derive(Debug, Clone)]
pub struct ListQuery {
    table: &'static str,
    columns: &'static [&'static str],
    base: Vec<FilterCondition>,
    conditions: Vec<FilterCondition>,
    sort_keys: Vec<SortKey>,
    projection: Option<Vec<String>>,
    page: i64,
    limit: i64,
}

impl ListQuery {
    pub fn new(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            table,
            columns,
            base: vec![],
            conditions: vec![],
            sort_keys: vec![],
            projection: None,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Adds a fixed equality predicate ahead of any caller filters.
    pub fn scope_eq(&mut self, column: &str, value: Value) -> &mut Self {
        self.base.push(FilterCondition {
            column: column.to_string(),
            op: CompareOp::Eq,
            value,
        });
        self
    }

    pub fn filter(&mut self, params: &QueryParams) -> &mut Self {
        self.conditions = where_clause::parse_filters(params);
        self
    }

    pub fn sort(&mut self, params: &QueryParams) -> &mut Self {
        if let Some(spec) = params.get("sort") {
            self.sort_keys = sort::parse(spec);
        }
        self
    }

    /// Inclusion projection from `fields=a,b`. Names that are not columns of
    /// the entity are dropped rather than surfacing as SQL errors; with no
    /// usable projection the default applies: every column except the
    /// internal version column.
    pub fn set_field(&mut self, params: &QueryParams) -> &mut Self {
        if let Some(spec) = params.get("fields") {
            let requested: Vec<String> = spec
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .filter(|name| !name.is_empty() && self.columns.contains(name))
                .map(str::to_string)
                .collect();
            if !requested.is_empty() {
                self.projection = Some(requested);
            }
        }
        self
    }

    pub fn paginate(&mut self, params: &QueryParams) -> &mut Self {
        self.page = parse_positive(params.get("page")).unwrap_or(1);
        self.limit = parse_positive(params.get("limit")).unwrap_or(DEFAULT_LIMIT);
        self
    }

    /// Runs all four stages in request order.
    pub fn apply(&mut self, params: &QueryParams) -> &mut Self {
        self.filter(params).sort(params).set_field(params).paginate(params)
    }

    pub fn to_sql(&self) -> SqlResult {
        let select_clause = self.select_columns().join(", ");
        let (where_clause, params) = self.render_where();
        let order_clause = sort::render(&self.effective_sort());
        let offset = (self.page - 1) * self.limit;

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table),
            where_clause,
            order_clause,
            format!("LIMIT {} OFFSET {}", self.limit, offset),
        ]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    fn select_columns(&self) -> Vec<String> {
        match &self.projection {
            Some(fields) => fields.iter().map(|c| format!("\"{}\"", c)).collect(),
            None => self
                .columns
                .iter()
                .filter(|c| **c != VERSION_COLUMN)
                .map(|c| format!("\"{}\"", c))
                .collect(),
        }
    }

    fn render_where(&self) -> (String, Vec<Value>) {
        let (mut fragments, mut params) = where_clause::render(&self.base, 0);
        let (caller_fragments, caller_params) =
            where_clause::render(&self.conditions, params.len());
        fragments.extend(caller_fragments);
        params.extend(caller_params);
        if fragments.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", fragments.join(" AND ")), params)
        }
    }

    fn effective_sort(&self) -> Vec<SortKey> {
        if self.sort_keys.is_empty() {
            vec![SortKey {
                column: "created_at".to_string(),
                direction: SortDirection::Desc,
            }]
        } else {
            self.sort_keys.clone()
        }
    }
}

fn parse_positive(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &[
        "id",
        "name",
        "price",
        "difficulty",
        "ratings_average",
        "created_at",
        "lock_version",
    ];

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reserved_only_params_yield_defaults() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("page", "1"), ("sort", ""), ("limit", ""), ("fields", "")]));
        let sql = q.to_sql();
        assert_eq!(
            sql.query,
            "SELECT \"id\", \"name\", \"price\", \"difficulty\", \"ratings_average\", \
             \"created_at\" FROM \"tours\" ORDER BY \"created_at\" DESC LIMIT 100 OFFSET 0"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn version_column_is_excluded_by_default() {
        let q = ListQuery::new("tours", COLUMNS);
        let sql = q.to_sql();
        assert!(!sql.query.contains("lock_version"));
    }

    #[test]
    fn gte_filter_becomes_comparison() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("price[gte]", "100")]));
        let sql = q.to_sql();
        assert!(sql.query.contains("WHERE \"price\" >= $1"));
        assert_eq!(sql.params, vec![json!(100)]);
    }

    #[test]
    fn closed_range_on_one_field() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("price[gte]", "100"), ("price[lte]", "500")]));
        let sql = q.to_sql();
        assert!(sql
            .query
            .contains("WHERE \"price\" >= $1 AND \"price\" <= $2"));
        assert_eq!(sql.params, vec![json!(100), json!(500)]);
    }

    #[test]
    fn pagination_window() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("page", "2"), ("limit", "10")]));
        assert!(q.to_sql().query.ends_with("LIMIT 10 OFFSET 10"));
    }

    #[test]
    fn non_numeric_pagination_falls_back_to_defaults() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("page", "x"), ("limit", "-5")]));
        assert!(q.to_sql().query.ends_with("LIMIT 100 OFFSET 0"));
    }

    #[test]
    fn explicit_sort_overrides_default() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("sort", "price,-ratings_average")]));
        assert!(q
            .to_sql()
            .query
            .contains("ORDER BY \"price\" ASC, \"ratings_average\" DESC"));
    }

    #[test]
    fn projection_keeps_only_known_columns() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("fields", "name,price,bogus")]));
        let sql = q.to_sql();
        assert!(sql.query.starts_with("SELECT \"name\", \"price\" FROM"));
    }

    #[test]
    fn scope_precedes_caller_filters() {
        let mut q = ListQuery::new("tours", COLUMNS);
        q.scope_eq("secret_tour", json!(false));
        q.apply(&params(&[("difficulty", "easy")]));
        let sql = q.to_sql();
        assert!(sql
            .query
            .contains("WHERE \"secret_tour\" = $1 AND \"difficulty\" = $2"));
        assert_eq!(sql.params, vec![json!(false), json!("easy")]);
    }

    #[test]
    fn unknown_field_filters_pass_through() {
        // Deliberate: an unknown field reaches the database untouched and
        // matches nothing rather than erroring at the builder.
        let mut q = ListQuery::new("tours", COLUMNS);
        q.apply(&params(&[("nonexistent", "x")]));
        assert!(q.to_sql().query.contains("\"nonexistent\" = $1"));
    }
}
