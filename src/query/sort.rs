use super::types::{SortDirection, SortKey};

/// Parses a comma- or space-separated sort list; a `-` prefix flips the
/// field to descending. `"price,-ratings_average"` and
/// `"price -ratings_average"` are equivalent.
pub fn parse(spec: &str) -> Vec<SortKey> {
    spec.split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            let (column, direction) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if column.is_empty() {
                return None;
            }
            Some(SortKey {
                column: column.to_string(),
                direction,
            })
        })
        .collect()
}

pub fn render(keys: &[SortKey]) -> String {
    if keys.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = keys
        .iter()
        .map(|key| format!("\"{}\" {}", key.column, key.direction.to_sql()))
        .collect();
    format!("ORDER BY {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list_with_descending_prefix() {
        let keys = parse("price,-ratings_average");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].column, "price");
        assert_eq!(keys[0].direction, SortDirection::Asc);
        assert_eq!(keys[1].column, "ratings_average");
        assert_eq!(keys[1].direction, SortDirection::Desc);
    }

    #[test]
    fn space_separated_list_is_accepted() {
        let keys = parse("price -ratings_average");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].direction, SortDirection::Desc);
    }

    #[test]
    fn empty_tokens_are_skipped() {
        assert!(parse(" , ,").is_empty());
        assert!(parse("-").is_empty());
    }

    #[test]
    fn renders_order_by_clause() {
        let keys = parse("-created_at,name");
        assert_eq!(render(&keys), "ORDER BY \"created_at\" DESC, \"name\" ASC");
        assert_eq!(render(&[]), "");
    }
}
