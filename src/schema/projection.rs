//! Field projections
//!
//! A projection is a list of dot-paths. An empty list selects every column.
//! `"address.city"` selects the `address` column and, one level down, only
//! its `city` column.

/// Returns true if the column is selected by the projection
pub fn is_visible<S: AsRef<str>>(column: &str, fields: &[S]) -> bool {
    fields.is_empty()
        || fields.iter().any(|field| {
            let field = field.as_ref();
            field == column
                || field
                    .strip_prefix(column)
                    .map_or(false, |rest| rest.starts_with('.'))
        })
}

/// Sub-paths of the projection below the given column
///
/// Selecting the column itself selects all of its nested columns, so the
/// result is empty in that case.
pub fn nested_fields<S: AsRef<str>>(column: &str, fields: &[S]) -> Vec<String> {
    if fields.iter().any(|field| field.as_ref() == column) {
        return Vec::new();
    }
    fields
        .iter()
        .filter_map(|field| {
            field
                .as_ref()
                .strip_prefix(column)
                .and_then(|rest| rest.strip_prefix('.'))
        })
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_empty_projection_selects_all() {
        assert!(is_visible("name", &NONE));
    }

    #[test]
    fn test_exact_and_prefixed_match() {
        let fields = ["name", "address.city"];
        assert!(is_visible("name", &fields));
        assert!(is_visible("address", &fields));
        assert!(!is_visible("email", &fields));
        assert!(!is_visible("addr", &fields));
        assert!(!is_visible("address.city.zip", &["address"]));
    }

    #[test]
    fn test_prefix_is_not_a_sibling_match() {
        assert!(!is_visible("address", &["addresses"]));
        assert!(!is_visible("address", &["addresses.city"]));
    }

    #[test]
    fn test_nested_fields() {
        let fields = ["name", "address.city", "address.geo.lat"];
        assert_eq!(nested_fields("address", &fields), vec!["city", "geo.lat"]);
        assert!(nested_fields("name", &fields).is_empty());
        assert!(nested_fields("email", &fields).is_empty());
    }

    #[test]
    fn test_whole_column_selects_all_nested() {
        let fields = ["address", "address.city"];
        assert!(nested_fields("address", &fields).is_empty());
    }
}
