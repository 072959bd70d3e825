//! Read descriptors
//!
//! A `Query` describes one filtered, ordered, paginated read against a
//! named collection. Gateway implementations translate it to their wire
//! format (or evaluate it directly for the in-memory store); callers build
//! it with the chained constructors below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Column equals value
    Eq(String, Value),
    /// Column is one of the given values
    In(String, Vec<Value>),
    /// Any of the (column, pattern) pairs matches case-insensitively;
    /// the pattern is a substring, `%` wrapping optional
    IlikeAny(Vec<(String, String)>),
    NotNull(String),
    IsNull(String),
}

/// Sort order for a read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// One read against a named collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    /// Comma-separated column list; `None` selects every column
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Query {
            table: name.to_string(),
            columns: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: Vec<V>) -> Self {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Match rows where any of the columns contains `pattern`,
    /// case-insensitively
    pub fn ilike_any(mut self, columns: &[&str], pattern: &str) -> Self {
        self.filters.push(Filter::IlikeAny(
            columns
                .iter()
                .map(|c| (c.to_string(), pattern.to_string()))
                .collect(),
        ));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::NotNull(column.to_string()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_accumulates_filters_in_order() {
        let query = Query::table("courses")
            .eq("category", "pedagogia")
            .ilike_any(&["title", "instructor"], "infantil")
            .order("title", true)
            .limit(3);

        assert_eq!(query.table, "courses");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(
            query.filters[0],
            Filter::Eq("category".into(), json!("pedagogia"))
        );
        assert_eq!(
            query.order,
            Some(OrderBy {
                column: "title".into(),
                ascending: true
            })
        );
        assert_eq!(query.limit, Some(3));
    }

    #[test]
    fn test_default_selects_every_column() {
        assert_eq!(Query::table("profiles").columns, None);
    }
}
