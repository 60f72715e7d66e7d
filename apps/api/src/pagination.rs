//! `$limit` / `$skip` / `$sort` query parameters and the paged response body.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Paging parameters. `$sort` accepts `-field` / `field` (comma-separated
/// for several keys) and the bracket form `$sort[field]=1|-1`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Vec<(String, String)>")]
pub struct PageParams {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub sort: Option<String>,
}

impl TryFrom<Vec<(String, String)>> for PageParams {
    type Error = String;

    fn try_from(pairs: Vec<(String, String)>) -> Result<Self, Self::Error> {
        let mut params = PageParams::default();
        let mut keys = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                "$limit" => params.limit = Some(parse_number("$limit", &value)?),
                "$skip" => params.skip = Some(parse_number("$skip", &value)?),
                "$sort" => keys.push(value),
                _ => {
                    let Some(field) = key
                        .strip_prefix("$sort[")
                        .and_then(|rest| rest.strip_suffix(']'))
                    else {
                        continue;
                    };
                    match value.trim() {
                        "-1" | "desc" => keys.push(format!("-{field}")),
                        "1" | "asc" => keys.push(field.to_string()),
                        other => return Err(format!("{key} has an invalid direction '{other}'")),
                    }
                }
            }
        }

        if !keys.is_empty() {
            params.sort = Some(keys.join(","));
        }
        Ok(params)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{key} must be an integer, got '{raw}'"))
}

/// `createdAt` → `created_at`.
fn snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: i64,
    pub limit: i64,
    pub skip: i64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            limit: self.limit,
            skip: self.skip,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    pub fn empty(window: &Window) -> Self {
        Page {
            total: 0,
            limit: window.limit,
            skip: window.skip,
            data: Vec::new(),
        }
    }
}

/// Resolved LIMIT / OFFSET / ORDER BY for one list query.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub limit: i64,
    pub skip: i64,
    pub order_by: String,
}

impl PageParams {
    /// Clamps the window and resolves `$sort` against `sortable`, a list of
    /// `(field, column)` pairs. Unknown sort fields fall back to `default_order`.
    pub fn window(&self, sortable: &[(&str, &str)], default_order: &str) -> Window {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let skip = self.skip.unwrap_or(0).max(0);

        let order_by = self
            .sort
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|part| {
                        let part = part.trim();
                        let (field, desc) = match part.strip_prefix('-') {
                            Some(rest) => (rest, true),
                            None => (part.strip_prefix('+').unwrap_or(part), false),
                        };
                        let field = snake_case(field);
                        sortable
                            .iter()
                            .find(|(name, _)| *name == field)
                            .map(|(_, column)| {
                                format!("{column} {}", if desc { "DESC" } else { "ASC" })
                            })
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|columns| !columns.is_empty())
            .map(|columns| columns.join(", "))
            .unwrap_or_else(|| default_order.to_string());

        Window {
            limit,
            skip,
            order_by,
        }
    }
}

/// Runs a count query and a windowed select built from the same filters.
pub async fn fetch_page<'a, T>(
    pool: &PgPool,
    mut count: QueryBuilder<'a, Postgres>,
    mut select: QueryBuilder<'a, Postgres>,
    window: &Window,
) -> Result<Page<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    select.push(" ORDER BY ");
    select.push(&window.order_by);
    select.push(" LIMIT ");
    select.push_bind(window.limit);
    select.push(" OFFSET ");
    select.push_bind(window.skip);

    let data = select.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page {
        total,
        limit: window.limit,
        skip: window.skip,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTABLE: &[(&str, &str)] = &[("created_at", "j.created_at"), ("title", "j.title")];

    #[test]
    fn test_defaults() {
        let w = PageParams::default().window(SORTABLE, "j.created_at DESC");
        assert_eq!(w.limit, 10);
        assert_eq!(w.skip, 0);
        assert_eq!(w.order_by, "j.created_at DESC");
    }

    #[test]
    fn test_limit_is_clamped() {
        let params = PageParams {
            limit: Some(500),
            skip: Some(-3),
            sort: None,
        };
        let w = params.window(SORTABLE, "j.created_at DESC");
        assert_eq!(w.limit, MAX_LIMIT);
        assert_eq!(w.skip, 0);

        let zero = PageParams {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.window(SORTABLE, "x").limit, 1);
    }

    #[test]
    fn test_sort_direction_and_whitelist() {
        let desc = PageParams {
            sort: Some("-title".into()),
            ..Default::default()
        };
        assert_eq!(desc.window(SORTABLE, "d").order_by, "j.title DESC");

        let asc = PageParams {
            sort: Some("title".into()),
            ..Default::default()
        };
        assert_eq!(asc.window(SORTABLE, "d").order_by, "j.title ASC");

        let injected = PageParams {
            sort: Some("title; DROP TABLE users".into()),
            ..Default::default()
        };
        assert_eq!(injected.window(SORTABLE, "d").order_by, "d");
    }

    #[test]
    fn test_query_string_names() {
        let uri: axum::http::Uri = "/api/v1/job-listings?$limit=5&$skip=20&$sort=-created_at"
            .parse()
            .unwrap();
        let axum::extract::Query(params) =
            axum::extract::Query::<PageParams>::try_from_uri(&uri).unwrap();
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.skip, Some(20));
        assert_eq!(params.sort.as_deref(), Some("-created_at"));
    }

    fn from_query(query: &str) -> PageParams {
        let uri: axum::http::Uri = format!("/x?{query}").parse().unwrap();
        axum::extract::Query::<PageParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_bracket_sort_form() {
        let asc = from_query("%24sort%5Bcreated_at%5D=1");
        assert_eq!(
            asc.window(&[("created_at", "j.created_at")], "j.expires_at ASC").order_by,
            "j.created_at ASC"
        );

        let desc = from_query("%24sort%5BcreatedAt%5D=-1&%24limit=20");
        assert_eq!(desc.limit, Some(20));
        assert_eq!(desc.window(SORTABLE, "d").order_by, "j.created_at DESC");
    }

    #[test]
    fn test_camel_case_and_several_keys() {
        let params = from_query("$sort=-title,createdAt");
        assert_eq!(
            params.window(SORTABLE, "d").order_by,
            "j.title DESC, j.created_at ASC"
        );

        let unknown = from_query("%24sort%5BrenewalRequestedAt%5D=-1&%24sort%5Btitle%5D=1");
        assert_eq!(unknown.window(SORTABLE, "d").order_by, "j.title ASC");
    }

    #[test]
    fn test_other_query_keys_are_ignored() {
        let params = from_query("status=active&q=rust&$skip=10");
        assert_eq!(params.skip, Some(10));
        assert_eq!(params.sort, None);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for query in ["%24limit=ten", "%24sort%5Btitle%5D=up"] {
            let uri: axum::http::Uri = format!("/x?{query}").parse().unwrap();
            assert!(axum::extract::Query::<PageParams>::try_from_uri(&uri).is_err());
        }
    }
}
