// ============================================================================
// Collectives Core - Query-parameter Driven Listing
// File: crates/collectives-core/src/listing/mod.rs
// ============================================================================
//! Uniform filter/sort/paginate contract of the tabular endpoints.
//!
//! Query strings use the `filters[i][field|value|type]`,
//! `sorters[0][field|dir]`, `page` and `size` keys. [`ListingParams`] only
//! collects them; each listing then maps field names through its own
//! enumerated field set, dropping unknown fields and rejecting malformed
//! values of known ones.

pub mod badges;
pub mod events;

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use collectives_shared::constants::DEFAULT_PAGE_SIZE;
use collectives_shared::Pagination;

use crate::error::DomainError;

pub use badges::{BadgeField, BadgeFilter, BadgeQuery, BadgeSortField};
pub use events::{EventField, EventQuery, EventSort, EventSortField, StatusFilter, UserEventQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Like,
    In,
    Gt,
    Lt,
}

impl FilterOp {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Ne),
            "like" => Ok(FilterOp::Like),
            "in" => Ok(FilterOp::In),
            ">" => Ok(FilterOp::Gt),
            "<" => Ok(FilterOp::Lt),
            other => Err(DomainError::BadRequest(format!("unknown filter type '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Like => "like",
            FilterOp::In => "in",
            FilterOp::Gt => ">",
            FilterOp::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "" => Ok(SortDir::Asc),
            "desc" => Ok(SortDir::Desc),
            other => Err(DomainError::BadRequest(format!("unknown sort direction '{}'", other))),
        }
    }

    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    }
}

/// One `filters[i]` entry as received
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilter {
    pub field: String,
    pub op: String,
    pub values: Vec<String>,
}

impl RawFilter {
    /// Values of the filter, splitting comma-separated lists for `in`.
    pub fn values_for(&self, op: FilterOp) -> Vec<String> {
        let values: Vec<String> = if op == FilterOp::In {
            self.values
                .iter()
                .flat_map(|v| v.split(','))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        } else {
            self.values.clone()
        };
        values
    }

    pub fn single_value(&self) -> Result<&str, DomainError> {
        match self.values.as_slice() {
            [value] => Ok(value.as_str()),
            _ => Err(DomainError::BadRequest(format!(
                "filter on '{}' expects exactly one value",
                self.field
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSorter {
    pub field: String,
    pub dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingParams {
    pub filters: Vec<RawFilter>,
    pub sorter: Option<RawSorter>,
    pub page: Option<String>,
    pub size: Option<String>,
}

enum ParamKey {
    Page,
    Size,
    Filter(usize, String),
    Sorter(usize, String),
}

fn parse_key(key: &str) -> Option<ParamKey> {
    match key {
        "page" => return Some(ParamKey::Page),
        "size" => return Some(ParamKey::Size),
        _ => {}
    }
    let (prefix, rest) = key.split_once('[')?;
    let (index, rest) = rest.split_once(']')?;
    let index: usize = index.parse().ok()?;
    let attribute = rest.strip_prefix('[')?.split(']').next()?.to_string();
    match prefix {
        "filters" => Some(ParamKey::Filter(index, attribute)),
        "sorters" => Some(ParamKey::Sorter(index, attribute)),
        _ => None,
    }
}

impl ListingParams {
    /// Collects listing parameters from decoded query-string pairs. Keys
    /// outside the contract are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = ListingParams::default();
        let mut filters: BTreeMap<usize, RawFilter> = BTreeMap::new();
        let mut sorters: BTreeMap<usize, RawSorter> = BTreeMap::new();

        for (key, value) in pairs {
            let value: String = value.into();
            match parse_key(key.as_ref()) {
                Some(ParamKey::Page) => params.page = Some(value),
                Some(ParamKey::Size) => params.size = Some(value),
                Some(ParamKey::Filter(i, attribute)) => {
                    let filter = filters.entry(i).or_default();
                    match attribute.as_str() {
                        "field" => filter.field = value,
                        "type" => filter.op = value,
                        "value" => filter.values.push(value),
                        _ => {}
                    }
                }
                Some(ParamKey::Sorter(i, attribute)) => {
                    let sorter = sorters.entry(i).or_default();
                    match attribute.as_str() {
                        "field" => sorter.field = value,
                        "dir" => sorter.dir = value,
                        _ => {}
                    }
                }
                None => {}
            }
        }

        params.filters = filters.into_values().filter(|f| !f.field.is_empty()).collect();
        // Only the first sorter is honoured
        params.sorter = sorters.into_values().find(|s| !s.field.is_empty());
        params
    }

    pub fn pagination(&self) -> Result<Pagination, DomainError> {
        let parse = |name: &str, raw: &Option<String>, default: u32| -> Result<u32, DomainError> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(default),
                Some(value) => value
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadRequest(format!("{} must be a positive integer", name))),
            }
        };
        let page = parse("page", &self.page, 1)?;
        let size = parse("size", &self.size, DEFAULT_PAGE_SIZE)?;
        Ok(Pagination::new(page, size))
    }
}

/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DDTHH:MM[:SS]` and the same with a space.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, DomainError> {
    let raw = raw.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(value);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DomainError::BadRequest(format!("invalid date '{}'", raw)))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DomainError> {
    parse_datetime(raw).map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_groups_filters_by_index() {
        let params = ListingParams::from_pairs(vec![
            ("filters[1][field]", "status"),
            ("filters[0][field]", "title"),
            ("filters[0][value]", "moine"),
            ("filters[0][type]", "like"),
            ("filters[1][value][]", "confirmed"),
            ("filters[1][value][]", "cancelled"),
            ("filters[1][type]", "in"),
            ("sorters[0][field]", "end"),
            ("sorters[0][dir]", "desc"),
            ("sorters[1][field]", "title"),
            ("page", "2"),
            ("utm_source", "newsletter"),
        ]);
        assert_eq!(params.filters.len(), 2);
        assert_eq!(params.filters[0].field, "title");
        assert_eq!(params.filters[1].values, vec!["confirmed", "cancelled"]);
        assert_eq!(params.sorter.as_ref().map(|s| s.field.as_str()), Some("end"));
        assert_eq!(params.pagination().unwrap(), Pagination::new(2, 25));
    }

    #[test]
    fn test_malformed_page_is_bad_request() {
        let params = ListingParams::from_pairs(vec![("page", "two")]);
        assert!(matches!(params.pagination(), Err(DomainError::BadRequest(_))));
    }

    #[test]
    fn test_in_values_split_on_commas() {
        let filter = RawFilter {
            field: "tags".into(),
            op: "in".into(),
            values: vec!["a, b".into(), "c".into()],
        };
        assert_eq!(filter.values_for(FilterOp::In), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2026-10-16").is_ok());
        assert!(parse_datetime("2026-10-16T08:30").is_ok());
        assert!(parse_datetime("2026-10-16 08:30:00").is_ok());
        assert!(matches!(parse_datetime("16/10/2026"), Err(DomainError::BadRequest(_))));
    }

    #[test]
    fn test_unknown_filter_type_rejected() {
        assert!(FilterOp::parse("~=").is_err());
        assert_eq!(FilterOp::parse("LIKE").unwrap(), FilterOp::Like);
    }
}
