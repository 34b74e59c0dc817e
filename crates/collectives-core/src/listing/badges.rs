//! Field map of the badge listing

use std::cmp::Ordering;

use chrono::NaiveDate;
use collectives_shared::Pagination;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{parse_date, FilterOp, ListingParams, RawFilter, SortDir};
use crate::catalog::ActivityScope;
use crate::domain::Badge;
use crate::error::DomainError;
use crate::predicate::contains_ci;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeField {
    Name,
    Level,
    ExpirationDate,
    UserFullName,
    ActivityName,
}

impl BadgeField {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "name" => Some(BadgeField::Name),
            "level" => Some(BadgeField::Level),
            "expiration_date" => Some(BadgeField::ExpirationDate),
            "user.full_name" => Some(BadgeField::UserFullName),
            "activity_type.name" => Some(BadgeField::ActivityName),
            _ => None,
        }
    }
}

/// One typed conjunct of a badge query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeFilter {
    /// Badge kind tag
    KindIn(Vec<String>),
    LevelEq(i32),
    LevelAtLeast(i32),
    LevelBelow(i32),
    ExpiresOnOrAfter(NaiveDate),
    ExpiresBefore(NaiveDate),
    UserNameLike(String),
    ActivityNameLike(String),
}

impl BadgeFilter {
    fn parse(field: BadgeField, op: FilterOp, filter: &RawFilter) -> Result<Self, DomainError> {
        let unsupported = || {
            DomainError::BadRequest(format!(
                "filter type '{}' not supported on '{}'",
                op.as_str(),
                filter.field
            ))
        };
        let level = |raw: &str| {
            raw.trim()
                .parse::<i32>()
                .map_err(|_| DomainError::BadRequest(format!("invalid level '{}'", raw)))
        };
        match field {
            BadgeField::Name => match op {
                FilterOp::Eq | FilterOp::In => {
                    let kinds = filter.values_for(op);
                    if kinds.is_empty() {
                        return Err(DomainError::BadRequest("name filter has no value".into()));
                    }
                    Ok(BadgeFilter::KindIn(kinds))
                }
                _ => Err(unsupported()),
            },
            BadgeField::Level => {
                let value = level(filter.single_value()?)?;
                match op {
                    FilterOp::Eq => Ok(BadgeFilter::LevelEq(value)),
                    FilterOp::Gt => Ok(BadgeFilter::LevelAtLeast(value)),
                    FilterOp::Lt => Ok(BadgeFilter::LevelBelow(value)),
                    _ => Err(unsupported()),
                }
            }
            BadgeField::ExpirationDate => {
                let date = parse_date(filter.single_value()?)?;
                match op {
                    FilterOp::Gt | FilterOp::Eq => Ok(BadgeFilter::ExpiresOnOrAfter(date)),
                    FilterOp::Lt => Ok(BadgeFilter::ExpiresBefore(date)),
                    _ => Err(unsupported()),
                }
            }
            BadgeField::UserFullName => match op {
                FilterOp::Like | FilterOp::Eq => {
                    Ok(BadgeFilter::UserNameLike(filter.single_value()?.to_string()))
                }
                _ => Err(unsupported()),
            },
            BadgeField::ActivityName => match op {
                FilterOp::Like | FilterOp::Eq => {
                    Ok(BadgeFilter::ActivityNameLike(filter.single_value()?.to_string()))
                }
                _ => Err(unsupported()),
            },
        }
    }

    pub fn matches(&self, row: &BadgeRow) -> bool {
        match self {
            BadgeFilter::KindIn(tags) => tags.iter().any(|t| t == row.badge.kind.tag()),
            BadgeFilter::LevelEq(level) => row.badge.kind.level() == Some(*level),
            BadgeFilter::LevelAtLeast(level) => row.badge.kind.level().is_some_and(|l| l >= *level),
            BadgeFilter::LevelBelow(level) => row.badge.kind.level().is_some_and(|l| l < *level),
            BadgeFilter::ExpiresOnOrAfter(date) => row.badge.expiration_date >= *date,
            BadgeFilter::ExpiresBefore(date) => row.badge.expiration_date < *date,
            BadgeFilter::UserNameLike(needle) => contains_ci(&row.user_full_name, needle),
            BadgeFilter::ActivityNameLike(needle) => {
                row.activity_name.as_deref().is_some_and(|name| contains_ci(name, needle))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeSortField {
    #[default]
    ExpirationDate,
    Name,
    UserFullName,
}

/// Badge joined with the names shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeRow {
    pub badge: Badge,
    pub user_full_name: String,
    pub activity_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeQuery {
    pub filters: Vec<BadgeFilter>,
    /// Activities whose badges may be listed; badges without an activity
    /// need [`ActivityScope::All`].
    pub scope: ActivityScope,
    pub sort_field: BadgeSortField,
    pub sort_dir: SortDir,
    pub pagination: Pagination,
}

impl BadgeQuery {
    pub fn from_params(params: &ListingParams, scope: ActivityScope) -> Result<Self, DomainError> {
        let mut filters = Vec::new();
        for filter in &params.filters {
            let Some(field) = BadgeField::from_wire(&filter.field) else {
                debug!(field = %filter.field, "ignoring unknown badge filter field");
                continue;
            };
            filters.push(BadgeFilter::parse(field, FilterOp::parse(&filter.op)?, filter)?);
        }

        let (sort_field, sort_dir) = match &params.sorter {
            Some(sorter) => {
                let field = match sorter.field.as_str() {
                    "expiration_date" => BadgeSortField::ExpirationDate,
                    "name" => BadgeSortField::Name,
                    "user.full_name" => BadgeSortField::UserFullName,
                    _ => BadgeSortField::default(),
                };
                (field, SortDir::parse(&sorter.dir)?)
            }
            None => (BadgeSortField::default(), SortDir::Asc),
        };

        Ok(Self {
            filters,
            scope,
            sort_field,
            sort_dir,
            pagination: params.pagination()?,
        })
    }

    pub fn in_scope(&self, activity_id: Option<&Uuid>) -> bool {
        match (&self.scope, activity_id) {
            (ActivityScope::All, _) => true,
            (ActivityScope::Only(ids), Some(activity)) => ids.contains(activity),
            (ActivityScope::Only(_), None) => false,
        }
    }

    pub fn matches(&self, row: &BadgeRow) -> bool {
        self.in_scope(row.badge.activity_id.as_ref()) && self.filters.iter().all(|f| f.matches(row))
    }

    pub fn compare(&self, a: &BadgeRow, b: &BadgeRow) -> Ordering {
        let primary = match self.sort_field {
            BadgeSortField::ExpirationDate => a.badge.expiration_date.cmp(&b.badge.expiration_date),
            BadgeSortField::Name => a.badge.kind.tag().cmp(b.badge.kind.tag()),
            BadgeSortField::UserFullName => a.user_full_name.cmp(&b.user_full_name),
        };
        self.sort_dir.apply(primary).then_with(|| a.badge.id.cmp(&b.badge.id))
    }
}
