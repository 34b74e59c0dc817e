//! Field map of the event listings

use std::cmp::Ordering;

use collectives_shared::Pagination;
use tracing::debug;

use super::{parse_datetime, FilterOp, ListingParams, RawFilter, SortDir};
use crate::domain::{Event, EventStatus, RegistrationStatus};
use crate::error::DomainError;
use crate::predicate::{DateBound, EventPredicate};

/// Filterable event fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Title,
    Start,
    End,
    Status,
    EventType,
    ActivityTypes,
    Tags,
    Leaders,
}

impl EventField {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "title" => Some(EventField::Title),
            "start" => Some(EventField::Start),
            "end" => Some(EventField::End),
            "status" => Some(EventField::Status),
            "event_type" => Some(EventField::EventType),
            "activity_types" | "activity_type" => Some(EventField::ActivityTypes),
            "tags" => Some(EventField::Tags),
            "leaders" => Some(EventField::Leaders),
            _ => None,
        }
    }

    /// Builds the comparator of one filter on this field.
    pub fn predicate(&self, op: FilterOp, filter: &RawFilter) -> Result<EventPredicate, DomainError> {
        let unsupported = || {
            DomainError::BadRequest(format!(
                "filter type '{}' not supported on '{}'",
                op.as_str(),
                filter.field
            ))
        };
        let values = || {
            let values = filter.values_for(op);
            if values.is_empty() {
                Err(DomainError::BadRequest(format!("filter on '{}' has no value", filter.field)))
            } else {
                Ok(values)
            }
        };

        match self {
            EventField::Title => match op {
                FilterOp::Like => Ok(EventPredicate::TitleLike(filter.single_value()?.to_string())),
                FilterOp::Eq => Ok(EventPredicate::TitleEq(filter.single_value()?.to_string())),
                _ => Err(unsupported()),
            },
            EventField::Start | EventField::End => {
                let at = parse_datetime(filter.single_value()?)?;
                let bound = match op {
                    FilterOp::Gt | FilterOp::Eq => DateBound::AtLeast(at),
                    FilterOp::Lt => DateBound::Before(at),
                    _ => return Err(unsupported()),
                };
                Ok(if *self == EventField::Start {
                    EventPredicate::Start(bound)
                } else {
                    EventPredicate::End(bound)
                })
            }
            EventField::Status => {
                let statuses = values()?
                    .iter()
                    .map(|v| {
                        EventStatus::from_str(v)
                            .ok_or_else(|| DomainError::BadRequest(format!("unknown event status '{}'", v)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                match op {
                    FilterOp::Eq | FilterOp::In => Ok(EventPredicate::StatusIn(statuses)),
                    FilterOp::Ne => Ok(EventPredicate::StatusNotIn(statuses)),
                    _ => Err(unsupported()),
                }
            }
            EventField::EventType => match op {
                FilterOp::Eq | FilterOp::In => Ok(EventPredicate::EventTypeIn(values()?)),
                _ => Err(unsupported()),
            },
            EventField::ActivityTypes => match op {
                FilterOp::Eq | FilterOp::In => Ok(EventPredicate::ActivityShortNameIn(values()?)),
                _ => Err(unsupported()),
            },
            EventField::Tags => match op {
                FilterOp::Eq | FilterOp::In => Ok(EventPredicate::TagIn(values()?)),
                _ => Err(unsupported()),
            },
            EventField::Leaders => match op {
                FilterOp::Like | FilterOp::Eq => {
                    Ok(EventPredicate::LeaderNameLike(filter.single_value()?.to_string()))
                }
                _ => Err(unsupported()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSortField {
    Title,
    #[default]
    Start,
    End,
    Status,
}

impl EventSortField {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "title" => Some(EventSortField::Title),
            "start" => Some(EventSortField::Start),
            "end" => Some(EventSortField::End),
            "status" => Some(EventSortField::Status),
            _ => None,
        }
    }
}

/// Sort order; ties are always broken by event id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSort {
    pub field: EventSortField,
    pub dir: SortDir,
}

impl EventSort {
    pub fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let primary = match self.field {
            EventSortField::Title => a.title.cmp(&b.title),
            EventSortField::Start => a.start.cmp(&b.start),
            EventSortField::End => a.end.cmp(&b.end),
            EventSortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        self.dir.apply(primary).then_with(|| a.id.cmp(&b.id))
    }
}

/// Restriction on the joined registration of a user-event row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    In(Vec<RegistrationStatus>),
    NotIn(Vec<RegistrationStatus>),
}

impl StatusFilter {
    pub fn admits(&self, status: RegistrationStatus) -> bool {
        match self {
            StatusFilter::In(statuses) => statuses.contains(&status),
            StatusFilter::NotIn(statuses) => !statuses.contains(&status),
        }
    }
}

/// Typed event listing query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub predicate: EventPredicate,
    pub sort: EventSort,
    pub pagination: Pagination,
}

impl EventQuery {
    /// Parses user parameters. Unknown fields are dropped.
    pub fn from_params(params: &ListingParams) -> Result<Self, DomainError> {
        let (query, _) = parse(params, false)?;
        Ok(query)
    }

    /// Adds a conjunct, used to compose visibility and scoping.
    pub fn restrict(mut self, predicate: EventPredicate) -> Self {
        let current = std::mem::replace(&mut self.predicate, EventPredicate::True);
        self.predicate = EventPredicate::and(vec![predicate, current]);
        self
    }
}

/// Event listing joined with one user's registrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventQuery {
    pub events: EventQuery,
    pub registration_status: Option<StatusFilter>,
}

impl UserEventQuery {
    pub fn from_params(params: &ListingParams) -> Result<Self, DomainError> {
        let (events, registration_status) = parse(params, true)?;
        Ok(Self { events, registration_status })
    }
}

fn parse(
    params: &ListingParams,
    with_registration: bool,
) -> Result<(EventQuery, Option<StatusFilter>), DomainError> {
    let mut parts = Vec::new();
    let mut registration_status = None;

    for filter in &params.filters {
        if with_registration && filter.field == "registration.status" {
            registration_status = Some(registration_filter(filter)?);
            continue;
        }
        let Some(field) = EventField::from_wire(&filter.field) else {
            debug!(field = %filter.field, "ignoring unknown event filter field");
            continue;
        };
        let op = FilterOp::parse(&filter.op)?;
        parts.push(field.predicate(op, filter)?);
    }

    let sort = match &params.sorter {
        Some(sorter) => match EventSortField::from_wire(&sorter.field) {
            Some(field) => EventSort { field, dir: SortDir::parse(&sorter.dir)? },
            None => {
                debug!(field = %sorter.field, "unknown sort field, using default order");
                EventSort::default()
            }
        },
        None => EventSort::default(),
    };

    let query = EventQuery {
        predicate: EventPredicate::and(parts),
        sort,
        pagination: params.pagination()?,
    };
    Ok((query, registration_status))
}

fn registration_filter(filter: &RawFilter) -> Result<StatusFilter, DomainError> {
    let op = FilterOp::parse(&filter.op)?;
    let statuses = filter
        .values_for(op)
        .iter()
        .map(|v| {
            RegistrationStatus::from_str(v)
                .ok_or_else(|| DomainError::BadRequest(format!("unknown registration status '{}'", v)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if statuses.is_empty() {
        return Err(DomainError::BadRequest("registration.status filter has no value".into()));
    }
    match op {
        FilterOp::Eq | FilterOp::In => Ok(StatusFilter::In(statuses)),
        FilterOp::Ne => Ok(StatusFilter::NotIn(statuses)),
        _ => Err(DomainError::BadRequest(format!(
            "filter type '{}' not supported on 'registration.status'",
            op.as_str()
        ))),
    }
}
