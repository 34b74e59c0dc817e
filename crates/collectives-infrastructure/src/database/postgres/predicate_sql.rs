//! Compilation of listing queries into SQL.
//!
//! Every [`EventPredicate`] node becomes one boolean SQL expression over the
//! `events e` alias, so visibility and user filters run as a single
//! set-based query.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use collectives_core::catalog::ActivityScope;
use collectives_core::listing::badges::{BadgeFilter, BadgeSortField};
use collectives_core::listing::{BadgeQuery, EventSort, EventSortField, SortDir, StatusFilter};
use collectives_core::predicate::{DateBound, EventPredicate};

use super::rows::like_pattern;

fn push_list(qb: &mut QueryBuilder<'_, Postgres>, parts: &[EventPredicate], joiner: &str) {
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_predicate(qb, part);
    }
    qb.push(")");
}

fn push_bound(qb: &mut QueryBuilder<'_, Postgres>, column: &str, bound: &DateBound) {
    match bound {
        DateBound::AtLeast(at) => qb.push(column).push(" >= ").push_bind(*at),
        DateBound::Before(at) => qb.push(column).push(" < ").push_bind(*at),
    };
}

pub(crate) fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &EventPredicate) {
    match predicate {
        EventPredicate::True => {
            qb.push("TRUE");
        }
        EventPredicate::False => {
            qb.push("FALSE");
        }
        EventPredicate::And(parts) => push_list(qb, parts, " AND "),
        EventPredicate::Or(parts) => push_list(qb, parts, " OR "),
        EventPredicate::StatusIn(statuses) => {
            let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push("e.status = ANY(").push_bind(names).push(")");
        }
        EventPredicate::StatusNotIn(statuses) => {
            let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push("NOT (e.status = ANY(").push_bind(names).push("))");
        }
        EventPredicate::VisibilityNe(visibility) => {
            qb.push("e.visibility <> ").push_bind(visibility.as_str());
        }
        EventPredicate::AnyActivityIn(ids) => {
            let ids: Vec<Uuid> = ids.iter().copied().collect();
            qb.push(
                "EXISTS (SELECT 1 FROM event_activity_types x WHERE x.event_id = e.id AND x.activity_type_id = ANY(",
            )
            .push_bind(ids)
            .push("))");
        }
        EventPredicate::HasNoActivity => {
            qb.push("NOT EXISTS (SELECT 1 FROM event_activity_types x WHERE x.event_id = e.id)");
        }
        EventPredicate::LedBy(user_id) => {
            qb.push("EXISTS (SELECT 1 FROM event_leaders l WHERE l.event_id = e.id AND l.user_id = ")
                .push_bind(*user_id)
                .push(")");
        }
        EventPredicate::Start(bound) => push_bound(qb, "e.start_time", bound),
        EventPredicate::End(bound) => push_bound(qb, "e.end_time", bound),
        EventPredicate::TitleLike(needle) => {
            qb.push("e.title ILIKE ").push_bind(like_pattern(needle));
        }
        EventPredicate::TitleEq(title) => {
            qb.push("e.title = ").push_bind(title.clone());
        }
        EventPredicate::EventTypeIn(names) => {
            qb.push("e.event_type_id IN (SELECT id FROM event_types WHERE short_name = ANY(")
                .push_bind(names.clone())
                .push("))");
        }
        EventPredicate::ActivityShortNameIn(names) => {
            qb.push(
                "EXISTS (SELECT 1 FROM event_activity_types x JOIN activity_types a ON a.id = x.activity_type_id \
                 WHERE x.event_id = e.id AND a.short_name = ANY(",
            )
            .push_bind(names.clone())
            .push("))");
        }
        EventPredicate::TagIn(tags) => {
            qb.push("EXISTS (SELECT 1 FROM event_tags g WHERE g.event_id = e.id AND g.tag = ANY(")
                .push_bind(tags.clone())
                .push("))");
        }
        EventPredicate::LeaderNameLike(needle) => {
            qb.push(
                "EXISTS (SELECT 1 FROM event_leaders l JOIN users u ON u.id = l.user_id \
                 WHERE l.event_id = e.id AND (u.first_name || ' ' || u.last_name) ILIKE ",
            )
            .push_bind(like_pattern(needle))
            .push(")");
        }
    }
}

fn direction(dir: SortDir) -> &'static str {
    match dir {
        SortDir::Asc => "ASC",
        SortDir::Desc => "DESC",
    }
}

/// `ORDER BY` clause; text columns compare bytewise, ties go to the id.
pub(crate) fn push_event_order(qb: &mut QueryBuilder<'_, Postgres>, sort: &EventSort) {
    let column = match sort.field {
        EventSortField::Title => "e.title COLLATE \"C\"",
        EventSortField::Start => "e.start_time",
        EventSortField::End => "e.end_time",
        EventSortField::Status => "e.status COLLATE \"C\"",
    };
    qb.push(" ORDER BY ")
        .push(column)
        .push(" ")
        .push(direction(sort.dir))
        .push(", e.id ASC");
}

pub(crate) fn push_status_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &StatusFilter) {
    let (negate, statuses) = match filter {
        StatusFilter::In(statuses) => (false, statuses),
        StatusFilter::NotIn(statuses) => (true, statuses),
    };
    let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
    qb.push(if negate { "NOT (r.status = ANY(" } else { "(r.status = ANY(" })
        .push_bind(names)
        .push("))");
}

const BADGE_USER_NAME: &str = "(u.first_name || ' ' || u.last_name)";

/// `WHERE` body of a badge listing over `badges b`, `users u` and the
/// optional `activity_types a`.
pub(crate) fn push_badge_conditions(qb: &mut QueryBuilder<'_, Postgres>, query: &BadgeQuery) {
    match &query.scope {
        ActivityScope::All => {
            qb.push("TRUE");
        }
        ActivityScope::Only(ids) => {
            let ids: Vec<Uuid> = ids.iter().copied().collect();
            qb.push("b.activity_id = ANY(").push_bind(ids).push(")");
        }
    }
    for filter in &query.filters {
        qb.push(" AND ");
        match filter {
            BadgeFilter::KindIn(tags) => {
                qb.push("b.kind = ANY(").push_bind(tags.clone()).push(")");
            }
            BadgeFilter::LevelEq(level) => {
                qb.push("b.level = ").push_bind(*level);
            }
            BadgeFilter::LevelAtLeast(level) => {
                qb.push("b.level >= ").push_bind(*level);
            }
            BadgeFilter::LevelBelow(level) => {
                qb.push("b.level < ").push_bind(*level);
            }
            BadgeFilter::ExpiresOnOrAfter(date) => {
                qb.push("b.expiration_date >= ").push_bind(*date);
            }
            BadgeFilter::ExpiresBefore(date) => {
                qb.push("b.expiration_date < ").push_bind(*date);
            }
            BadgeFilter::UserNameLike(needle) => {
                qb.push(BADGE_USER_NAME).push(" ILIKE ").push_bind(like_pattern(needle));
            }
            BadgeFilter::ActivityNameLike(needle) => {
                qb.push("a.name ILIKE ").push_bind(like_pattern(needle));
            }
        }
    }
}

pub(crate) fn push_badge_order(qb: &mut QueryBuilder<'_, Postgres>, query: &BadgeQuery) {
    let column = match query.sort_field {
        BadgeSortField::ExpirationDate => "b.expiration_date".to_string(),
        BadgeSortField::Name => "b.kind COLLATE \"C\"".to_string(),
        BadgeSortField::UserFullName => format!("{} COLLATE \"C\"", BADGE_USER_NAME),
    };
    qb.push(" ORDER BY ")
        .push(column)
        .push(" ")
        .push(direction(query.sort_dir))
        .push(", b.id ASC");
}
