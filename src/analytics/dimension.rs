//! Normalizes the date-bearing criteria fields into the period (`pe`)
//! dimension, qualifying each token with the date role it stands for.

use std::collections::BTreeSet;

use super::criteria::AnalyticsQueryCriteria;
use crate::models::enums::{DateRole, EndpointAction, EndpointItem};

pub const PERIOD_DIMENSION: &str = "pe";
pub const DIMENSION_SEPARATOR: char = ':';
pub const OPTION_SEPARATOR: char = ';';

/// Criteria fields that carry date filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    OccurredDate,
    EnrollmentDate,
    EventDate,
    ScheduledDate,
    LastUpdated,
}

const EVENT_FIELDS: [DateField; 5] = [
    DateField::EventDate,
    DateField::EnrollmentDate,
    DateField::OccurredDate,
    DateField::ScheduledDate,
    DateField::LastUpdated,
];

const ENROLLMENT_FIELDS: [DateField; 3] = [
    DateField::EnrollmentDate,
    DateField::OccurredDate,
    DateField::LastUpdated,
];

impl DateField {
    /// Fields read for an endpoint item, in emission order.
    pub fn for_item(item: EndpointItem) -> &'static [DateField] {
        match item {
            EndpointItem::Event => &EVENT_FIELDS,
            EndpointItem::Enrollment => &ENROLLMENT_FIELDS,
        }
    }

    /// Role a field maps to for the given endpoint item.
    pub fn role(self, item: EndpointItem) -> Option<DateRole> {
        match (self, item) {
            (Self::OccurredDate, _) => Some(DateRole::OccurredDate),
            (Self::EnrollmentDate, _) => Some(DateRole::EnrollmentDate),
            (Self::LastUpdated, _) => Some(DateRole::LastUpdated),
            (Self::EventDate, EndpointItem::Event) => Some(DateRole::EventDate),
            (Self::ScheduledDate, EndpointItem::Event) => Some(DateRole::ScheduledDate),
            (Self::EventDate | Self::ScheduledDate, EndpointItem::Enrollment) => None,
        }
    }
}

/// Date roles only qualify tokens for queries, and for aggregates over
/// enrollments.
pub fn applies_roles(action: EndpointAction, item: EndpointItem) -> bool {
    match action {
        EndpointAction::Query => true,
        EndpointAction::Aggregate => item == EndpointItem::Enrollment,
        EndpointAction::Other => false,
    }
}

/// Individual tokens of a raw date value; `;` and `,` both delimit.
pub fn split_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([OPTION_SEPARATOR, ','])
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Key of a `key:value` dimension string.
pub fn dimension_key(dimension: &str) -> &str {
    dimension
        .split_once(DIMENSION_SEPARATOR)
        .map_or(dimension, |(key, _)| key)
}

fn role_tokens(criteria: &AnalyticsQueryCriteria) -> Vec<String> {
    let item = criteria.endpoint_item;
    let mut tokens = Vec::new();
    for field in DateField::for_item(item) {
        let (Some(raw), Some(role)) = (criteria.date(*field), field.role(item)) else {
            continue;
        };
        tokens.extend(split_tokens(raw).map(|t| format!("{t}{DIMENSION_SEPARATOR}{role}")));
    }
    tokens
}

/// Dimensions of the criteria with the date fields folded into the `pe`
/// entry. Empty when the criteria carries no dimension at all.
pub fn normalize(criteria: &AnalyticsQueryCriteria) -> BTreeSet<BTreeSet<String>> {
    let mut dimensions = merge_periods(criteria.dimension.iter().cloned());
    if applies_roles(criteria.endpoint_action, criteria.endpoint_item) {
        let tokens = role_tokens(criteria);
        if !tokens.is_empty() {
            let joined = tokens.join(&OPTION_SEPARATOR.to_string());
            match dimensions.iter_mut().find(|d| dimension_key(d) == PERIOD_DIMENSION) {
                Some(period) => append_values(period, &joined),
                None => dimensions.push(format!("{PERIOD_DIMENSION}{DIMENSION_SEPARATOR}{joined}")),
            }
        }
    }
    if dimensions.is_empty() {
        BTreeSet::new()
    } else {
        BTreeSet::from([dimensions.into_iter().collect()])
    }
}

/// Folds every `pe` entry into the first one, keeping value order.
fn merge_periods(dimensions: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut period = None;
    for dimension in dimensions {
        if dimension_key(&dimension) != PERIOD_DIMENSION {
            merged.push(dimension);
            continue;
        }
        match period {
            Some(index) => {
                if let Some((_, values)) = dimension.split_once(DIMENSION_SEPARATOR) {
                    append_values(&mut merged[index], values);
                }
            }
            None => {
                period = Some(merged.len());
                merged.push(dimension);
            }
        }
    }
    merged
}

fn append_values(period: &mut String, values: &str) {
    if values.is_empty() {
        return;
    }
    match period.split_once(DIMENSION_SEPARATOR) {
        None => period.push(DIMENSION_SEPARATOR),
        Some((_, "")) => {}
        Some(_) => period.push(OPTION_SEPARATOR),
    }
    period.push_str(values);
}
