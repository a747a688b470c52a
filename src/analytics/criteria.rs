//! Raw analytics criteria as received on the query string.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;

use super::dimension::DateField;
use crate::error::TrackerError;
use crate::models::enums::{EndpointAction, EndpointItem, OutputType};

/// Criteria of one analytics call. Date fields hold the raw, unparsed
/// token lists (`"202111,2021;TODAY"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQueryCriteria {
    pub endpoint_item: EndpointItem,
    pub endpoint_action: EndpointAction,
    pub dimension: BTreeSet<String>,
    pub filter: BTreeSet<String>,
    pub occurred_date: Option<String>,
    pub enrollment_date: Option<String>,
    pub event_date: Option<String>,
    pub scheduled_date: Option<String>,
    pub last_updated: Option<String>,
    pub total_pages: bool,
    pub page: Option<i32>,
    pub page_size: Option<i32>,
    pub stage: Option<String>,
    pub output_type: Option<OutputType>,
    pub include_deleted: bool,
    pub include_metadata_details: bool,
    pub display_property: Option<String>,
    pub asc: BTreeSet<String>,
    pub desc: BTreeSet<String>,
    pub headers: BTreeSet<String>,
    pub relative_period_date: Option<NaiveDate>,
}

impl AnalyticsQueryCriteria {
    pub fn new(endpoint_item: EndpointItem) -> Self {
        Self {
            endpoint_item,
            endpoint_action: EndpointAction::Other,
            dimension: BTreeSet::new(),
            filter: BTreeSet::new(),
            occurred_date: None,
            enrollment_date: None,
            event_date: None,
            scheduled_date: None,
            last_updated: None,
            total_pages: true,
            page: None,
            page_size: None,
            stage: None,
            output_type: None,
            include_deleted: false,
            include_metadata_details: false,
            display_property: None,
            asc: BTreeSet::new(),
            desc: BTreeSet::new(),
            headers: BTreeSet::new(),
            relative_period_date: None,
        }
    }

    pub fn events() -> Self {
        Self::new(EndpointItem::Event)
    }

    pub fn enrollments() -> Self {
        Self::new(EndpointItem::Enrollment)
    }

    pub fn with_endpoint_action(mut self, action: EndpointAction) -> Self {
        self.endpoint_action = action;
        self
    }

    pub fn with_endpoint_item(mut self, item: EndpointItem) -> Self {
        self.endpoint_item = item;
        self
    }

    pub fn with_dimension<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimension = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date(mut self, field: DateField, raw: &str) -> Self {
        *self.date_slot(field) = Some(raw.to_string());
        self
    }

    /// Raw value of one date-bearing field.
    pub fn date(&self, field: DateField) -> Option<&str> {
        match field {
            DateField::OccurredDate => self.occurred_date.as_deref(),
            DateField::EnrollmentDate => self.enrollment_date.as_deref(),
            DateField::EventDate => self.event_date.as_deref(),
            DateField::ScheduledDate => self.scheduled_date.as_deref(),
            DateField::LastUpdated => self.last_updated.as_deref(),
        }
    }

    fn date_slot(&mut self, field: DateField) -> &mut Option<String> {
        match field {
            DateField::OccurredDate => &mut self.occurred_date,
            DateField::EnrollmentDate => &mut self.enrollment_date,
            DateField::EventDate => &mut self.event_date,
            DateField::ScheduledDate => &mut self.scheduled_date,
            DateField::LastUpdated => &mut self.last_updated,
        }
    }

    /// Build criteria from decoded query pairs. Repeated `dimension`,
    /// `filter`, `asc`, `desc` and `headers` accumulate; other parameters
    /// keep their last value. Unknown names are ignored.
    pub fn from_query_pairs<'p, I>(item: EndpointItem, pairs: I) -> Result<Self, TrackerError>
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        let mut criteria = Self::new(item);
        for (name, value) in pairs {
            match name {
                "dimension" => criteria.dimension.extend(split_list(value)),
                "filter" => criteria.filter.extend(split_list(value)),
                "asc" => criteria.asc.extend(split_list(value)),
                "desc" => criteria.desc.extend(split_list(value)),
                "headers" => criteria.headers.extend(split_list(value)),
                "occurredDate" => criteria.occurred_date = Some(value.to_string()),
                "enrollmentDate" => criteria.enrollment_date = Some(value.to_string()),
                "eventDate" => criteria.event_date = Some(value.to_string()),
                "scheduledDate" => criteria.scheduled_date = Some(value.to_string()),
                "lastUpdated" => criteria.last_updated = Some(value.to_string()),
                "totalPages" => criteria.total_pages = parse_bool(name, value)?,
                "includeDeleted" => criteria.include_deleted = parse_bool(name, value)?,
                "includeMetadataDetails" => {
                    criteria.include_metadata_details = parse_bool(name, value)?
                }
                "page" => criteria.page = Some(parse_int(name, value)?),
                "pageSize" => criteria.page_size = Some(parse_int(name, value)?),
                "stage" => criteria.stage = Some(value.to_string()),
                "displayProperty" => criteria.display_property = Some(value.to_string()),
                "outputType" => criteria.output_type = Some(OutputType::from_str(value)?),
                "relativePeriodDate" => {
                    criteria.relative_period_date =
                        Some(NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                            TrackerError::bad_request(format!(
                                "Invalid date for relativePeriodDate: {value}"
                            ))
                        })?)
                }
                _ => tracing::trace!(%name, "ignoring unknown analytics parameter"),
            }
        }
        Ok(criteria)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, TrackerError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(TrackerError::bad_request(format!(
            "Invalid boolean for {name}: {value}"
        ))),
    }
}

fn parse_int(name: &str, value: &str) -> Result<i32, TrackerError> {
    value
        .parse()
        .map_err(|_| TrackerError::bad_request(format!("Invalid number for {name}: {value}")))
}
