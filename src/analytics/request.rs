//! Immutable analytics request assembled from criteria.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::criteria::AnalyticsQueryCriteria;
use super::dimension::{dimension_key, normalize};
use crate::error::TrackerError;
use crate::models::enums::{EndpointAction, EndpointItem, OutputType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDataQueryRequest {
    endpoint_item: EndpointItem,
    endpoint_action: EndpointAction,
    dimension: BTreeSet<BTreeSet<String>>,
    filter: BTreeSet<BTreeSet<String>>,
    stage: Option<String>,
    output_type: Option<OutputType>,
    total_pages: bool,
    page: Option<i32>,
    page_size: Option<i32>,
    asc: BTreeSet<String>,
    desc: BTreeSet<String>,
    headers: BTreeSet<String>,
    include_deleted: bool,
    include_metadata_details: bool,
    display_property: Option<String>,
    relative_period_date: Option<NaiveDate>,
}

impl EventDataQueryRequest {
    pub fn builder() -> EventDataQueryRequestBuilder {
        EventDataQueryRequestBuilder::default()
    }

    pub fn endpoint_item(&self) -> EndpointItem {
        self.endpoint_item
    }

    pub fn endpoint_action(&self) -> EndpointAction {
        self.endpoint_action
    }

    pub fn dimension(&self) -> &BTreeSet<BTreeSet<String>> {
        &self.dimension
    }

    pub fn filter(&self) -> &BTreeSet<BTreeSet<String>> {
        &self.filter
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn output_type(&self) -> Option<OutputType> {
        self.output_type
    }

    pub fn is_total_pages(&self) -> bool {
        self.total_pages
    }

    pub fn page(&self) -> Option<i32> {
        self.page
    }

    pub fn page_size(&self) -> Option<i32> {
        self.page_size
    }

    pub fn asc(&self) -> &BTreeSet<String> {
        &self.asc
    }

    pub fn desc(&self) -> &BTreeSet<String> {
        &self.desc
    }

    pub fn headers(&self) -> &BTreeSet<String> {
        &self.headers
    }

    pub fn include_deleted(&self) -> bool {
        self.include_deleted
    }

    pub fn include_metadata_details(&self) -> bool {
        self.include_metadata_details
    }

    pub fn display_property(&self) -> Option<&str> {
        self.display_property.as_deref()
    }

    pub fn relative_period_date(&self) -> Option<NaiveDate> {
        self.relative_period_date
    }
}

#[derive(Debug, Default)]
pub struct EventDataQueryRequestBuilder {
    criteria: Option<AnalyticsQueryCriteria>,
}

impl EventDataQueryRequestBuilder {
    pub fn from_criteria(mut self, criteria: &AnalyticsQueryCriteria) -> Self {
        self.criteria = Some(criteria.clone());
        self
    }

    pub fn build(self) -> Result<EventDataQueryRequest, TrackerError> {
        let criteria = self
            .criteria
            .ok_or_else(|| TrackerError::bad_request("No criteria given for analytics request"))?;
        validate(&criteria)?;

        let filter = if criteria.filter.is_empty() {
            BTreeSet::new()
        } else {
            BTreeSet::from([criteria.filter.clone()])
        };

        Ok(EventDataQueryRequest {
            endpoint_item: criteria.endpoint_item,
            endpoint_action: criteria.endpoint_action,
            dimension: normalize(&criteria),
            filter,
            stage: criteria.stage,
            output_type: criteria.output_type,
            total_pages: criteria.total_pages,
            page: criteria.page,
            page_size: criteria.page_size,
            asc: criteria.asc,
            desc: criteria.desc,
            headers: criteria.headers,
            include_deleted: criteria.include_deleted,
            include_metadata_details: criteria.include_metadata_details,
            display_property: criteria.display_property,
            relative_period_date: criteria.relative_period_date,
        })
    }
}

fn validate(criteria: &AnalyticsQueryCriteria) -> Result<(), TrackerError> {
    for value in criteria.dimension.iter().chain(&criteria.filter) {
        if dimension_key(value).trim().is_empty() {
            return Err(TrackerError::bad_request(format!(
                "Dimension is missing an identifier: {value}"
            )));
        }
    }

    let dimension_keys: BTreeSet<&str> = criteria.dimension.iter().map(|d| dimension_key(d)).collect();
    if let Some(key) = criteria
        .filter
        .iter()
        .map(|f| dimension_key(f))
        .find(|k| dimension_keys.contains(k))
    {
        return Err(TrackerError::bad_request(format!(
            "Dimensions cannot be specified as dimension and filter simultaneously: {key}"
        )));
    }

    if let Some(column) = criteria.asc.intersection(&criteria.desc).next() {
        return Err(TrackerError::bad_request(format!(
            "Column cannot be sorted both ascending and descending: {column}"
        )));
    }

    if criteria.page.is_some_and(|p| p < 1) {
        return Err(TrackerError::bad_request("Page number must be a positive number"));
    }
    if criteria.page_size.is_some_and(|s| s < 0) {
        return Err(TrackerError::bad_request("Page size must be zero or a positive number"));
    }
    Ok(())
}
