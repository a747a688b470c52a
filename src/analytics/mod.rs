//! Analytics query parameters: raw criteria, dimension normalization and
//! the immutable request built from them.

pub mod criteria;
pub mod dimension;
pub mod request;

pub use criteria::AnalyticsQueryCriteria;
pub use dimension::{normalize, DateField};
pub use request::EventDataQueryRequest;
