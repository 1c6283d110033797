//! Shared HTTP constants.

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";
pub(crate) const PROBLEM_INTERNAL: &str = "https://drover.dev/problems/internal";
pub(crate) const UNMATCHED_ROUTE: &str = "unmatched";
