//! HTTP routing, handlers, and middleware.

pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod health;
pub(crate) mod router;
pub(crate) mod status;
pub(crate) mod telemetry;
