pub mod admin_service;
pub mod correlation;
pub mod headers;
pub mod http;
pub mod metrics_defs;
