pub mod dashboard_service;
pub mod indicators;
pub mod metrics;
pub mod normalizer;
