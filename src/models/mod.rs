pub mod bar;
pub mod metrics;
pub mod request;
