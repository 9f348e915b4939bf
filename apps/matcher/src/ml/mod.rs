pub mod ensemble;
pub mod forest;
pub mod metrics;
