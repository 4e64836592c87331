pub mod buildlogger;
pub mod health;
pub mod metrics_handler;
