pub mod apps;
pub mod cloud;
pub mod config;
pub mod csv_log;
pub mod mqtt;
pub mod reading;
pub mod router;
pub mod sense_hat;
pub mod setup;
