pub mod config;
pub mod dataset;
pub mod report;
pub mod runner;
