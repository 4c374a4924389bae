// Shared library for the recording sync worker

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod models;
pub mod report;
pub mod secrets;
pub mod storage;
pub mod sync_job;
pub mod telemetry;
pub mod transfer;
pub mod warehouse;
