pub mod config;
pub mod logging;

// Core modules
pub mod checksum;
pub mod control;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod isolation;
pub mod job;
pub mod ledger;
pub mod orchestrator;
pub mod relay;
pub mod storage;
