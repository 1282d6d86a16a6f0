pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drift;
pub mod engine;
pub mod registry;
pub mod remediation;
pub mod report;
pub mod runtime;
pub mod shared;
pub mod state;
pub mod task;
pub mod tasks;
