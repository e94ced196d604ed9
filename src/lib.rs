pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod launcher;
pub mod logging;
pub mod storage;
