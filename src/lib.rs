pub mod api;
pub mod config;
pub mod control;
pub mod observability;
pub mod remote;
pub mod signal;
pub mod storage;
pub mod supervisor;
