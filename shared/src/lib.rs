pub mod block;
pub mod collection;
pub mod crawler;
pub mod error;
pub mod log_config;
pub mod queue;
pub mod task;
