pub mod collections;
pub mod tasks;
