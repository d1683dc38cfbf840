pub mod collection_tasks;
pub mod collections;
pub mod height;
pub mod migrations;
pub mod schema;
