pub mod db;
pub mod queue;
