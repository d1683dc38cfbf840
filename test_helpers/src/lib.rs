pub mod db;
pub mod fixtures;
