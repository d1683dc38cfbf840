pub mod app_state;
pub mod config;
pub mod crawl;
pub mod dispatcher;
pub mod jobs;
pub mod provider;
pub mod repository;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
