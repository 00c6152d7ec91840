pub mod checkpoint;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod input;
pub mod models;
pub mod output;
pub mod runner;
pub mod scrapers;
