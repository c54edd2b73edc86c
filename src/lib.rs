pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schedule;
pub mod stats;
