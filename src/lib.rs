// Library exports for the forum server
// This allows integration tests to build the router against a temp database

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extractors;
pub mod feed;
pub mod recommend;
pub mod routes;
pub mod state;
pub mod users;
