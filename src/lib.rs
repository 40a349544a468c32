pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod utils;
