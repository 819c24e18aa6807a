pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod realtime;
pub mod routes;
pub mod session;
pub mod state;
