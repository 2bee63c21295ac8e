pub mod api;
pub mod bot;
pub mod catch;
pub mod chat;
pub mod commands;
pub mod config;
pub mod creature;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod scores;
pub mod spawn;
