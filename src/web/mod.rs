//! HTTP interface for the record service

pub mod handlers;
pub mod models;
pub mod server;
