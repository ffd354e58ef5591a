//! pulse-bff - authenticating reverse proxy for the Pulse dashboard
//!
//! Sits between the browser and the API service: validates the dashboard
//! session, attaches the service credential and audit headers, forwards
//! `/api/v1/*`, and returns the backend's answer with internal headers
//! stripped.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;
