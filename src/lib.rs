//! Music streaming backend: a bounded song library with per-user playback
//! tracking and favorites, served over a JSON HTTP API.

pub mod auth;
pub mod config;
pub mod database;
pub mod model;
pub mod rpc;
pub mod session;
pub mod uploads;
pub mod web;
