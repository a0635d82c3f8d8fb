#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod comments;
pub mod config;
pub mod data;
pub mod detail;
pub mod event;
pub mod filter;
pub mod flight;
pub mod logging;
pub mod models;
pub mod player;
pub mod routes;
pub mod session;
pub mod storage;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{logout, run, RunOptions};
