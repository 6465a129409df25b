#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod detail;
pub mod feed;
pub mod imdb;
pub mod logging;
pub mod poster;
pub mod preloader;
pub mod restore;
pub mod sanitize;
pub mod session;
pub mod storage;
pub mod theme;
pub mod trigger;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
