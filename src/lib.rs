pub mod app;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logging;
pub mod periodic;
pub mod progress;
pub mod provider;
pub mod session;
pub mod step;
pub mod sync;
pub mod timeline;
pub mod ui;
