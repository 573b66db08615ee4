pub mod actions;
pub mod config;
pub mod connection;
pub mod endpoints;
pub mod errors;
pub mod logging;
pub mod logs;
pub mod project;
pub mod tools_config;
pub mod ui;
pub mod view;
