pub mod config;
pub mod formatting;
pub mod logging;
