//! Interactive command-line chat client.
pub mod config;
pub mod console;
pub mod error;
pub mod interactive;
