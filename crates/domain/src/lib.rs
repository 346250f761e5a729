//! `mp-domain`: configuration and error types shared by the mcpool crates.
//!
//! Kept free of runtime and transport dependencies so the CLI and the
//! client crate can both deserialize the same `config.toml`.

pub mod config;
pub mod error;
