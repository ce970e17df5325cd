//! # Configuration
//!
//! Profile-based configuration shared by the server and the CLI. Values are
//! resolved from defaults, an optional YAML/JSON file, `BRIEFWIRE_*`
//! environment variables, and command-line overrides, in that order.

pub mod server;
