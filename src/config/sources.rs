//! Configuration sources layered over the defaults.

pub mod config_file;
pub mod environment;
