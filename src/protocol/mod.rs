//! File service wire protocol

pub mod codec;
pub mod message;

pub use message::{Request, Response};
