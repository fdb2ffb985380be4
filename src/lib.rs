//! checkoutfs: whole-file checkout over the network
//!
//! Clients check a file out of a shared virtual namespace, edit a private
//! copy, and check it back in. A distributed, lease-based lock gives each
//! path a single writer at a time.
//!
//! - [`tree`]: the namespace tree and file identity
//! - [`store`]: the serialized, persisted store over the tree and blobs
//! - [`lock`]: FIFO path locks with session leases, local and over TCP
//! - [`session`]: the client checkout state machine
//! - [`server`]: request dispatch and listeners

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod tree;
pub mod types;
