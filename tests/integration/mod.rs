//! Integration tests for the checkoutfs file service

mod lock_coordinator;
mod network;
mod path_properties;
mod session_protocol;
mod test_utils;
mod tree_structure;
