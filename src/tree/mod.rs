//! Virtual namespace
//!
//! The namespace is a tree of directories and files addressed by absolute
//! virtual paths. File identity is derived from name and path (see
//! [`hasher`]); content is stored separately in the blob store.

pub mod hasher;
pub mod namespace;
pub mod node;
pub mod path;
