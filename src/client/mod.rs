//! Client front ends

pub mod shell;
