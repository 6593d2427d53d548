//! CIVICA CLI Library

pub mod commands;
pub mod keystore;

pub use commands::*;
pub use keystore::*;
