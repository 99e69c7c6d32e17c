//! CLI command implementations.

pub mod common;
pub mod cut;
pub mod run;
pub mod version;
