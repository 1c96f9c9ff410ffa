//! CLI command implementations

pub mod change;
pub mod claim;
pub mod completions;
pub mod exception;
pub mod generate;
pub mod init;
pub mod patterns;
pub mod request;
pub mod validate;
