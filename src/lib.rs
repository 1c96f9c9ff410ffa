//! NGT: Naming Governance Toolkit
//!
//! Validates and generates cloud resource names against declarative naming
//! patterns, and drives the change and exception requests that govern them.

pub mod cli;
pub mod core;
pub mod naming;
pub mod schema;
pub mod workflow;
pub mod yaml;
