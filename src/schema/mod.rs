//! Embedded schemas and builtin pattern documents

pub mod registry;

pub use registry::SchemaRegistry;
