//! Naming governance - pattern registry, validation, suggestions and generation

pub mod generator;
pub mod pattern;
pub mod registry;
pub mod suggest;
pub mod validator;

pub use generator::{
    GenerateError, GenerationOptions, GenerationRequest, GenerationResult, Generator, ResolvedSlot,
};
pub use pattern::{CompiledPattern, NamingPattern, PolicyError, SlotKind, SlotRule, ANY_ENVIRONMENT};
pub use registry::{PatternRegistry, RegistryHandle};
pub use suggest::{RepairContext, RepairFn, RepairTable};
pub use validator::{
    Severity, ValidationContext, ValidationResult, Validator, Violation, ViolationCode,
};
