//! Property-based tests for validation and generation
//!
//! These run against the builtin pattern set.

use chrono::{TimeZone, Utc};
use ngt::naming::{
    GenerationRequest, Generator, PatternRegistry, SlotKind, ValidationContext, Validator,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn registry() -> Arc<PatternRegistry> {
    Arc::new(PatternRegistry::builtin().unwrap())
}

fn team() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{1,8}"
}

fn service() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{1,6}(-[a-z0-9]{1,5})?"
}

fn version() -> impl Strategy<Value = String> {
    "v?[0-9]{1,2}(\\.[0-9]{1,2}){0,2}"
}

fn environment() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["prod", "staging", "dev", "qa"]).prop_map(str::to_string)
}

/// A valid production deployment name from the builtin patterns
fn generated_name() -> impl Strategy<Value = String> {
    let team = team().prop_filter("team must not read as an environment", |t| t != "prod");
    (team, service(), version()).prop_map(|(team, service, version)| {
        let request = GenerationRequest::new("k8s-deployment", "prod")
            .team(&team)
            .service(&service)
            .version(&version);
        Generator::new(registry())
            .generate(&request)
            .unwrap()
            .name()
            .to_string()
    })
}

/// Ways a hand-typed name typically goes wrong
#[derive(Debug, Clone, Copy)]
enum Damage {
    Uppercase,
    LeadingSeparator,
    TrailingSeparator,
    DoubledSeparator,
    MissingEnvironmentPrefix,
    Overlong,
}

impl Damage {
    fn apply(self, name: &str) -> String {
        match self {
            Damage::Uppercase => name.to_uppercase(),
            Damage::LeadingSeparator => format!("-{}", name),
            Damage::TrailingSeparator => format!("{}-", name),
            Damage::DoubledSeparator => name.replacen('-', "--", 1),
            Damage::MissingEnvironmentPrefix => name.strip_prefix("prod-").unwrap_or(name).to_string(),
            Damage::Overlong => {
                // pad the service slot, which ends right before the resource token
                let at = name.rfind("-deploy-").unwrap();
                format!("{}{}{}", &name[..at], "x".repeat(60), &name[at..])
            }
        }
    }
}

fn damage() -> impl Strategy<Value = Damage> {
    prop::sample::select(vec![
        Damage::Uppercase,
        Damage::LeadingSeparator,
        Damage::TrailingSeparator,
        Damage::DoubledSeparator,
        Damage::MissingEnvironmentPrefix,
        Damage::Overlong,
    ])
}

proptest! {
    /// Generation is a pure function of the request and the clock.
    #[test]
    fn generate_is_deterministic(
        env in environment(),
        team in team(),
        service in service(),
        version in version(),
    ) {
        let generator = Generator::new(registry());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let request = GenerationRequest::new("k8s-deployment", &env)
            .team(&team)
            .service(&service)
            .version(&version)
            .with_timestamp();

        let first = generator.generate_at(&request, now).unwrap();
        let second = generator.generate_at(&request, now).unwrap();
        prop_assert_eq!(first.names, second.names);
    }

    /// Every generated name passes validation for the same type and environment.
    #[test]
    fn generated_names_validate(
        env in environment(),
        team in team(),
        service in service(),
        version in version(),
    ) {
        let registry = registry();
        let generator = Generator::new(Arc::clone(&registry));
        let validator = Validator::new(registry);

        let request = GenerationRequest::new("k8s-deployment", &env)
            .team(&team)
            .service(&service)
            .version(&version);
        let result = generator.generate(&request).unwrap();

        let check = validator.validate(result.name(), "k8s-deployment", &env, &ValidationContext::new());
        prop_assert!(check.valid, "{} -> {:?}", result.name(), check.violations);
        prop_assert_eq!(check.pattern_id.as_deref(), Some(result.pattern_id.as_str()));
        prop_assert_eq!(check.slots.get(&SlotKind::Team), Some(&team));
    }

    /// Batch generation never repeats a name.
    #[test]
    fn multiple_names_are_distinct(
        team in team(),
        service in service(),
        count in 1usize..25,
    ) {
        let generator = Generator::new(registry());
        let request = GenerationRequest::new("k8s-service", "dev")
            .team(&team)
            .service(&service)
            .multiple(count);

        let result = generator.generate(&request).unwrap();
        let unique: HashSet<&String> = result.names.iter().collect();
        prop_assert_eq!(result.names.len(), count);
        prop_assert_eq!(unique.len(), count);
    }

    /// Validating the same name twice gives the same answer.
    #[test]
    fn validation_is_deterministic(name in "[A-Za-z0-9_. -]{0,70}") {
        let validator = Validator::new(registry());
        let ctx = ValidationContext::new();

        let first = validator.validate(&name, "k8s-deployment", "prod", &ctx);
        let second = validator.validate(&name, "k8s-deployment", "prod", &ctx);
        prop_assert_eq!(first, second);
    }

    /// A damaged valid name always gets suggestions, and every one of them is valid.
    #[test]
    fn damaged_names_get_valid_suggestions(
        name in generated_name(),
        damage in damage(),
    ) {
        let validator = Validator::new(registry());
        let ctx = ValidationContext::new();
        let damaged = damage.apply(&name);

        let result = validator.validate(&damaged, "k8s-deployment", "prod", &ctx);
        prop_assert!(!result.valid, "{:?} left {} valid", damage, damaged);
        prop_assert!(!result.suggestions.is_empty(), "{:?}: no suggestion for {}", damage, damaged);
        for suggestion in &result.suggestions {
            let check = validator.validate(suggestion, "k8s-deployment", "prod", &ctx);
            prop_assert!(check.valid, "{} suggested for {}", suggestion, damaged);
        }
    }

    /// Suggestions depend only on the name and its violations.
    #[test]
    fn suggest_is_deterministic(
        name in generated_name(),
        damage in damage(),
    ) {
        let validator = Validator::new(registry());
        let damaged = damage.apply(&name);
        let result = validator.validate(&damaged, "k8s-deployment", "prod", &ValidationContext::new());

        let first = validator.suggest(&damaged, "k8s-deployment", "prod", &result.violations);
        let second = validator.suggest(&damaged, "k8s-deployment", "prod", &result.violations);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.starts_with(&result.suggestions));
    }

    /// Arbitrary input never yields an invalid suggestion.
    #[test]
    fn suggestions_for_arbitrary_input_are_valid(name in "[A-Za-z0-9_. -]{0,70}") {
        let validator = Validator::new(registry());
        let ctx = ValidationContext::new();

        let result = validator.validate(&name, "k8s-deployment", "prod", &ctx);
        if result.valid {
            prop_assert!(result.suggestions.is_empty());
        }
        for suggestion in &result.suggestions {
            let check = validator.validate(suggestion, "k8s-deployment", "prod", &ctx);
            prop_assert!(check.valid, "{} suggested for {}", suggestion, name);
        }
    }
}
