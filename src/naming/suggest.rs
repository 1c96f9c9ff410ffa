//! Suggestion engine - deterministic repairs for invalid names
//!
//! Repairs are registered per [`ViolationCode`] in a [`RepairTable`]. For a
//! failed validation the engine builds one candidate per applicable repair plus
//! one candidate with every applicable repair chained, re-validates each, and
//! gives failing candidates exactly one more repair round. Survivors are
//! deduplicated and ranked by edit distance to the original name.

use std::collections::HashSet;
use std::sync::Arc;

use crate::naming::pattern::{CompiledPattern, SlotKind};
use crate::naming::validator::{ValidationResult, Violation, ViolationCode, MAX_NAME_LENGTH, MIN_NAME_LENGTH};

/// Slots a length repair may shorten; fixed tokens and the version stay intact
const SHORTENABLE_SLOTS: [SlotKind; 2] = [SlotKind::Service, SlotKind::Team];

/// Inputs a repair may need beyond the name itself
#[derive(Debug, Clone, Default)]
pub struct RepairContext {
    /// Prefix a name must start with, e.g. `prod-`
    pub environment_prefix: Option<String>,
    /// Pattern the name was checked against, when one resolved
    pub pattern: Option<Arc<CompiledPattern>>,
}

/// A pure repair: returns a rewritten name, or `None` when it cannot help
pub type RepairFn = fn(&str, &RepairContext) -> Option<String>;

/// A registered repair strategy
#[derive(Clone)]
pub struct Repair {
    pub code: ViolationCode,
    pub name: &'static str,
    pub apply: RepairFn,
}

/// Ordered table of repairs keyed by violation code
#[derive(Clone)]
pub struct RepairTable {
    repairs: Vec<Repair>,
}

impl RepairTable {
    /// A table with no repairs
    pub fn empty() -> Self {
        Self {
            repairs: Vec::new(),
        }
    }

    /// Register a repair; a later registration for the same code replaces the earlier one
    pub fn register(mut self, code: ViolationCode, name: &'static str, apply: RepairFn) -> Self {
        let repair = Repair { code, name, apply };
        match self.repairs.iter_mut().find(|r| r.code == code) {
            Some(existing) => *existing = repair,
            None => self.repairs.push(repair),
        }
        self
    }

    pub fn get(&self, code: ViolationCode) -> Option<&Repair> {
        self.repairs.iter().find(|r| r.code == code)
    }

    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }
}

impl Default for RepairTable {
    fn default() -> Self {
        Self::empty()
            .register(ViolationCode::InvalidPattern, "normalize_separators", normalize_separators)
            .register(
                ViolationCode::MissingEnvironmentPrefix,
                "prepend_environment",
                prepend_environment,
            )
            .register(ViolationCode::LengthInvalid, "fit_length", fit_length)
    }
}

/// Produce validated repair candidates for `name`
///
/// `check` re-validates a candidate; it must not itself compute suggestions.
pub fn suggest<F>(
    name: &str,
    violations: &[Violation],
    repairs: &RepairTable,
    ctx: &RepairContext,
    check: F,
) -> Vec<String>
where
    F: Fn(&str) -> ValidationResult,
{
    let mut accepted = Vec::new();

    for candidate in candidates(name, violations, repairs, ctx) {
        let result = check(&candidate);
        if result.valid {
            accepted.push(candidate);
            continue;
        }
        for second in candidates(&candidate, &result.violations, repairs, ctx) {
            if check(&second).valid {
                accepted.push(second);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut unique: Vec<String> = accepted
        .into_iter()
        .filter(|c| c != name && seen.insert(c.clone()))
        .collect();

    // stable: equal distances keep generation order
    unique.sort_by_key(|c| edit_distance(name, c));
    unique
}

/// One candidate per applicable repair, then all applicable repairs chained
fn candidates(
    name: &str,
    violations: &[Violation],
    repairs: &RepairTable,
    ctx: &RepairContext,
) -> Vec<String> {
    let applicable: Vec<&Repair> = repairs
        .repairs()
        .iter()
        .filter(|r| violations.iter().any(|v| v.code == r.code))
        .collect();

    let mut out: Vec<String> = applicable
        .iter()
        .filter_map(|r| (r.apply)(name, ctx))
        .collect();

    if applicable.len() > 1 {
        let chained = applicable
            .iter()
            .try_fold(name.to_string(), |current, r| (r.apply)(&current, ctx));
        if let Some(chained) = chained {
            out.push(chained);
        }
    }

    out
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '.'
}

/// Lowercase, map foreign characters to `-`, collapse separator runs, trim separators
pub fn normalize_separators(name: &str, _ctx: &RepairContext) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c) {
            c
        } else {
            '-'
        };
        if is_separator(c) && out.chars().last().is_some_and(is_separator) {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(is_separator).to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Prepend the environment prefix the pattern requires
pub fn prepend_environment(name: &str, ctx: &RepairContext) -> Option<String> {
    let prefix = ctx.environment_prefix.as_deref()?;
    if name.starts_with(prefix) {
        return None;
    }
    Some(format!("{}{}", prefix, name.trim_start_matches(is_separator)))
}

/// Truncate or pad into the allowed length range
///
/// An overlong name that fits its pattern loses characters from the longest
/// service or team slot, so literals, tokens and the version survive. Other
/// names are cut before a trailing version segment.
pub fn fit_length(name: &str, ctx: &RepairContext) -> Option<String> {
    let length = name.chars().count();

    if length < MIN_NAME_LENGTH {
        let base = name.trim_matches(is_separator);
        if base.is_empty() {
            return None;
        }
        let mut padded = base.to_string();
        while padded.chars().count() < MIN_NAME_LENGTH {
            padded.push('0');
        }
        return Some(padded);
    }

    if length <= MAX_NAME_LENGTH {
        return None;
    }

    if let Some(shortened) = ctx
        .pattern
        .as_deref()
        .and_then(|pattern| shorten_slots(name, pattern))
    {
        return Some(shortened);
    }

    let (head, tail) = match trailing_version(name) {
        Some(version) => (&name[..name.len() - version.len() - 1], Some(version)),
        None => (name, None),
    };

    let budget = match tail {
        Some(version) => MAX_NAME_LENGTH.checked_sub(version.len() + 1)?,
        None => MAX_NAME_LENGTH,
    };

    let cut: String = head.chars().take(budget).collect();
    let cut = cut.trim_end_matches(is_separator);
    if cut.is_empty() {
        return None;
    }

    Some(match tail {
        Some(version) => format!("{}-{}", cut, version),
        None => cut.to_string(),
    })
}

/// Shorten the longest shortenable slot until the rendered name fits
fn shorten_slots(name: &str, pattern: &CompiledPattern) -> Option<String> {
    let parts = pattern.decompose(name)?;
    let mut slots = parts.slots;
    let mut excess = name.chars().count().checked_sub(MAX_NAME_LENGTH)?;

    while excess > 0 {
        let (kind, value) = SHORTENABLE_SLOTS
            .iter()
            .filter_map(|kind| slots.get(kind).map(|v| (*kind, v.clone())))
            .max_by_key(|(_, v)| v.chars().count())?;

        let length = value.chars().count();
        let keep: String = value.chars().take(length.saturating_sub(excess).max(1)).collect();
        let keep = keep.trim_end_matches(is_separator).to_string();
        let removed = length - keep.chars().count();
        if keep.is_empty() || removed == 0 {
            return None;
        }

        excess = excess.saturating_sub(removed);
        slots.insert(kind, keep);
    }

    let shortened = pattern.render(&slots, parts.suffix.as_deref());
    (shortened.chars().count() <= MAX_NAME_LENGTH).then_some(shortened)
}

/// Final `-`-separated segment when it looks like a version (`1`, `1.0.0`, `v2`)
fn trailing_version(name: &str) -> Option<&str> {
    let (_, last) = name.rsplit_once('-')?;
    let digits = last.strip_prefix('v').unwrap_or(last);
    let looks_like_version = !digits.is_empty()
        && digits.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    looks_like_version.then_some(last)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}
