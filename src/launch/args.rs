//! Argument codec - splits step arguments into fixed and step-specific parts
//!
//! Step arguments are flat CLI-style lists such as
//! `["--step_source", "steps.trainer", "--run_name", "run1"]`. Options whose
//! name is in the volatile set change from step to step; every other option
//! is expected to carry the same value for every step of a run, so it only
//! needs to be shipped once.

use std::collections::HashSet;

/// Prefix marking an element as an option key
pub const OPTION_MARKER: &str = "--";

/// Option carrying the step implementation source
pub const STEP_SOURCE_OPTION: &str = "step_source";
/// Option carrying the JSON map of input artifact sources
pub const INPUT_ARTIFACT_SOURCES_OPTION: &str = "input_artifact_sources";
/// Option carrying the JSON map of materializer sources
pub const MATERIALIZER_SOURCES_OPTION: &str = "materializer_sources";

/// Set of option names whose values legitimately differ per step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileOptions {
    names: HashSet<String>,
}

impl VolatileOptions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` (without the option marker) is volatile
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Default for VolatileOptions {
    fn default() -> Self {
        Self::new([
            STEP_SOURCE_OPTION,
            INPUT_ARTIFACT_SOURCES_OPTION,
            MATERIALIZER_SOURCES_OPTION,
        ])
    }
}

/// Result of partitioning one step's arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedArgs {
    /// Pairs of invariant options, in original order
    pub fixed: Vec<String>,
    /// Pairs of volatile options, in original order
    pub step_specific: Vec<String>,
}

/// Render an option name as a key, e.g. `run_name` -> `--run_name`
pub fn option(name: &str) -> String {
    format!("{}{}", OPTION_MARKER, name)
}

/// Parse `args` into `(option name, value)` pairs.
///
/// A key consumes the element after it as its value, even when that value
/// starts with the option marker. Values without a key and a trailing key
/// without a value are dropped.
pub fn parse_pairs(args: &[String]) -> Vec<(&str, &str)> {
    let mut pairs = Vec::with_capacity(args.len() / 2);
    let mut i = 0;
    while i < args.len() {
        match args[i].strip_prefix(OPTION_MARKER) {
            Some(name) if i + 1 < args.len() => {
                pairs.push((name, args[i + 1].as_str()));
                i += 2;
            }
            // trailing key without a value, or a stray value
            _ => i += 1,
        }
    }
    pairs
}

/// Split `args` into fixed and step-specific pairs.
pub fn partition_args(args: &[String], volatile: &VolatileOptions) -> PartitionedArgs {
    let mut partitioned = PartitionedArgs::default();
    for (name, value) in parse_pairs(args) {
        let target = if volatile.contains(name) {
            &mut partitioned.step_specific
        } else {
            &mut partitioned.fixed
        };
        target.push(option(name));
        target.push(value.to_string());
    }
    partitioned
}

/// Pairs of invariant options only
pub fn fixed_args(args: &[String], volatile: &VolatileOptions) -> Vec<String> {
    partition_args(args, volatile).fixed
}

/// Pairs of volatile options only
pub fn step_specific_args(args: &[String], volatile: &VolatileOptions) -> Vec<String> {
    partition_args(args, volatile).step_specific
}

/// First value given for option `name`
pub fn option_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    parse_pairs(args)
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
}

/// Re-emit `args` as well-formed pairs without any pair for option `name`
pub fn remove_option(args: &[String], name: &str) -> Vec<String> {
    parse_pairs(args)
        .into_iter()
        .filter(|(n, _)| *n != name)
        .flat_map(|(n, v)| [option(n), v.to_string()])
        .collect()
}
