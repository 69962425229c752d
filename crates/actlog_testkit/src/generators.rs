//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random keys, decisions, and
//! documents.

use actlog_codec::Value;
use actlog_core::Decision;
use proptest::prelude::*;
use std::time::{Duration, UNIX_EPOCH};

/// Strategy for generating single tuple values of every type.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<String>().prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Inf),
    ]
}

/// Strategy for generating tuples of up to `max_len` values.
pub fn tuple_strategy(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(value_strategy(), 0..=max_len)
}

/// Strategy for generating action kinds.
pub fn kind_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9.]{0,15}").expect("Invalid regex")
}

/// Strategy for generating a single decision.
pub fn decision_strategy() -> impl Strategy<Value = Decision> {
    (
        prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
        0u64..2_000_000_000,
        any::<bool>(),
    )
        .prop_map(|(name, secs, approved)| {
            Decision::new(name, UNIX_EPOCH + Duration::from_secs(secs), approved)
        })
}

/// Strategy for generating decision lists.
pub fn decisions_strategy(max_len: usize) -> impl Strategy<Value = Vec<Decision>> {
    prop::collection::vec(decision_strategy(), 0..=max_len)
}

/// A generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocInput {
    /// Document id.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Document body.
    pub text: String,
}

/// Strategy for generating documents.
pub fn doc_strategy() -> impl Strategy<Value = DocInput> {
    (
        prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex"),
        ".{0,32}",
        ".{0,256}",
    )
        .prop_map(|(id, title, text)| DocInput { id, title, text })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
