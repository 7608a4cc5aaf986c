//! Definition merging.
//!
//! Every field is replaced by the more specific side when it is set, except
//! `headers` and `expect.headers`, which are unioned with the more specific
//! side winning per key (header names compare case-insensitively).

use std::collections::BTreeMap;

use crate::definition::{Expect, ExpectSpec, TestDefinition};

/// Union two maps; `over` wins on conflicting keys.
pub fn union_maps<V: Clone>(
    base: Option<&BTreeMap<String, V>>,
    over: Option<&BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match (base, over) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(over)) => Some(over.clone()),
        (Some(base), Some(over)) => {
            let mut merged: BTreeMap<String, V> = base
                .iter()
                .filter(|(name, _)| !over.keys().any(|k| k.eq_ignore_ascii_case(name)))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            merged.extend(over.iter().map(|(name, value)| (name.clone(), value.clone())));
            Some(merged)
        }
    }
}

/// Merge two expectations. Two structured expectations union their headers
/// and take the more specific body; otherwise the more specific one replaces.
pub fn merge_expect(base: Option<&Expect>, over: Option<&Expect>) -> Option<Expect> {
    match (base, over) {
        (Some(Expect::Structured(base)), Some(Expect::Structured(over))) => {
            Some(Expect::Structured(ExpectSpec {
                headers: union_maps(base.headers.as_ref(), over.headers.as_ref()),
                body: over.body.clone().or_else(|| base.body.clone()),
            }))
        }
        (_, Some(over)) => Some(over.clone()),
        (base, None) => base.cloned(),
    }
}

/// Overlay `over` onto `base`, producing a new definition.
pub fn merge_definition(base: &TestDefinition, over: &TestDefinition) -> TestDefinition {
    TestDefinition {
        name: over.name.clone().or_else(|| base.name.clone()),
        skip: base.skip || over.skip,
        verb: over.verb.or(base.verb),
        url: over.url.clone().or_else(|| base.url.clone()),
        headers: union_maps(base.headers.as_ref(), over.headers.as_ref()),
        body: over.body.clone().or_else(|| base.body.clone()),
        auth: over.auth.clone().or_else(|| base.auth.clone()),
        expect: merge_expect(base.expect.as_ref(), over.expect.as_ref()),
        error: over.error.clone().or_else(|| base.error.clone()),
        steps: over.steps.clone().or_else(|| base.steps.clone()),
    }
}
