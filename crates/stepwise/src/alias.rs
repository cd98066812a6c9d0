//! Named subject snapshots for later steps.

use std::collections::HashMap;

use crate::result::{StepwiseError, StepwiseResult};
use crate::subject::Subject;

/// Alias registry scoped to one test execution
#[derive(Debug, Clone, Default)]
pub struct AliasStore {
    entries: HashMap<String, Subject>,
}

fn bare(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

impl AliasStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subject` under `name`, returning the subject it replaced
    pub fn store(&mut self, name: impl AsRef<str>, subject: Subject) -> Option<Subject> {
        let name = bare(name.as_ref()).to_string();
        tracing::debug!(alias = %name, subject = %subject, "alias stored");
        self.entries.insert(name, subject)
    }

    /// Fetch the subject stored under `name` (a leading `@` is ignored)
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::UnknownAlias`] if nothing was stored.
    pub fn fetch(&self, name: &str) -> StepwiseResult<Subject> {
        let name = bare(name);
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| StepwiseError::UnknownAlias {
                name: name.to_string(),
            })
    }

    /// Whether `name` is stored
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(bare(name))
    }

    /// Number of stored aliases
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every alias
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let mut store = AliasStore::new();
        assert!(store.store("email", Subject::Value(json!("a@b.c"))).is_none());
        assert_eq!(store.fetch("email").unwrap(), Subject::Value(json!("a@b.c")));
        assert_eq!(store.fetch("@email").unwrap(), Subject::Value(json!("a@b.c")));
    }

    #[test]
    fn test_overwrite_replaces() {
        let mut store = AliasStore::new();
        store.store("x", Subject::Value(json!(1)));
        let previous = store.store("@x", Subject::Value(json!(2)));
        assert_eq!(previous, Some(Subject::Value(json!(1))));
        assert_eq!(store.fetch("x").unwrap(), Subject::Value(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_alias() {
        let store = AliasStore::new();
        match store.fetch("@missing") {
            Err(StepwiseError::UnknownAlias { name }) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownAlias, got {other:?}"),
        }
    }

    #[test]
    fn test_clear() {
        let mut store = AliasStore::new();
        store.store("a", Subject::None);
        assert!(store.contains("@a"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.fetch("a").is_err());
    }

    proptest! {
        #[test]
        fn prop_unrelated_stores_keep_value(
            name in "[a-z]{1,8}",
            others in proptest::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..16),
            value in any::<i64>(),
        ) {
            let mut store = AliasStore::new();
            store.store(&name, Subject::Value(json!(value)));
            for (other, v) in &others {
                if other != &name {
                    store.store(other, Subject::Value(json!(v)));
                }
            }
            prop_assert_eq!(store.fetch(&name).unwrap(), Subject::Value(json!(value)));
        }

        #[test]
        fn prop_last_store_wins(name in "[a-z]{1,8}", values in proptest::collection::vec(any::<i64>(), 1..8)) {
            let mut store = AliasStore::new();
            for v in &values {
                store.store(&name, Subject::Value(json!(v)));
            }
            let last = values.last().copied().unwrap();
            prop_assert_eq!(store.fetch(&name).unwrap(), Subject::Value(json!(last)));
        }
    }
}
