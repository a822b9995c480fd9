use std::collections::BTreeMap;

use dashmap::DashMap;

/// Expanded/collapsed flags for views in the sidebar tree, keyed by view id.
///
/// Shared between containers through an `Arc`; unknown views are collapsed.
#[derive(Debug, Default)]
pub struct ExpansionRegistry {
    flags: DashMap<String, bool>,
}

impl ExpansionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, view_id: &str) -> bool {
        self.flags.get(view_id).map(|flag| *flag).unwrap_or(false)
    }

    pub fn set_expanded(&self, view_id: impl Into<String>, expanded: bool) {
        self.flags.insert(view_id.into(), expanded);
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self, view_id: &str) -> bool {
        let mut entry = self.flags.entry(view_id.to_string()).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn remove(&self, view_id: &str) {
        self.flags.remove(view_id);
    }

    pub fn expanded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .flags
            .iter()
            .filter(|entry| *entry.value())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Serialized form handed to the settings store.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let ordered: BTreeMap<String, bool> = self
            .flags
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        serde_json::to_string(&ordered)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let ordered: BTreeMap<String, bool> = serde_json::from_str(raw)?;
        Ok(Self {
            flags: ordered.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_from_collapsed_default() {
        let registry = ExpansionRegistry::new();
        assert!(!registry.is_expanded("v1"));
        assert!(registry.toggle("v1"));
        assert!(registry.is_expanded("v1"));
        assert!(!registry.toggle("v1"));
    }

    #[test]
    fn persisted_flags_restore_expanded_set() {
        let registry = ExpansionRegistry::new();
        registry.set_expanded("b", true);
        registry.set_expanded("a", true);
        registry.set_expanded("c", false);
        registry.remove("b");

        let raw = registry.to_json().expect("serialize registry");
        assert_eq!(raw, r#"{"a":true,"c":false}"#);

        let restored = ExpansionRegistry::from_json(&raw).expect("restore registry");
        assert_eq!(restored.expanded_ids(), vec!["a".to_string()]);
    }
}
