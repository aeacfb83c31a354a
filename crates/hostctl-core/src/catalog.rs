//! Name-keyed set of capabilities.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::Capability;

/// Name and description of a registered capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
}

/// Capabilities addressable by name.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    entries: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilitySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any previous one with the same name.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.entries.insert(name.clone(), capability).is_some() {
            tracing::warn!(capability = %name, "Replaced existing capability");
        }
    }

    /// Builder-style register.
    #[must_use]
    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Look up a capability by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.entries.get(name).map(Arc::clone)
    }

    /// Sorted name/description list.
    #[must_use]
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        self.entries
            .values()
            .map(|c| CapabilityInfo {
                name: c.name().to_string(),
                description: c.description().to_string(),
            })
            .collect()
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{CapabilityArgs, CapabilityError, CapabilityOutput};

    struct Named(&'static str);

    #[async_trait]
    impl Capability for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test capability"
        }

        async fn invoke(&self, _args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
            Ok(CapabilityOutput::new(self.0))
        }
    }

    #[tokio::test]
    async fn test_lookup_and_describe() {
        let set = CapabilitySet::new()
            .with(Arc::new(Named("read_file")))
            .with(Arc::new(Named("get_cwd")));

        assert_eq!(set.len(), 2);
        assert!(set.get("missing").is_none());

        let out = set
            .get("read_file")
            .unwrap()
            .invoke(&CapabilityArgs::new())
            .await
            .unwrap();
        assert_eq!(out.message, "read_file");

        let names: Vec<_> = set.describe().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["get_cwd", "read_file"]);
    }
}
