//! Component registry and link-time collection of built-ins.
//!
//! The registry maps component names to their implementations. Node crates
//! register factories at link time with [`inventory`]; hosts can also
//! register components by hand or merge registries from several crates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::component::{Component, ComponentMetadata};
use crate::error::BuildResult;
use crate::node::NodeShape;

/// Factory entry collected at link time.
///
/// Component crates submit one entry per built-in:
///
/// ```ignore
/// inventory::submit!(spell_engine::ComponentEntry(|| Arc::new(EventRecall)));
/// ```
pub struct ComponentEntry(pub fn() -> Arc<dyn Component>);

inventory::collect!(ComponentEntry);

/// A component's metadata together with its declared shape, as served to
/// editors building a node palette.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub metadata: ComponentMetadata,
    pub shape: NodeShape,
}

/// Maps component names to implementations.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every component submitted through
    /// [`ComponentEntry`] by the crates linked into this binary.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<ComponentEntry> {
            registry.register((entry.0)());
        }
        registry
    }

    /// Register a component under its metadata name, replacing any previous
    /// registration of the same name.
    pub fn register(&mut self, component: Arc<dyn Component>) {
        let name = component.metadata().name;
        log::debug!("Registering component '{name}'");
        self.entries.insert(name, component);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absorb another registry. Entries in `other` override same-named
    /// entries here.
    pub fn merge(&mut self, other: ComponentRegistry) {
        self.entries.extend(other.entries);
    }

    /// Metadata for every registered component.
    pub fn all_metadata(&self) -> Vec<ComponentMetadata> {
        self.entries.values().map(|c| c.metadata()).collect()
    }

    /// Palette entries for every registered component, sorted by name.
    ///
    /// Components whose builder fails are skipped with a warning rather
    /// than failing the whole palette.
    pub fn palette(&self) -> Vec<PaletteEntry> {
        let mut entries: Vec<PaletteEntry> = self
            .entries
            .values()
            .filter_map(|component| {
                let metadata = component.metadata();
                match component.describe() {
                    Ok(shape) => Some(PaletteEntry { metadata, shape }),
                    Err(err) => {
                        log::warn!(
                            "Skipping component '{}' in palette: {err}",
                            metadata.name
                        );
                        None
                    }
                }
            })
            .collect();
        entries.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        entries
    }

    /// Build every registered component's shape, reporting the first
    /// builder failure. Used by hosts to sanity-check a registry at boot.
    pub fn check(&self) -> BuildResult<()> {
        for component in self.entries.values() {
            component.describe()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names())
            .finish()
    }
}
