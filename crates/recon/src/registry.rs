use std::collections::{BTreeMap, BTreeSet};

use registrar_core::{AttrBag, EntityKind, RegistryEntity};

use crate::error::ReconError;
use crate::executor::Registry;

/// A row in another table pointing at an entity. Merges reassign these
/// before the duplicate entity is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referring table, e.g. "site" or "membership".
    pub source: String,
    pub source_id: String,
    pub entity_id: String,
}

/// Deterministic in-memory registry: sequential ids, ordered iteration.
/// Used by the integration tests and as the reference semantics for the
/// `Registry` seam.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entities: BTreeMap<String, RegistryEntity>,
    references: Vec<Reference>,
    next_id: usize,
    /// Entity names whose next write fails, for failure-path tests.
    poisoned: BTreeSet<String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity with the next sequential id.
    pub fn seed(&mut self, kind: EntityKind, name: &str) -> String {
        let id = self.mint_id();
        self.entities
            .insert(id.clone(), RegistryEntity::new(id.clone(), name, kind));
        id
    }

    pub fn seed_with_attrs(&mut self, kind: EntityKind, name: &str, attrs: AttrBag) -> String {
        let id = self.seed(kind, name);
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.attrs = attrs;
        }
        id
    }

    pub fn add_reference(&mut self, source: &str, source_id: &str, entity_id: &str) {
        self.references.push(Reference {
            source: source.to_string(),
            source_id: source_id.to_string(),
            entity_id: entity_id.to_string(),
        });
    }

    pub fn references_to(&self, entity_id: &str) -> Vec<&Reference> {
        self.references
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .collect()
    }

    /// Make the next write naming this entity fail.
    pub fn poison(&mut self, name: &str) {
        self.poisoned.insert(name.to_string());
    }

    pub fn entity(&self, id: &str) -> Option<&RegistryEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("e{}", self.next_id)
    }

    fn check_poison(&mut self, name: &str) -> Result<(), ReconError> {
        if self.poisoned.remove(name) {
            return Err(ReconError::Registry(format!(
                "simulated write failure for '{name}'"
            )));
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    fn fetch_snapshot(&self, kind: EntityKind) -> Result<Vec<RegistryEntity>, ReconError> {
        Ok(self
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    fn create_entity(
        &mut self,
        kind: EntityKind,
        name: &str,
        attrs: &AttrBag,
    ) -> Result<String, ReconError> {
        self.check_poison(name)?;
        let id = self.mint_id();
        let mut entity = RegistryEntity::new(id.clone(), name, kind);
        entity.attrs = attrs.clone();
        self.entities.insert(id.clone(), entity);
        Ok(id)
    }

    fn update_entity(&mut self, id: &str, attrs: &AttrBag) -> Result<(), ReconError> {
        let name = self
            .entities
            .get(id)
            .map(|e| e.name.clone())
            .ok_or_else(|| ReconError::Registry(format!("unknown entity '{id}'")))?;
        self.check_poison(&name)?;
        let entity = self.entities.get_mut(id).expect("entity checked above");
        entity.attrs.merge(attrs);
        Ok(())
    }

    fn merge_entities(
        &mut self,
        primary_id: &str,
        duplicate_ids: &[String],
    ) -> Result<(), ReconError> {
        if !self.entities.contains_key(primary_id) {
            return Err(ReconError::Registry(format!(
                "merge primary '{primary_id}' does not exist"
            )));
        }
        for duplicate_id in duplicate_ids {
            // Already-merged duplicates are skipped, so re-running the same
            // merge is a no-op.
            let Some(duplicate) = self.entities.remove(duplicate_id) else {
                continue;
            };
            for reference in &mut self.references {
                if reference.entity_id == *duplicate_id {
                    reference.entity_id = primary_id.to_string();
                }
            }
            let primary = self.entities.get_mut(primary_id).expect("checked above");
            primary.attrs.fill_missing(&duplicate.attrs);
            primary.geometries.extend(duplicate.geometries);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_filters_by_kind() {
        let mut registry = MemoryRegistry::new();
        registry.seed(EntityKind::Employer, "Acme Pty Ltd");
        registry.seed(EntityKind::Patch, "North Zone");

        let employers = registry.fetch_snapshot(EntityKind::Employer).unwrap();
        assert_eq!(employers.len(), 1);
        assert_eq!(employers[0].name, "Acme Pty Ltd");
    }

    #[test]
    fn merge_reassigns_references_and_removes_duplicates() {
        let mut registry = MemoryRegistry::new();
        let primary = registry.seed(EntityKind::Employer, "Acme Pty Ltd");
        let duplicate = registry.seed(EntityKind::Employer, "ACME PTY. LTD.");
        registry.add_reference("site", "s1", &duplicate);
        registry.add_reference("membership", "m1", &duplicate);
        registry.add_reference("site", "s2", &primary);

        registry
            .merge_entities(&primary, &[duplicate.clone()])
            .unwrap();

        assert!(registry.entity(&duplicate).is_none());
        assert_eq!(registry.references_to(&primary).len(), 3);
        assert!(registry.references_to(&duplicate).is_empty());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut registry = MemoryRegistry::new();
        let primary = registry.seed(EntityKind::Employer, "Acme");
        let duplicate = registry.seed(EntityKind::Employer, "Acme 2");
        registry.add_reference("site", "s1", &duplicate);

        registry
            .merge_entities(&primary, &[duplicate.clone()])
            .unwrap();
        registry
            .merge_entities(&primary, &[duplicate.clone()])
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.references_to(&primary).len(), 1);
    }

    #[test]
    fn merge_keeps_primary_attrs_and_fills_missing() {
        let mut registry = MemoryRegistry::new();
        let mut primary_attrs = AttrBag::new();
        primary_attrs.insert("industry", "construction");
        let primary =
            registry.seed_with_attrs(EntityKind::Employer, "Acme", primary_attrs);

        let mut duplicate_attrs = AttrBag::new();
        duplicate_attrs.insert("industry", "catering");
        duplicate_attrs.insert("suburb", "Footscray");
        let duplicate =
            registry.seed_with_attrs(EntityKind::Employer, "Acme 2", duplicate_attrs);

        registry.merge_entities(&primary, &[duplicate]).unwrap();

        let merged = registry.entity(&primary).unwrap();
        assert_eq!(merged.attrs.get("industry"), Some("construction"));
        assert_eq!(merged.attrs.get("suburb"), Some("Footscray"));
    }

    #[test]
    fn poisoned_write_fails_once() {
        let mut registry = MemoryRegistry::new();
        registry.poison("Acme");

        let err = registry
            .create_entity(EntityKind::Employer, "Acme", &AttrBag::new())
            .unwrap_err();
        assert!(err.to_string().contains("simulated"));

        // The poison is spent; the retry succeeds.
        registry
            .create_entity(EntityKind::Employer, "Acme", &AttrBag::new())
            .unwrap();
    }
}
