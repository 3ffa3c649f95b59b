//! Per-run attribute name cache.

use std::collections::HashMap;

use tracing::debug;

use filecensus_core::{AttributeId, IndexError, IndexStore, fold_case};

/// One provider column mapped to its stored attribute id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeHeader {
    /// Position in the provider's attribute list.
    pub index: usize,
    pub name: String,
    pub id: AttributeId,
}

/// Append-only, case-insensitive name to id cache backed by the store.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    ids: HashMap<String, AttributeId>,
    headers: Vec<AttributeHeader>,
}

impl AttributeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider column up front. Blank names and names that
    /// repeat an earlier column case-insensitively are not captured.
    pub fn register<S: IndexStore + ?Sized>(
        store: &S,
        names: &[String],
    ) -> Result<Self, IndexError> {
        let mut catalog = Self::new();
        for (index, name) in names.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() || catalog.ids.contains_key(&fold_case(name)) {
                continue;
            }
            let id = catalog.id_for(store, name)?;
            catalog.headers.push(AttributeHeader {
                index,
                name: name.to_string(),
                id,
            });
        }
        debug!(headers = catalog.headers.len(), "Attribute headers registered");
        Ok(catalog)
    }

    /// Id for `name`, asking the store only on a cache miss.
    pub fn id_for<S: IndexStore + ?Sized>(
        &mut self,
        store: &S,
        name: &str,
    ) -> Result<AttributeId, IndexError> {
        let key = fold_case(name);
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        let id = store.get_or_create_attribute_id(name)?;
        self.ids.insert(key, id);
        Ok(id)
    }

    /// Cached id, if `name` was seen this run.
    pub fn get(&self, name: &str) -> Option<AttributeId> {
        self.ids.get(&fold_case(name)).copied()
    }

    /// Registered provider columns, in column order.
    pub fn headers(&self) -> &[AttributeHeader] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecensus_store::SqliteStore;

    #[test]
    fn test_register_dedupes_and_skips_blank() {
        let store = SqliteStore::open_in_memory().unwrap();
        let names: Vec<String> = ["Name", "", "Size", "NAME", " Tags "]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let catalog = AttributeCatalog::register(&store, &names).unwrap();
        let headers = catalog.headers();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].index, 0);
        assert_eq!(headers[1].index, 2);
        assert_eq!(headers[2].index, 4);
        assert_eq!(headers[2].name, "Tags");
        assert_eq!(store.list_attribute_names().unwrap().len(), 3);
    }

    #[test]
    fn test_id_for_is_case_insensitive_and_cached() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut catalog = AttributeCatalog::new();
        let a = catalog.id_for(&store, "Date modified").unwrap();
        let b = catalog.id_for(&store, "date MODIFIED").unwrap();
        assert_eq!(a, b);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("DATE MODIFIED"), Some(a));
        assert_eq!(catalog.get("Size"), None);
    }

    #[test]
    fn test_reregistering_reuses_stored_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let names = vec!["Name".to_string(), "Size".to_string()];
        let first = AttributeCatalog::register(&store, &names).unwrap();
        let second = AttributeCatalog::register(&store, &names).unwrap();
        assert_eq!(first.headers(), second.headers());
    }
}
