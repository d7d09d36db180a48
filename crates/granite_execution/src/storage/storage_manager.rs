use super::table::Table;
use granite_error::{GraniteError, Result, TranslationErrorKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The table catalog. One per [`Engine`]; nothing in the crate reaches for a
/// process-wide instance.
///
/// [`Engine`]: crate::engine::Engine
#[derive(Debug, Default)]
pub struct StorageManager {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl StorageManager {
    pub fn new() -> StorageManager {
        StorageManager::default()
    }

    pub fn add_table(&self, name: impl Into<String>, table: Table) -> Result<Arc<Table>> {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(GraniteError::new(format!("table {name} already exists")));
        }
        let table = Arc::new(table);
        tables.insert(name, table.clone());
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables.read().get(name).cloned().ok_or_else(|| {
            GraniteError::translation(
                TranslationErrorKind::UnknownIdentifier,
                format!("no table named {name}"),
            )
        })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        match self.tables.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(GraniteError::translation(
                TranslationErrorKind::UnknownIdentifier,
                format!("no table named {name}"),
            )),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::datatype::DataType;
    use crate::storage::table::{ColumnDefinition, DEFAULT_TARGET_CHUNK_SIZE};

    fn empty_table() -> Table {
        Table::new(
            vec![ColumnDefinition::new("a", DataType::Int32, false)],
            DEFAULT_TARGET_CHUNK_SIZE,
        )
    }

    #[test]
    fn add_get_drop() {
        let storage = StorageManager::new();
        storage.add_table("t", empty_table()).unwrap();
        assert!(storage.get_table("t").is_ok());
        assert!(storage.add_table("t", empty_table()).is_err());
        assert!(storage.get_table("missing").is_err());

        assert_eq!(vec!["t".to_string()], storage.table_names());
        storage.drop_table("t").unwrap();
        assert!(!storage.has_table("t"));
    }
}
