//! Catalog operators: CREATE/DROP TABLE and the SHOW statements.

use super::{rows_affected_table, PhysicalOperator};
use crate::concurrency::TransactionContext;
use crate::explain::{Explainable, ExplainEntry};
use crate::storage::{ColumnDefinition, DataType, ScalarValue, StorageManager, Table};
use granite_error::Result;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CreateTableOperator {
    pub storage: Arc<StorageManager>,
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub if_not_exists: bool,
    pub target_chunk_size: usize,
}

impl CreateTableOperator {
    pub(super) fn execute(
        &self,
        _op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        if self.if_not_exists && self.storage.has_table(&self.table_name) {
            return rows_affected_table(0);
        }
        self.storage.add_table(
            &self.table_name,
            Table::new(self.columns.clone(), self.target_chunk_size),
        )?;
        rows_affected_table(0)
    }
}

impl Explainable for CreateTableOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("CreateTable").with_value("table", &self.table_name)
    }
}

#[derive(Debug, Clone)]
pub struct DropTableOperator {
    pub storage: Arc<StorageManager>,
    pub table_name: String,
    pub if_exists: bool,
}

impl DropTableOperator {
    pub(super) fn execute(
        &self,
        _op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        if self.if_exists && !self.storage.has_table(&self.table_name) {
            return rows_affected_table(0);
        }
        self.storage.drop_table(&self.table_name)?;
        rows_affected_table(0)
    }
}

impl Explainable for DropTableOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("DropTable").with_value("table", &self.table_name)
    }
}

#[derive(Debug, Clone)]
pub struct ShowTablesOperator {
    pub storage: Arc<StorageManager>,
}

impl ShowTablesOperator {
    pub(super) fn execute(
        &self,
        _op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let out = Table::new(
            vec![ColumnDefinition::new("table_name", DataType::Utf8, false)],
            crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE,
        );
        let rows = self
            .storage
            .table_names()
            .into_iter()
            .map(|name| vec![ScalarValue::Utf8(name)])
            .collect();
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }
}

impl Explainable for ShowTablesOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("ShowTables")
    }
}

#[derive(Debug, Clone)]
pub struct ShowColumnsOperator {
    pub table_name: String,
    pub table: Arc<Table>,
}

impl ShowColumnsOperator {
    pub(super) fn execute(
        &self,
        _op: &PhysicalOperator,
        _ctx: Option<&Arc<TransactionContext>>,
    ) -> Result<Arc<Table>> {
        let out = Table::new(
            vec![
                ColumnDefinition::new("column_name", DataType::Utf8, false),
                ColumnDefinition::new("data_type", DataType::Utf8, false),
                ColumnDefinition::new("nullable", DataType::Utf8, false),
            ],
            crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE,
        );
        let rows = self
            .table
            .column_definitions()
            .iter()
            .map(|def| {
                vec![
                    ScalarValue::Utf8(def.name.clone()),
                    ScalarValue::Utf8(def.data_type.to_string()),
                    ScalarValue::Utf8(if def.nullable { "yes" } else { "no" }.to_string()),
                ]
            })
            .collect();
        out.append_rows(rows, 0)?;
        Ok(Arc::new(out))
    }
}

impl Explainable for ShowColumnsOperator {
    fn explain_entry(&self) -> ExplainEntry {
        ExplainEntry::new("ShowColumns").with_value("table", &self.table_name)
    }
}
