use super::chunk::Chunk;
use super::datatype::DataType;
use super::index::{ChunkIndex, CompositeGroupKeyIndex, GroupKeyIndex, IndexKind, TableIndex};
use super::mvcc::TransactionId;
use super::scalar::ScalarValue;
use crate::statistics::TableStatistics;
use granite_error::{GraniteError, OperatorErrorKind, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

pub const DEFAULT_TARGET_CHUNK_SIZE: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> ColumnDefinition {
        ColumnDefinition {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Position of a row within a data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub chunk: u32,
    pub offset: u32,
}

#[derive(Debug)]
enum TableData {
    /// Owns rows in chunks.
    Data { chunks: RwLock<Vec<Arc<Chunk>>> },
    /// A view: positions into a data table. Built by scans and validation so
    /// that rows keep their identity until an operator has to materialize.
    References {
        table: Arc<Table>,
        positions: Vec<RowId>,
    },
}

/// A column-oriented table, either owning its rows or referencing another
/// table's rows through a position list.
#[derive(Debug)]
pub struct Table {
    definitions: Vec<ColumnDefinition>,
    data: TableData,
    target_chunk_size: usize,
    statistics: RwLock<Option<Arc<TableStatistics>>>,
    indexes: RwLock<Vec<Arc<TableIndex>>>,
    insert_lock: Mutex<()>,
}

impl Table {
    pub fn new(definitions: Vec<ColumnDefinition>, target_chunk_size: usize) -> Table {
        assert!(target_chunk_size > 0, "chunk size must be positive");
        Table {
            definitions,
            data: TableData::Data {
                chunks: RwLock::new(Vec::new()),
            },
            target_chunk_size,
            statistics: RwLock::new(None),
            indexes: RwLock::new(Vec::new()),
            insert_lock: Mutex::new(()),
        }
    }

    /// A reference table over `base`. Positions must be data-table row ids,
    /// as handed out by [`row_id_at`]; when `base` is itself a reference
    /// table it is unwrapped so references always point at a data table.
    ///
    /// [`row_id_at`]: Table::row_id_at
    pub fn new_references(base: Arc<Table>, positions: Vec<RowId>) -> Table {
        let table = match &base.data {
            TableData::Data { .. } => base.clone(),
            TableData::References { table, .. } => table.clone(),
        };
        Table {
            definitions: base.definitions.clone(),
            data: TableData::References { table, positions },
            target_chunk_size: base.target_chunk_size,
            statistics: RwLock::new(None),
            indexes: RwLock::new(Vec::new()),
            insert_lock: Mutex::new(()),
        }
    }

    pub fn is_references(&self) -> bool {
        matches!(self.data, TableData::References { .. })
    }

    /// The data table a reference table points at.
    pub fn referenced_table(&self) -> Option<Arc<Table>> {
        match &self.data {
            TableData::References { table, .. } => Some(table.clone()),
            TableData::Data { .. } => None,
        }
    }

    pub fn column_definitions(&self) -> &[ColumnDefinition] {
        &self.definitions
    }

    pub fn column_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn column_index_of(&self, name: &str) -> Option<usize> {
        self.definitions.iter().position(|d| d.name == name)
    }

    pub fn target_chunk_size(&self) -> usize {
        self.target_chunk_size
    }

    pub fn chunks(&self) -> Vec<Arc<Chunk>> {
        match &self.data {
            TableData::Data { chunks } => chunks.read().clone(),
            TableData::References { .. } => Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.data {
            TableData::Data { chunks } => chunks.read().iter().map(|c| c.size()).sum(),
            TableData::References { positions, .. } => positions.len(),
        }
    }

    /// Value at a linear row number, resolving reference indirection.
    pub fn value(&self, column: usize, row: usize) -> ScalarValue {
        match &self.data {
            TableData::Data { chunks } => {
                let chunks = chunks.read();
                let mut remaining = row;
                for chunk in chunks.iter() {
                    let size = chunk.size();
                    if remaining < size {
                        return chunk.value(column, remaining);
                    }
                    remaining -= size;
                }
                panic!("row {row} out of range");
            }
            TableData::References { table, positions } => {
                table.value_at(column, positions[row])
            }
        }
    }

    /// Value at a data-table row id.
    pub fn value_at(&self, column: usize, row_id: RowId) -> ScalarValue {
        match &self.data {
            TableData::Data { chunks } => {
                chunks.read()[row_id.chunk as usize].value(column, row_id.offset as usize)
            }
            TableData::References { table, .. } => table.value_at(column, row_id),
        }
    }

    /// Data-table row id behind a linear row number.
    pub fn row_id_at(&self, row: usize) -> RowId {
        match &self.data {
            TableData::Data { chunks } => {
                let chunks = chunks.read();
                let mut remaining = row;
                for (chunk_id, chunk) in chunks.iter().enumerate() {
                    let size = chunk.size();
                    if remaining < size {
                        return RowId {
                            chunk: chunk_id as u32,
                            offset: remaining as u32,
                        };
                    }
                    remaining -= size;
                }
                panic!("row {row} out of range");
            }
            TableData::References { positions, .. } => positions[row],
        }
    }

    pub fn row_values(&self, row: usize) -> Vec<ScalarValue> {
        (0..self.column_count()).map(|c| self.value(c, row)).collect()
    }

    pub fn chunk(&self, chunk_id: u32) -> Arc<Chunk> {
        match &self.data {
            TableData::Data { chunks } => chunks.read()[chunk_id as usize].clone(),
            TableData::References { .. } => panic!("chunk access on reference table"),
        }
    }

    /// Append rows, each already matching the table's width and column types.
    /// Returns the new rows' ids. The rows carry `tid` and stay invisible to
    /// MVCC-validated reads until that transaction commits.
    pub fn append_rows(
        &self,
        rows: Vec<Vec<ScalarValue>>,
        tid: TransactionId,
    ) -> Result<Vec<RowId>> {
        let chunks = match &self.data {
            TableData::Data { chunks } => chunks,
            TableData::References { .. } => {
                return Err(GraniteError::new("cannot insert into a reference table"))
            }
        };

        let _guard = self.insert_lock.lock();
        let mut row_ids = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != self.column_count() {
                return Err(GraniteError::operator(
                    OperatorErrorKind::ColumnNotFound,
                    format!(
                        "row width {} does not match table width {}",
                        row.len(),
                        self.column_count()
                    ),
                ));
            }
            let chunk_id = {
                let mut guard = chunks.write();
                if guard.last().map(|c| c.is_full()).unwrap_or(true) {
                    guard.push(Arc::new(Chunk::new(
                        self.column_count(),
                        self.target_chunk_size,
                    )));
                }
                guard.len() - 1
            };
            let chunk = self.chunk(chunk_id as u32);
            let offset = chunk.append_row(row, tid);
            row_ids.push(RowId {
                chunk: chunk_id as u32,
                offset: offset as u32,
            });
        }

        // Appends invalidate cached statistics.
        *self.statistics.write() = None;
        Ok(row_ids)
    }

    /// Build an index of the given kind over the listed columns, one
    /// structure per existing chunk.
    pub fn create_index(&self, kind: IndexKind, column_ids: Vec<usize>) -> Result<()> {
        for column in &column_ids {
            if *column >= self.column_count() {
                return Err(GraniteError::operator(
                    OperatorErrorKind::ColumnNotFound,
                    format!("no column {column} to index"),
                ));
            }
        }
        match kind {
            IndexKind::GroupKey if column_ids.len() != 1 => {
                return Err(GraniteError::new(
                    "group-key indexes cover exactly one column",
                ))
            }
            _ if column_ids.is_empty() => {
                return Err(GraniteError::new("index needs at least one column"))
            }
            _ => {}
        }

        // Full chunks are dictionary-encoded before indexing; the chunk
        // still accepting inserts is indexed over its raw values.
        super::encoder::ChunkEncoder::encode_all_chunks(self, super::encoder::EncodingKind::Dictionary);

        let chunk_indexes = self
            .chunks()
            .iter()
            .map(|chunk| match kind {
                IndexKind::GroupKey => ChunkIndex::GroupKey(GroupKeyIndex::build(chunk, column_ids[0])),
                IndexKind::CompositeGroupKey => {
                    ChunkIndex::CompositeGroupKey(CompositeGroupKeyIndex::build(chunk, &column_ids))
                }
            })
            .collect();

        self.indexes.write().push(Arc::new(TableIndex {
            kind,
            column_ids,
            chunk_indexes,
        }));
        Ok(())
    }

    pub fn indexes(&self) -> Vec<Arc<TableIndex>> {
        self.indexes.read().clone()
    }

    /// Statistics for the optimizer; computed from the data on first use and
    /// recomputed after appends. `set_statistics` overrides, which tests and
    /// mock setups use.
    pub fn statistics(self: &Arc<Self>) -> Arc<TableStatistics> {
        if let Some(statistics) = self.statistics.read().clone() {
            return statistics;
        }
        let computed = Arc::new(TableStatistics::from_table(self));
        *self.statistics.write() = Some(computed.clone());
        computed
    }

    pub fn set_statistics(&self, statistics: Arc<TableStatistics>) {
        *self.statistics.write() = Some(statistics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_table(chunk_size: usize) -> Arc<Table> {
        Arc::new(Table::new(
            vec![
                ColumnDefinition::new("a", DataType::Int32, false),
                ColumnDefinition::new("b", DataType::Utf8, true),
            ],
            chunk_size,
        ))
    }

    fn row(a: i32, b: &str) -> Vec<ScalarValue> {
        vec![ScalarValue::Int32(a), ScalarValue::Utf8(b.to_string())]
    }

    #[test]
    fn append_spills_into_new_chunks() {
        let table = test_table(2);
        table
            .append_rows(vec![row(1, "x"), row(2, "y"), row(3, "z")], 0)
            .unwrap();

        assert_eq!(3, table.row_count());
        assert_eq!(2, table.chunks().len());
        assert_eq!(ScalarValue::Int32(3), table.value(0, 2));
        assert_eq!(RowId { chunk: 1, offset: 0 }, table.row_id_at(2));
    }

    #[test]
    fn reference_tables_flatten() {
        let base = test_table(4);
        base.append_rows(vec![row(1, "x"), row(2, "y"), row(3, "z")], 0)
            .unwrap();

        let first = Arc::new(Table::new_references(
            base.clone(),
            vec![RowId { chunk: 0, offset: 2 }, RowId { chunk: 0, offset: 0 }],
        ));
        // Row 1 of `first` is base row (0, 0); a further selection keeps it.
        let second = Table::new_references(first.clone(), vec![first.row_id_at(1)]);

        assert!(!second.referenced_table().unwrap().is_references());
        assert_eq!(1, second.row_count());
        assert_eq!(ScalarValue::Int32(1), second.value(0, 0));
        assert_eq!(RowId { chunk: 0, offset: 0 }, second.row_id_at(0));
    }
}
