use crate::storage::DataType;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one base relation in a plan. Handed out by the SQL translator;
/// two scans of the same stored table get distinct refs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef(pub u32);

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A column of some relation in the plan, addressed as (relation, position).
///
/// Equality and hashing only consider the address; the name, type and
/// nullability ride along as metadata so expressions stay self-describing.
#[derive(Debug, Clone)]
pub struct ColumnExpr {
    pub table_ref: TableRef,
    pub column: usize,
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl ColumnExpr {
    pub fn new(
        table_ref: TableRef,
        column: usize,
        name: impl Into<String>,
        datatype: DataType,
        nullable: bool,
    ) -> ColumnExpr {
        ColumnExpr {
            table_ref,
            column,
            name: name.into(),
            datatype,
            nullable,
        }
    }
}

impl PartialEq for ColumnExpr {
    fn eq(&self, other: &Self) -> bool {
        self.table_ref == other.table_ref && self.column == other.column
    }
}

impl Eq for ColumnExpr {}

impl Hash for ColumnExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table_ref.hash(state);
        self.column.hash(state);
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
