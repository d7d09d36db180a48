//! One-line descriptions of plan nodes and operators.

use std::fmt;

/// A name plus key/value pairs, rendered as `Name(k = v, ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainEntry {
    pub name: &'static str,
    pub values: Vec<(&'static str, String)>,
}

impl ExplainEntry {
    pub fn new(name: &'static str) -> ExplainEntry {
        ExplainEntry {
            name,
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: &'static str, value: impl fmt::Display) -> ExplainEntry {
        self.values.push((key, value.to_string()));
        self
    }
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.values.is_empty() {
            write!(f, "(")?;
            for (idx, (key, value)) in self.values.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key} = {value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

pub trait Explainable {
    fn explain_entry(&self) -> ExplainEntry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_display() {
        let entry = ExplainEntry::new("Filter")
            .with_value("predicate", "a > 4")
            .with_value("scan", "TableScan");
        assert_eq!("Filter(predicate = a > 4, scan = TableScan)", entry.to_string());
    }
}
