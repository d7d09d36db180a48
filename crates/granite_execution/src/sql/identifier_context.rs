use crate::expr::{Expression, ParameterId, PlaceholderExpr};
use granite_error::{ErrorKind, GraniteError, Result, TranslationErrorKind};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Maps the identifiers of one query scope to expressions.
#[derive(Debug, Clone, Default)]
pub struct IdentifierContext {
    entries: Vec<ContextEntry>,
}

#[derive(Debug, Clone)]
struct ContextEntry {
    column: String,
    table: Option<String>,
    expression: Expression,
}

impl IdentifierContext {
    pub fn new() -> IdentifierContext {
        IdentifierContext::default()
    }

    pub fn add(&mut self, column: impl Into<String>, table: Option<String>, expression: Expression) {
        self.entries.push(ContextEntry {
            column: column.into(),
            table,
            expression,
        });
    }

    pub fn extend(&mut self, other: &IdentifierContext) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Rename every entry's table qualifier, as `FROM (...) AS alias` does.
    pub fn with_table(&self, table: &str) -> IdentifierContext {
        IdentifierContext {
            entries: self
                .entries
                .iter()
                .map(|entry| ContextEntry {
                    table: Some(table.to_string()),
                    ..entry.clone()
                })
                .collect(),
        }
    }

    /// Replace the column names in order, for `AS alias(c1, c2, ...)`.
    pub fn with_renamed_columns(&self, names: &[String]) -> Result<IdentifierContext> {
        if names.len() != self.entries.len() {
            return Err(GraniteError::translation(
                TranslationErrorKind::ColumnCountMismatch,
                format!(
                    "{} column names given for {} columns",
                    names.len(),
                    self.entries.len()
                ),
            ));
        }
        Ok(IdentifierContext {
            entries: self
                .entries
                .iter()
                .zip(names)
                .map(|(entry, name)| ContextEntry {
                    column: name.clone(),
                    ..entry.clone()
                })
                .collect(),
        })
    }

    /// Every column expression in declaration order, for `SELECT *`.
    pub fn all_expressions(&self) -> Vec<(String, Expression)> {
        self.entries
            .iter()
            .map(|entry| (entry.column.clone(), entry.expression.clone()))
            .collect()
    }

    /// The columns of one table qualifier, for `SELECT t.*`.
    pub fn expressions_of_table(&self, table: &str) -> Vec<(String, Expression)> {
        self.entries
            .iter()
            .filter(|entry| entry.table.as_deref() == Some(table))
            .map(|entry| (entry.column.clone(), entry.expression.clone()))
            .collect()
    }

    pub fn resolve(&self, column: &str, table: Option<&str>) -> Result<Expression> {
        let mut found: Option<&Expression> = None;
        for entry in &self.entries {
            if entry.column != column {
                continue;
            }
            if let Some(table) = table {
                if entry.table.as_deref() != Some(table) {
                    continue;
                }
            }
            match found {
                // The same expression may be visible under several names.
                Some(existing) if existing == &entry.expression => {}
                Some(_) => {
                    return Err(GraniteError::translation(
                        TranslationErrorKind::AmbiguousIdentifier,
                        format!("identifier {column} is ambiguous"),
                    ))
                }
                None => found = Some(&entry.expression),
            }
        }
        found.cloned().ok_or_else(|| {
            let name = match table {
                Some(table) => format!("{table}.{column}"),
                None => column.to_string(),
            };
            GraniteError::translation(
                TranslationErrorKind::UnknownIdentifier,
                format!("unknown identifier {name}"),
            )
        })
    }
}

/// Lets a subquery refer to columns of its enclosing query. Each distinct
/// outer expression accessed through the proxy is assigned a fresh parameter
/// id from a counter shared across the whole statement; the subquery sees a
/// placeholder instead of the column.
pub struct IdentifierContextProxy<'a> {
    wrapped: &'a IdentifierContext,
    outer: Option<&'a IdentifierContextProxy<'a>>,
    counter: Rc<Cell<u32>>,
    accessed: RefCell<Vec<(Expression, ParameterId)>>,
}

impl<'a> IdentifierContextProxy<'a> {
    pub fn new(
        wrapped: &'a IdentifierContext,
        counter: Rc<Cell<u32>>,
        outer: Option<&'a IdentifierContextProxy<'a>>,
    ) -> IdentifierContextProxy<'a> {
        IdentifierContextProxy {
            wrapped,
            outer,
            counter,
            accessed: RefCell::new(Vec::new()),
        }
    }

    /// Resolve against the wrapped (outer) scope, falling through to the next
    /// proxy for even-further-out scopes. Returns a placeholder bound to the
    /// resolved expression, reusing the parameter id on repeated access.
    pub fn resolve(&self, column: &str, table: Option<&str>) -> Option<Expression> {
        let expression = match self.wrapped.resolve(column, table) {
            Ok(expression) => expression,
            Err(err)
                if err.kind()
                    == ErrorKind::Translation(TranslationErrorKind::UnknownIdentifier) =>
            {
                // Two scopes out: the outer proxy hands the middle scope a
                // placeholder, and we bind our own parameter to that.
                self.outer?.resolve(column, table)?
            }
            Err(_) => return None,
        };
        Some(self.placeholder_for(expression))
    }

    fn placeholder_for(&self, expression: Expression) -> Expression {
        let mut accessed = self.accessed.borrow_mut();
        let id = match accessed.iter().find(|(seen, _)| seen == &expression) {
            Some((_, id)) => *id,
            None => {
                let id = ParameterId(self.counter.get());
                self.counter.set(self.counter.get() + 1);
                accessed.push((expression.clone(), id));
                id
            }
        };
        Expression::Placeholder(PlaceholderExpr {
            id,
            datatype: expression.data_type(),
        })
    }

    /// The outer expressions accessed through this proxy, with their
    /// parameter ids, in first-access order.
    pub fn accessed(&self) -> Vec<(Expression, ParameterId)> {
        self.accessed.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col_ref, TableRef};
    use crate::storage::DataType;

    fn context() -> IdentifierContext {
        let mut ctx = IdentifierContext::new();
        ctx.add("a", Some("t".to_string()), col_ref(TableRef(0), 0, "a", DataType::Int32));
        ctx.add("b", Some("t".to_string()), col_ref(TableRef(0), 1, "b", DataType::Int32));
        ctx.add("a", Some("u".to_string()), col_ref(TableRef(1), 0, "a", DataType::Int32));
        ctx
    }

    #[test]
    fn unqualified_ambiguity() {
        let ctx = context();
        let err = ctx.resolve("a", None).unwrap_err();
        assert_eq!(
            ErrorKind::Translation(TranslationErrorKind::AmbiguousIdentifier),
            err.kind()
        );
        assert!(ctx.resolve("a", Some("u")).is_ok());
        assert!(ctx.resolve("b", None).is_ok());

        let err = ctx.resolve("missing", None).unwrap_err();
        assert_eq!(
            ErrorKind::Translation(TranslationErrorKind::UnknownIdentifier),
            err.kind()
        );
    }

    #[test]
    fn proxy_assigns_monotonic_parameter_ids() {
        let ctx = context();
        let counter = Rc::new(Cell::new(0));
        let proxy = IdentifierContextProxy::new(&ctx, counter.clone(), None);

        let first = proxy.resolve("b", None).unwrap();
        let again = proxy.resolve("b", None).unwrap();
        let second = proxy.resolve("a", Some("t")).unwrap();

        // Repeated access reuses the id, distinct expressions get fresh ones.
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(2, proxy.accessed().len());
        assert_eq!(2, counter.get());
    }
}
