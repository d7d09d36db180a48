//! Translates parsed SQL statements into logical plans.
//!
//! The plan for a SELECT mirrors the evaluation order: FROM (cross joins and
//! explicit joins) → WHERE (one filter per top-level conjunct) → GROUP
//! BY/HAVING → SELECT list → DISTINCT → ORDER BY → LIMIT. Identifier
//! resolution goes through a stack of contexts; subqueries resolve outer
//! columns through a proxy that turns each access into a parameter binding.

use super::identifier_context::{IdentifierContext, IdentifierContextProxy};
use crate::expr::{
    self, AggregateExpr, AggregateFunction, ArithOperator, CaseExpr, ComparisonOperator,
    ConjunctionOperator, Expression, FunctionExpr, InExpr, IsExpr, IsOperator, LiteralExpr,
    NegateExpr, NegateOperator, ScalarFunction, SubqueryExpr, SubqueryPlan, SubqueryType, TableRef,
};
use crate::logical::{
    JoinType, LogicalCreateTable, LogicalDelete, LogicalDropTable, LogicalFilter, LogicalInsert,
    LogicalJoin, LogicalLimit, LogicalOrder, LogicalProject, LogicalScan, LogicalShowColumns,
    LogicalShowTables, LogicalUnion, LogicalUpdate, LogicalValidate, LogicalValues, NodeRef,
    SortDefinition, UnionMode,
};
use crate::storage::{ColumnDefinition, DataType, ScalarValue, StorageManager};
use granite_error::{GraniteError, Result, TranslationErrorKind};
use sqlparser::ast;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

/// A translated sub-tree plus the identifiers its output exposes.
pub struct TranslationState {
    pub node: NodeRef,
    pub context: IdentifierContext,
}

pub struct SqlTranslator {
    storage: Arc<StorageManager>,
    /// Insert Validate nodes beneath every table access, making plans MVCC
    /// aware.
    validate: bool,
    next_table_ref: Cell<u32>,
    parameter_counter: Rc<Cell<u32>>,
}

impl SqlTranslator {
    pub fn new(storage: Arc<StorageManager>, validate: bool) -> SqlTranslator {
        SqlTranslator {
            storage,
            validate,
            next_table_ref: Cell::new(0),
            parameter_counter: Rc::new(Cell::new(0)),
        }
    }

    fn fresh_table_ref(&self) -> TableRef {
        let next = self.next_table_ref.get();
        self.next_table_ref.set(next + 1);
        TableRef(next)
    }

    pub fn translate_statement(&self, statement: &ast::Statement) -> Result<NodeRef> {
        match statement {
            ast::Statement::Query(query) => Ok(self.translate_query(query, None)?.node),
            ast::Statement::Insert(insert) => self.translate_insert(insert),
            ast::Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => self.translate_update(table, assignments, selection.as_ref()),
            ast::Statement::Delete(delete) => self.translate_delete(delete),
            ast::Statement::CreateTable(create) => self.translate_create_table(create),
            ast::Statement::Drop {
                object_type,
                if_exists,
                names,
                ..
            } => self.translate_drop(object_type, *if_exists, names),
            ast::Statement::ShowTables { .. } => {
                Ok(LogicalShowTables::make(self.fresh_table_ref()))
            }
            ast::Statement::ShowColumns { table_name, .. } => {
                let name = object_name(table_name)?;
                let table = self.storage.get_table(&name)?;
                Ok(LogicalShowColumns::make(self.fresh_table_ref(), name, table))
            }
            other => Err(GraniteError::parse(format!(
                "unsupported statement: {other}"
            ))),
        }
    }

    fn translate_query(
        &self,
        query: &ast::Query,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        let order_by = query
            .order_by
            .as_ref()
            .map(|order| order.exprs.as_slice())
            .unwrap_or(&[]);

        let mut state = match &*query.body {
            ast::SetExpr::Select(select) => self.translate_select(select, order_by, proxy)?,
            ast::SetExpr::Query(inner) => {
                let state = self.translate_query(inner, proxy)?;
                self.order_by_after_the_fact(state, order_by, proxy)?
            }
            ast::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let state = self.translate_set_operation(op, set_quantifier, left, right, proxy)?;
                self.order_by_after_the_fact(state, order_by, proxy)?
            }
            ast::SetExpr::Values(values) => {
                let state = self.translate_values(values)?;
                self.order_by_after_the_fact(state, order_by, proxy)?
            }
            other => {
                return Err(GraniteError::parse(format!(
                    "unsupported query body: {other}"
                )))
            }
        };

        if let Some(limit) = &query.limit {
            let limit = parse_count(limit, "LIMIT")?;
            let offset = match &query.offset {
                Some(offset) => parse_count(&offset.value, "OFFSET")?,
                None => 0,
            };
            state.node = LogicalLimit::make(limit, offset, state.node);
        } else if let Some(offset) = &query.offset {
            let offset = parse_count(&offset.value, "OFFSET")?;
            state.node = LogicalLimit::make(usize::MAX, offset, state.node);
        }

        Ok(state)
    }

    /// Sort a sub-tree that was not built by `translate_select` (unions,
    /// VALUES): order expressions resolve against the output context only.
    fn order_by_after_the_fact(
        &self,
        state: TranslationState,
        order_by: &[ast::OrderByExpr],
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        if order_by.is_empty() {
            return Ok(state);
        }
        let mut definitions = Vec::with_capacity(order_by.len());
        for item in order_by {
            definitions.push(SortDefinition {
                expression: self.translate_expr(&item.expr, &state.context, proxy)?,
                descending: item.asc == Some(false),
            });
        }
        Ok(TranslationState {
            node: LogicalOrder::make(definitions, state.node),
            context: state.context,
        })
    }

    fn translate_set_operation(
        &self,
        op: &ast::SetOperator,
        quantifier: &ast::SetQuantifier,
        left: &ast::SetExpr,
        right: &ast::SetExpr,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        if *op != ast::SetOperator::Union {
            return Err(GraniteError::parse(format!("unsupported set operation {op}")));
        }
        let mode = match quantifier {
            ast::SetQuantifier::All => UnionMode::All,
            ast::SetQuantifier::None | ast::SetQuantifier::Distinct => UnionMode::Distinct,
            other => {
                return Err(GraniteError::parse(format!(
                    "unsupported set quantifier {other}"
                )))
            }
        };

        let left = self.translate_set_expr_branch(left, proxy)?;
        let right = self.translate_set_expr_branch(right, proxy)?;

        let left_width = left.node.column_expressions().len();
        let right_width = right.node.column_expressions().len();
        if left_width != right_width {
            return Err(GraniteError::translation(
                TranslationErrorKind::ColumnCountMismatch,
                format!("UNION inputs have {left_width} and {right_width} columns"),
            ));
        }

        Ok(TranslationState {
            node: LogicalUnion::make(mode, left.node, right.node),
            context: left.context,
        })
    }

    fn translate_set_expr_branch(
        &self,
        body: &ast::SetExpr,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        match body {
            ast::SetExpr::Select(select) => self.translate_select(select, &[], proxy),
            ast::SetExpr::Query(query) => self.translate_query(query, proxy),
            ast::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => self.translate_set_operation(op, set_quantifier, left, right, proxy),
            ast::SetExpr::Values(values) => self.translate_values(values),
            other => Err(GraniteError::parse(format!(
                "unsupported query body: {other}"
            ))),
        }
    }

    fn translate_values(&self, values: &ast::Values) -> Result<TranslationState> {
        let empty = IdentifierContext::new();
        let mut rows = Vec::with_capacity(values.rows.len());
        let mut width = None;
        for row in &values.rows {
            let translated = row
                .iter()
                .map(|expr| self.translate_expr(expr, &empty, None))
                .collect::<Result<Vec<_>>>()?;
            match width {
                None => width = Some(translated.len()),
                Some(expected) if expected != translated.len() => {
                    return Err(GraniteError::translation(
                        TranslationErrorKind::ColumnCountMismatch,
                        format!(
                            "VALUES rows have {} and {} columns",
                            expected,
                            translated.len()
                        ),
                    ))
                }
                Some(_) => {}
            }
            rows.push(translated);
        }

        let node = LogicalValues::make(self.fresh_table_ref(), rows);
        let mut context = IdentifierContext::new();
        for (idx, expression) in node.column_expressions().into_iter().enumerate() {
            context.add(format!("column{idx}"), None, expression);
        }
        Ok(TranslationState { node, context })
    }

    fn translate_select(
        &self,
        select: &ast::Select,
        order_by: &[ast::OrderByExpr],
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        // FROM
        let from = self.translate_from(&select.from, proxy)?;
        let context = from.context;
        let mut node = from.node;

        // WHERE: every top-level conjunct becomes its own filter node, which
        // is what the predicate-reordering rule works on.
        if let Some(selection) = &select.selection {
            let predicate = self.translate_expr(selection, &context, proxy)?;
            if predicate.contains_aggregate() {
                return Err(GraniteError::translation(
                    TranslationErrorKind::AggregateMisuse,
                    "aggregates are not allowed in WHERE",
                ));
            }
            let mut conjuncts = Vec::new();
            split_conjunction(predicate, &mut conjuncts);
            for conjunct in conjuncts {
                node = LogicalFilter::make(conjunct, node);
            }
        }

        // SELECT list
        let mut select_exprs: Vec<Expression> = Vec::new();
        let mut aliases: Vec<Option<String>> = Vec::new();
        for item in &select.projection {
            match item {
                ast::SelectItem::UnnamedExpr(expr) => {
                    select_exprs.push(self.translate_expr(expr, &context, proxy)?);
                    aliases.push(None);
                }
                ast::SelectItem::ExprWithAlias { expr, alias } => {
                    select_exprs.push(self.translate_expr(expr, &context, proxy)?);
                    aliases.push(Some(alias.value.clone()));
                }
                ast::SelectItem::Wildcard(_) => {
                    for (name, expression) in context.all_expressions() {
                        select_exprs.push(expression);
                        aliases.push(Some(name));
                    }
                }
                ast::SelectItem::QualifiedWildcard(name, _) => {
                    let table = object_name(name)?;
                    let columns = context.expressions_of_table(&table);
                    if columns.is_empty() {
                        return Err(GraniteError::translation(
                            TranslationErrorKind::UnknownIdentifier,
                            format!("unknown table {table}"),
                        ));
                    }
                    for (name, expression) in columns {
                        select_exprs.push(expression);
                        aliases.push(Some(name));
                    }
                }
            }
        }

        // ORDER BY expressions resolve against select aliases first, then the
        // underlying columns.
        let mut order_definitions: Vec<SortDefinition> = Vec::new();
        for item in order_by {
            let expression = match &item.expr {
                ast::Expr::Identifier(ident) => {
                    match aliases.iter().position(|a| a.as_deref() == Some(&ident.value)) {
                        Some(idx) => select_exprs[idx].clone(),
                        None => self.translate_expr(&item.expr, &context, proxy)?,
                    }
                }
                other => self.translate_expr(other, &context, proxy)?,
            };
            order_definitions.push(SortDefinition {
                expression,
                descending: item.asc == Some(false),
            });
        }

        // GROUP BY / aggregates
        let group_by = match &select.group_by {
            ast::GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(|expr| self.translate_expr(expr, &context, proxy))
                .collect::<Result<Vec<_>>>()?,
            ast::GroupByExpr::All(_) => {
                return Err(GraniteError::parse("GROUP BY ALL is not supported"))
            }
        };

        let having = match &select.having {
            Some(having) => Some(self.translate_expr(having, &context, proxy)?),
            None => None,
        };

        let mut aggregates: Vec<Expression> = Vec::new();
        for expression in select_exprs
            .iter()
            .chain(having.iter())
            .chain(order_definitions.iter().map(|d| &d.expression))
        {
            collect_aggregates(expression, &mut aggregates);
        }

        if !aggregates.is_empty() || !group_by.is_empty() {
            for expression in select_exprs
                .iter()
                .chain(having.iter())
                .chain(order_definitions.iter().map(|d| &d.expression))
            {
                check_aggregate_context(expression, &group_by)?;
            }
            node = crate::logical::LogicalAggregate::make(group_by, aggregates, node);
            if let Some(having) = having {
                node = LogicalFilter::make(having, node);
            }
        } else if select.having.is_some() {
            return Err(GraniteError::translation(
                TranslationErrorKind::AggregateMisuse,
                "HAVING without aggregation",
            ));
        }

        // SELECT list projection; extended with order-by expressions that are
        // not part of the output, then pruned back after the sort.
        let missing_order_exprs: Vec<Expression> = order_definitions
            .iter()
            .map(|d| d.expression.clone())
            .filter(|e| !select_exprs.contains(e))
            .collect();

        if missing_order_exprs.is_empty() {
            node = LogicalProject::make_with_aliases(select_exprs.clone(), aliases.clone(), node);
            if !order_definitions.is_empty() {
                node = LogicalOrder::make(order_definitions, node);
            }
        } else {
            let mut extended = select_exprs.clone();
            extended.extend(missing_order_exprs);
            let mut extended_aliases = aliases.clone();
            extended_aliases.resize(extended.len(), None);
            node = LogicalProject::make_with_aliases(extended, extended_aliases, node);
            node = LogicalOrder::make(order_definitions, node);
            node = LogicalProject::make_with_aliases(select_exprs.clone(), aliases.clone(), node);
        }

        // DISTINCT: group by the whole output row.
        match &select.distinct {
            Some(ast::Distinct::Distinct) => {
                node = crate::logical::LogicalAggregate::make(select_exprs.clone(), Vec::new(), node);
            }
            Some(ast::Distinct::On(_)) => {
                return Err(GraniteError::parse("DISTINCT ON is not supported"))
            }
            None => {}
        }

        // Output context for enclosing queries.
        let mut output = IdentifierContext::new();
        for (expression, alias) in select_exprs.iter().zip(&aliases) {
            let name = alias
                .clone()
                .unwrap_or_else(|| expression.as_column_name());
            output.add(name, None, expression.clone());
        }

        Ok(TranslationState {
            node,
            context: output,
        })
    }

    fn translate_from(
        &self,
        from: &[ast::TableWithJoins],
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        if from.is_empty() {
            // SELECT without FROM: a single dummy row to project from.
            let node = LogicalValues::make(
                self.fresh_table_ref(),
                vec![vec![expr::lit(0)]],
            );
            return Ok(TranslationState {
                node,
                context: IdentifierContext::new(),
            });
        }

        let mut state: Option<TranslationState> = None;
        for table_with_joins in from {
            let next = self.translate_table_with_joins(table_with_joins, proxy)?;
            state = Some(match state {
                None => next,
                Some(current) => {
                    let mut context = current.context;
                    context.extend(&next.context);
                    TranslationState {
                        node: LogicalJoin::make(JoinType::Cross, None, current.node, next.node),
                        context,
                    }
                }
            });
        }
        Ok(state.expect("nonempty FROM"))
    }

    fn translate_table_with_joins(
        &self,
        table_with_joins: &ast::TableWithJoins,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        let mut state = self.translate_table_factor(&table_with_joins.relation, proxy)?;

        for join in &table_with_joins.joins {
            let right = self.translate_table_factor(&join.relation, proxy)?;

            let (join_type, constraint) = match &join.join_operator {
                ast::JoinOperator::Inner(constraint) => (JoinType::Inner, Some(constraint)),
                ast::JoinOperator::LeftOuter(constraint) => (JoinType::Left, Some(constraint)),
                ast::JoinOperator::RightOuter(constraint) => (JoinType::Right, Some(constraint)),
                ast::JoinOperator::FullOuter(constraint) => (JoinType::Full, Some(constraint)),
                ast::JoinOperator::LeftSemi(constraint) => (JoinType::Semi, Some(constraint)),
                ast::JoinOperator::LeftAnti(constraint) => (JoinType::Anti, Some(constraint)),
                ast::JoinOperator::CrossJoin => (JoinType::Cross, None),
                other => {
                    return Err(GraniteError::parse(format!(
                        "unsupported join operator {other:?}"
                    )))
                }
            };

            let mut combined = state.context.clone();
            combined.extend(&right.context);

            let predicate = match constraint {
                Some(ast::JoinConstraint::On(expr)) => {
                    Some(self.translate_expr(expr, &combined, proxy)?)
                }
                Some(ast::JoinConstraint::None) | None => None,
                Some(other) => {
                    return Err(GraniteError::parse(format!(
                        "unsupported join constraint {other:?}"
                    )))
                }
            };

            if join_type != JoinType::Cross && predicate.is_none() {
                return Err(GraniteError::parse("join requires an ON constraint"));
            }

            // Semi and anti joins only expose the left side.
            let context = if join_type.emits_right_columns() {
                combined
            } else {
                state.context.clone()
            };
            state = TranslationState {
                node: LogicalJoin::make(join_type, predicate, state.node, right.node),
                context,
            };
        }

        Ok(state)
    }

    fn translate_table_factor(
        &self,
        factor: &ast::TableFactor,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<TranslationState> {
        match factor {
            ast::TableFactor::Table { name, alias, .. } => {
                let table_name = object_name(name)?;
                let table = self.storage.get_table(&table_name)?;
                let table_ref = self.fresh_table_ref();
                let node = LogicalScan::make(table_ref, table_name.clone(), table);

                let visible_name = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or(table_name);
                let mut context = IdentifierContext::new();
                for (idx, expression) in node.column_expressions().into_iter().enumerate() {
                    let column = match expression {
                        Expression::Column(ref column) => column.name.clone(),
                        _ => format!("column{idx}"),
                    };
                    context.add(column, Some(visible_name.clone()), expression);
                }
                if let Some(alias) = alias {
                    if !alias.columns.is_empty() {
                        let names: Vec<String> =
                            alias.columns.iter().map(|c| c.value.clone()).collect();
                        context = context.with_renamed_columns(&names)?;
                    }
                }

                Ok(TranslationState {
                    node: self.validate_if_active(node),
                    context,
                })
            }
            ast::TableFactor::Derived {
                subquery, alias, ..
            } => {
                let state = self.translate_query(subquery, proxy)?;
                let mut context = state.context;
                if let Some(alias) = alias {
                    context = context.with_table(&alias.name.value);
                    if !alias.columns.is_empty() {
                        let names: Vec<String> =
                            alias.columns.iter().map(|c| c.value.clone()).collect();
                        context = context.with_renamed_columns(&names)?;
                    }
                }
                Ok(TranslationState {
                    node: state.node,
                    context,
                })
            }
            ast::TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.translate_table_with_joins(table_with_joins, proxy),
            other => Err(GraniteError::parse(format!(
                "unsupported table factor {other}"
            ))),
        }
    }

    fn validate_if_active(&self, node: NodeRef) -> NodeRef {
        if self.validate {
            LogicalValidate::make(node)
        } else {
            node
        }
    }

    fn translate_insert(&self, insert: &ast::Insert) -> Result<NodeRef> {
        let table_name = object_name(&insert.table_name)?;
        let table = self.storage.get_table(&table_name)?;

        let columns: Vec<usize> = if insert.columns.is_empty() {
            (0..table.column_count()).collect()
        } else {
            insert
                .columns
                .iter()
                .map(|ident| {
                    table.column_index_of(&ident.value).ok_or_else(|| {
                        GraniteError::translation(
                            TranslationErrorKind::UnknownIdentifier,
                            format!("no column {} in table {table_name}", ident.value),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let source = insert
            .source
            .as_ref()
            .ok_or_else(|| GraniteError::parse("INSERT without a source"))?;
        let state = self.translate_query(source, None)?;

        let width = state.node.column_expressions().len();
        if width != columns.len() {
            return Err(GraniteError::translation(
                TranslationErrorKind::ColumnCountMismatch,
                format!("{width} values for {} target columns", columns.len()),
            ));
        }

        Ok(LogicalInsert::make(table_name, table, columns, state.node))
    }

    fn translate_update(
        &self,
        table: &ast::TableWithJoins,
        assignments: &[ast::Assignment],
        selection: Option<&ast::Expr>,
    ) -> Result<NodeRef> {
        if !table.joins.is_empty() {
            return Err(GraniteError::parse("UPDATE with joins is not supported"));
        }
        let state = self.translate_table_factor(&table.relation, None)?;
        let (table_name, stored) = match state.node.kind() {
            crate::logical::LogicalNodeKind::Validate(_) => match state
                .node
                .left_input()
                .expect("validate has input")
                .kind()
            {
                crate::logical::LogicalNodeKind::Scan(scan) => {
                    (scan.table_name.clone(), scan.table.clone())
                }
                _ => return Err(GraniteError::parse("UPDATE target must be a table")),
            },
            crate::logical::LogicalNodeKind::Scan(scan) => {
                (scan.table_name.clone(), scan.table.clone())
            }
            _ => return Err(GraniteError::parse("UPDATE target must be a table")),
        };

        let mut node = state.node;
        if let Some(selection) = selection {
            let predicate = self.translate_expr(selection, &state.context, None)?;
            let mut conjuncts = Vec::new();
            split_conjunction(predicate, &mut conjuncts);
            for conjunct in conjuncts {
                node = LogicalFilter::make(conjunct, node);
            }
        }

        let mut translated = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let column_name = match &assignment.target {
                ast::AssignmentTarget::ColumnName(name) => {
                    name.0.last().expect("nonempty name").value.clone()
                }
                other => {
                    return Err(GraniteError::parse(format!(
                        "unsupported assignment target {other}"
                    )))
                }
            };
            let column = stored.column_index_of(&column_name).ok_or_else(|| {
                GraniteError::translation(
                    TranslationErrorKind::UnknownIdentifier,
                    format!("no column {column_name} in table {table_name}"),
                )
            })?;
            let value = self.translate_expr(&assignment.value, &state.context, None)?;
            // The assignment must fit the column's type.
            DataType::common_type(
                stored.column_definitions()[column].data_type,
                value.data_type(),
            )?;
            translated.push((column, value));
        }

        Ok(LogicalUpdate::make(table_name, stored, translated, node))
    }

    fn translate_delete(&self, delete: &ast::Delete) -> Result<NodeRef> {
        let tables = match &delete.from {
            ast::FromTable::WithFromKeyword(tables) | ast::FromTable::WithoutKeyword(tables) => {
                tables
            }
        };
        let [table] = tables.as_slice() else {
            return Err(GraniteError::parse("DELETE works on a single table"));
        };
        if !table.joins.is_empty() {
            return Err(GraniteError::parse("DELETE with joins is not supported"));
        }

        let state = self.translate_table_factor(&table.relation, None)?;
        let (table_name, stored) = {
            let scan_node = match state.node.kind() {
                crate::logical::LogicalNodeKind::Validate(_) => {
                    state.node.left_input().expect("validate has input")
                }
                _ => state.node.clone(),
            };
            match scan_node.kind() {
                crate::logical::LogicalNodeKind::Scan(scan) => {
                    (scan.table_name.clone(), scan.table.clone())
                }
                _ => return Err(GraniteError::parse("DELETE target must be a table")),
            }
        };

        let mut node = state.node;
        if let Some(selection) = &delete.selection {
            let predicate = self.translate_expr(selection, &state.context, None)?;
            let mut conjuncts = Vec::new();
            split_conjunction(predicate, &mut conjuncts);
            for conjunct in conjuncts {
                node = LogicalFilter::make(conjunct, node);
            }
        }

        Ok(LogicalDelete::make(table_name, stored, node))
    }

    fn translate_create_table(&self, create: &ast::CreateTable) -> Result<NodeRef> {
        let table_name = object_name(&create.name)?;
        let columns = create
            .columns
            .iter()
            .map(|column| {
                let data_type = translate_data_type(&column.data_type)?;
                let not_null = column
                    .options
                    .iter()
                    .any(|option| matches!(option.option, ast::ColumnOption::NotNull));
                Ok(ColumnDefinition::new(
                    column.name.value.clone(),
                    data_type,
                    !not_null,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LogicalCreateTable::make(
            table_name,
            columns,
            create.if_not_exists,
        ))
    }

    fn translate_drop(
        &self,
        object_type: &ast::ObjectType,
        if_exists: bool,
        names: &[ast::ObjectName],
    ) -> Result<NodeRef> {
        if *object_type != ast::ObjectType::Table {
            return Err(GraniteError::parse("only DROP TABLE is supported"));
        }
        let [name] = names else {
            return Err(GraniteError::parse("DROP works on a single table"));
        };
        Ok(LogicalDropTable::make(object_name(name)?, if_exists))
    }

    fn translate_expr(
        &self,
        expr: &ast::Expr,
        context: &IdentifierContext,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<Expression> {
        match expr {
            ast::Expr::Identifier(ident) => self.resolve(&ident.value, None, context, proxy),
            ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [table, column] => {
                    self.resolve(&column.value, Some(&table.value), context, proxy)
                }
                _ => Err(GraniteError::translation(
                    TranslationErrorKind::UnknownIdentifier,
                    format!("unsupported compound identifier {expr}"),
                )),
            },
            ast::Expr::Value(value) => Ok(Expression::Literal(LiteralExpr {
                literal: translate_value(value)?,
            })),
            ast::Expr::Nested(inner) => self.translate_expr(inner, context, proxy),
            ast::Expr::BinaryOp { left, op, right } => {
                let left = self.translate_expr(left, context, proxy)?;
                let right = self.translate_expr(right, context, proxy)?;
                self.translate_binary_op(op, left, right)
            }
            ast::Expr::UnaryOp { op, expr } => {
                let inner = self.translate_expr(expr, context, proxy)?;
                match op {
                    ast::UnaryOperator::Not => Ok(expr::not(inner)),
                    ast::UnaryOperator::Minus => match inner {
                        // Fold the sign into numeric literals.
                        Expression::Literal(LiteralExpr { literal }) if !literal.is_null() => {
                            Ok(Expression::Literal(LiteralExpr {
                                literal: literal.negate()?,
                            }))
                        }
                        inner => Ok(Expression::Negate(NegateExpr {
                            op: NegateOperator::Negative,
                            expr: Box::new(inner),
                        })),
                    },
                    ast::UnaryOperator::Plus => Ok(inner),
                    other => Err(GraniteError::parse(format!(
                        "unsupported unary operator {other}"
                    ))),
                }
            }
            ast::Expr::IsNull(inner) => Ok(Expression::Is(IsExpr {
                op: IsOperator::IsNull,
                expr: Box::new(self.translate_expr(inner, context, proxy)?),
            })),
            ast::Expr::IsNotNull(inner) => Ok(Expression::Is(IsExpr {
                op: IsOperator::IsNotNull,
                expr: Box::new(self.translate_expr(inner, context, proxy)?),
            })),
            ast::Expr::InList {
                expr,
                list,
                negated,
            } => Ok(Expression::In(InExpr {
                expr: Box::new(self.translate_expr(expr, context, proxy)?),
                list: list
                    .iter()
                    .map(|item| self.translate_expr(item, context, proxy))
                    .collect::<Result<Vec<_>>>()?,
                negated: *negated,
            })),
            ast::Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let compare = self.translate_expr(expr, context, proxy)?;
                self.translate_subquery(
                    subquery,
                    context,
                    proxy,
                    SubqueryType::Any {
                        op: ComparisonOperator::Eq,
                        negated: *negated,
                    },
                    Some(compare),
                )
            }
            ast::Expr::Exists { subquery, negated } => self.translate_subquery(
                subquery,
                context,
                proxy,
                SubqueryType::Exists { negated: *negated },
                None,
            ),
            ast::Expr::Subquery(subquery) => {
                self.translate_subquery(subquery, context, proxy, SubqueryType::Scalar, None)
            }
            ast::Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => self.translate_case(operand.as_deref(), conditions, results, else_result.as_deref(), context, proxy),
            ast::Expr::Function(function) => self.translate_function(function, context, proxy),
            other => Err(GraniteError::parse(format!(
                "unsupported expression {other}"
            ))),
        }
    }

    fn resolve(
        &self,
        column: &str,
        table: Option<&str>,
        context: &IdentifierContext,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<Expression> {
        match context.resolve(column, table) {
            Ok(expression) => Ok(expression),
            Err(err)
                if err.kind()
                    == granite_error::ErrorKind::Translation(
                        TranslationErrorKind::UnknownIdentifier,
                    ) =>
            {
                match proxy.and_then(|proxy| proxy.resolve(column, table)) {
                    Some(placeholder) => Ok(placeholder),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn translate_binary_op(
        &self,
        op: &ast::BinaryOperator,
        left: Expression,
        right: Expression,
    ) -> Result<Expression> {
        use ast::BinaryOperator as B;
        let comparison = |op: ComparisonOperator, left: Expression, right: Expression| {
            // A predicate over incompatible types is a translation error.
            DataType::common_type(left.data_type(), right.data_type())?;
            Ok(expr::comparison(op, left, right))
        };
        match op {
            B::And => Ok(expr::and(left, right)),
            B::Or => Ok(expr::or(left, right)),
            B::Eq => comparison(ComparisonOperator::Eq, left, right),
            B::NotEq => comparison(ComparisonOperator::NotEq, left, right),
            B::Lt => comparison(ComparisonOperator::Lt, left, right),
            B::LtEq => comparison(ComparisonOperator::LtEq, left, right),
            B::Gt => comparison(ComparisonOperator::Gt, left, right),
            B::GtEq => comparison(ComparisonOperator::GtEq, left, right),
            B::Plus => self.arith(ArithOperator::Add, left, right),
            B::Minus => self.arith(ArithOperator::Sub, left, right),
            B::Multiply => self.arith(ArithOperator::Mul, left, right),
            B::Divide => self.arith(ArithOperator::Div, left, right),
            B::Modulo => self.arith(ArithOperator::Mod, left, right),
            other => Err(GraniteError::parse(format!(
                "unsupported binary operator {other}"
            ))),
        }
    }

    fn arith(&self, op: ArithOperator, left: Expression, right: Expression) -> Result<Expression> {
        let common = DataType::common_type(left.data_type(), right.data_type())?;
        if common == DataType::Utf8 {
            return Err(GraniteError::translation(
                TranslationErrorKind::TypeMismatch,
                format!("cannot apply {op} to strings"),
            ));
        }
        Ok(expr::arith(op, left, right))
    }

    fn translate_case(
        &self,
        operand: Option<&ast::Expr>,
        conditions: &[ast::Expr],
        results: &[ast::Expr],
        else_result: Option<&ast::Expr>,
        context: &IdentifierContext,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<Expression> {
        let operand = match operand {
            Some(operand) => Some(self.translate_expr(operand, context, proxy)?),
            None => None,
        };
        let mut out = match else_result {
            Some(expr) => self.translate_expr(expr, context, proxy)?,
            None => expr::null_lit(),
        };

        // Build right to left so the first WHEN ends up outermost.
        for (condition, result) in conditions.iter().zip(results).rev() {
            let mut when = self.translate_expr(condition, context, proxy)?;
            if let Some(operand) = &operand {
                DataType::common_type(operand.data_type(), when.data_type())?;
                when = expr::eq(operand.clone(), when);
            }
            out = Expression::Case(CaseExpr {
                when: Box::new(when),
                then: Box::new(self.translate_expr(result, context, proxy)?),
                else_expr: Box::new(out),
            });
        }
        Ok(out)
    }

    fn translate_function(
        &self,
        function: &ast::Function,
        context: &IdentifierContext,
        proxy: Option<&IdentifierContextProxy>,
    ) -> Result<Expression> {
        let name = function
            .name
            .0
            .last()
            .expect("nonempty function name")
            .value
            .to_uppercase();

        let args = match &function.args {
            ast::FunctionArguments::List(list) => list.args.as_slice(),
            ast::FunctionArguments::None => &[],
            ast::FunctionArguments::Subquery(_) => {
                return Err(GraniteError::parse(format!(
                    "unsupported subquery argument for {name}"
                )))
            }
        };

        if let Some(aggregate) = AggregateFunction::from_name(&name) {
            return match args {
                [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard)] => {
                    if aggregate != AggregateFunction::Count {
                        return Err(GraniteError::translation(
                            TranslationErrorKind::AggregateMisuse,
                            format!("{name}(*) is not defined"),
                        ));
                    }
                    Ok(expr::count_star())
                }
                [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(arg))] => {
                    let input = self.translate_expr(arg, context, proxy)?;
                    if input.contains_aggregate() {
                        return Err(GraniteError::translation(
                            TranslationErrorKind::AggregateMisuse,
                            "aggregates cannot be nested",
                        ));
                    }
                    if aggregate != AggregateFunction::Count
                        && aggregate != AggregateFunction::Min
                        && aggregate != AggregateFunction::Max
                        && !input.data_type().is_numeric()
                        && input.data_type() != DataType::Null
                    {
                        return Err(GraniteError::translation(
                            TranslationErrorKind::TypeMismatch,
                            format!("{name} requires a numeric input"),
                        ));
                    }
                    Ok(Expression::Aggregate(AggregateExpr {
                        function: aggregate,
                        input: Some(Box::new(input)),
                    }))
                }
                _ => Err(GraniteError::translation(
                    TranslationErrorKind::AggregateMisuse,
                    format!("{name} takes exactly one argument"),
                )),
            };
        }

        if let Some(scalar) = ScalarFunction::from_name(&name) {
            return match args {
                [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(arg))] => {
                    Ok(Expression::Function(FunctionExpr {
                        function: scalar,
                        input: Box::new(self.translate_expr(arg, context, proxy)?),
                    }))
                }
                _ => Err(GraniteError::parse(format!(
                    "{name} takes exactly one argument"
                ))),
            };
        }

        Err(GraniteError::parse(format!("unknown function {name}")))
    }

    fn translate_subquery(
        &self,
        query: &ast::Query,
        context: &IdentifierContext,
        proxy: Option<&IdentifierContextProxy>,
        subquery_type: SubqueryType,
        compare_expr: Option<Expression>,
    ) -> Result<Expression> {
        let inner_proxy =
            IdentifierContextProxy::new(context, self.parameter_counter.clone(), proxy);
        let state = self.translate_query(query, Some(&inner_proxy))?;

        let output = state.node.column_expressions();
        let return_type = match subquery_type {
            SubqueryType::Scalar | SubqueryType::Any { .. } => {
                if output.len() != 1 {
                    return Err(GraniteError::translation(
                        TranslationErrorKind::TypeMismatch,
                        format!("subquery must return one column, got {}", output.len()),
                    ));
                }
                output[0].data_type()
            }
            SubqueryType::Exists { .. } => DataType::Int32,
        };

        if let (SubqueryType::Any { .. }, Some(compare)) = (&subquery_type, &compare_expr) {
            DataType::common_type(compare.data_type(), return_type)?;
        }

        let (arguments, parameter_ids): (Vec<Expression>, Vec<_>) =
            inner_proxy.accessed().into_iter().unzip();

        Ok(Expression::Subquery(SubqueryExpr {
            subquery_type,
            plan: SubqueryPlan::Logical(state.node),
            return_type,
            compare_expr: compare_expr.map(Box::new),
            parameter_ids,
            arguments,
        }))
    }
}

/// Break a tree of top-level ANDs into its conjuncts, left to right.
fn split_conjunction(expression: Expression, out: &mut Vec<Expression>) {
    match expression {
        Expression::Conjunction(conjunction) if conjunction.op == ConjunctionOperator::And => {
            split_conjunction(*conjunction.left, out);
            split_conjunction(*conjunction.right, out);
        }
        other => out.push(other),
    }
}

fn collect_aggregates(expression: &Expression, out: &mut Vec<Expression>) {
    if matches!(expression, Expression::Aggregate(_)) {
        if !out.contains(expression) {
            out.push(expression.clone());
        }
        return;
    }
    for child in expression.arguments() {
        collect_aggregates(child, out);
    }
}

/// Under aggregation, an output expression must be built from group-by
/// expressions, aggregates and constants.
fn check_aggregate_context(expression: &Expression, group_by: &[Expression]) -> Result<()> {
    if group_by.contains(expression) || matches!(expression, Expression::Aggregate(_)) {
        return Ok(());
    }
    match expression {
        Expression::Column(column) => Err(GraniteError::translation(
            TranslationErrorKind::AggregateMisuse,
            format!("column {column} must appear in GROUP BY or inside an aggregate"),
        )),
        Expression::Literal(_) | Expression::Placeholder(_) | Expression::Subquery(_) => Ok(()),
        other => {
            for child in other.arguments() {
                check_aggregate_context(child, group_by)?;
            }
            Ok(())
        }
    }
}

fn object_name(name: &ast::ObjectName) -> Result<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(GraniteError::parse(format!(
            "qualified names are not supported: {name}"
        ))),
    }
}

fn translate_value(value: &ast::Value) -> Result<ScalarValue> {
    match value {
        ast::Value::Number(text, _) => parse_number(text),
        ast::Value::SingleQuotedString(text) | ast::Value::DoubleQuotedString(text) => {
            Ok(ScalarValue::Utf8(text.clone()))
        }
        ast::Value::Boolean(b) => Ok(ScalarValue::Int32(*b as i32)),
        ast::Value::Null => Ok(ScalarValue::Null),
        other => Err(GraniteError::parse(format!("unsupported literal {other}"))),
    }
}

fn parse_number(text: &str) -> Result<ScalarValue> {
    if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .map(ScalarValue::Float64)
            .map_err(|_| GraniteError::parse(format!("bad numeric literal {text}")))
    } else {
        let wide = text
            .parse::<i64>()
            .map_err(|_| GraniteError::parse(format!("bad numeric literal {text}")))?;
        Ok(match i32::try_from(wide) {
            Ok(narrow) => ScalarValue::Int32(narrow),
            Err(_) => ScalarValue::Int64(wide),
        })
    }
}

fn parse_count(expr: &ast::Expr, what: &str) -> Result<usize> {
    match expr {
        ast::Expr::Value(ast::Value::Number(text, _)) => text
            .parse::<usize>()
            .map_err(|_| GraniteError::parse(format!("bad {what} value {text}"))),
        other => Err(GraniteError::parse(format!(
            "{what} must be a number, got {other}"
        ))),
    }
}

fn translate_data_type(data_type: &ast::DataType) -> Result<DataType> {
    use ast::DataType as S;
    Ok(match data_type {
        S::Int(_) | S::Integer(_) | S::SmallInt(_) => DataType::Int32,
        S::BigInt(_) => DataType::Int64,
        S::Real | S::Float(_) => DataType::Float32,
        S::Double | S::DoublePrecision => DataType::Float64,
        S::Text | S::Varchar(_) | S::Char(_) => DataType::Utf8,
        other => {
            return Err(GraniteError::parse(format!(
                "unsupported column type {other}"
            )))
        }
    })
}
