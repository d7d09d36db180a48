//! Turns an optimized logical plan into a physical operator DAG.

use super::operators::{
    AggregateOperator, CreateTableOperator, DeleteOperator, DropTableOperator, GetTable, HashJoin,
    IndexScan, InsertOperator, LimitOperator, NestedLoopJoin, OperatorKind, OperatorRef,
    PhysicalOperator, ProjectionOperator, ShowColumnsOperator, ShowTablesOperator, SortOperator,
    TableScan, UnionOperator, UpdateOperator, ValidateOperator, ValuesOperator,
};
use crate::expr::{
    split_column_comparison, ComparisonOperator, Expression, SubqueryPlan, TableRef,
};
use crate::logical::{JoinType, LogicalNode, LogicalNodeKind, NodeRef, ScanType};
use crate::storage::StorageManager;
use granite_error::{GraniteError, OptionExt, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Memoizes by node identity so that a logical DAG translates into an
/// operator DAG: a node with several outputs becomes one shared operator.
pub struct LqpTranslator {
    storage: Arc<StorageManager>,
    target_chunk_size: usize,
    memo: HashMap<*const LogicalNode, OperatorRef>,
}

impl LqpTranslator {
    pub fn new(storage: Arc<StorageManager>, target_chunk_size: usize) -> LqpTranslator {
        LqpTranslator {
            storage,
            target_chunk_size,
            memo: HashMap::new(),
        }
    }

    pub fn translate(&mut self, node: &NodeRef) -> Result<OperatorRef> {
        if let Some(op) = self.memo.get(&Arc::as_ptr(node)) {
            return Ok(op.clone());
        }

        let op = self.translate_node(node)?;
        self.memo.insert(Arc::as_ptr(node), op.clone());
        Ok(op)
    }

    fn translate_input(&mut self, node: &NodeRef) -> Result<(NodeRef, OperatorRef)> {
        let input = node
            .left_input()
            .required("node is missing its left input")?;
        let op = self.translate(&input)?;
        Ok((input, op))
    }

    fn translate_node(&mut self, node: &NodeRef) -> Result<OperatorRef> {
        match node.kind() {
            LogicalNodeKind::Root(_) => {
                let input = node.left_input().required("plan root has no input")?;
                self.translate(&input)
            }
            LogicalNodeKind::Scan(scan) => Ok(PhysicalOperator::make(
                OperatorKind::GetTable(GetTable {
                    table_name: scan.table_name.clone(),
                    table: scan.table.clone(),
                }),
                None,
                None,
            )),
            LogicalNodeKind::Validate(_) => {
                let (_, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Validate(ValidateOperator),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Filter(filter) => {
                let (input, input_op) = self.translate_input(node)?;
                if filter.scan_type() == ScanType::IndexScan {
                    let (column, op, value) =
                        split_column_comparison(&filter.predicate).ok_or_else(|| {
                            GraniteError::optimizer(
                                "index scan chosen for a predicate that is not column-vs-literal",
                            )
                        })?;
                    Ok(PhysicalOperator::make(
                        OperatorKind::IndexScan(IndexScan {
                            column: column.column,
                            op,
                            value,
                        }),
                        Some(input_op),
                        None,
                    ))
                } else {
                    Ok(PhysicalOperator::make(
                        OperatorKind::TableScan(TableScan {
                            predicate: self.physicalize(&filter.predicate)?,
                            input_columns: input.column_expressions(),
                        }),
                        Some(input_op),
                        None,
                    ))
                }
            }
            LogicalNodeKind::Project(project) => {
                let (input, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Projection(ProjectionOperator {
                        expressions: self.physicalize_all(&project.expressions)?,
                        aliases: project.aliases.clone(),
                        input_columns: input.column_expressions(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Aggregate(aggregate) => {
                let (input, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Aggregate(AggregateOperator {
                        group_by: self.physicalize_all(&aggregate.group_by)?,
                        aggregates: self.physicalize_all(&aggregate.aggregates)?,
                        input_columns: input.column_expressions(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Order(order) => {
                let (input, input_op) = self.translate_input(node)?;
                let mut order_by = order.order_by.clone();
                for definition in &mut order_by {
                    definition.expression = self.physicalize(&definition.expression)?;
                }
                Ok(PhysicalOperator::make(
                    OperatorKind::Sort(SortOperator {
                        order_by,
                        input_columns: input.column_expressions(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Limit(limit) => {
                let (_, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Limit(LimitOperator {
                        limit: limit.limit,
                        offset: limit.offset,
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Union(union) => {
                let left = node.left_input().required("union has no left input")?;
                let right = node.right_input().required("union has no right input")?;
                let left_op = self.translate(&left)?;
                let right_op = self.translate(&right)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Union(UnionOperator { mode: union.mode }),
                    Some(left_op),
                    Some(right_op),
                ))
            }
            LogicalNodeKind::Join(join) => {
                let left = node.left_input().required("join has no left input")?;
                let right = node.right_input().required("join has no right input")?;
                let left_op = self.translate(&left)?;
                let right_op = self.translate(&right)?;
                let left_columns = left.column_expressions();
                let right_columns = right.column_expressions();

                if let Some((left_key, right_key)) = equi_join_keys(
                    join.join_type,
                    join.predicate.as_ref(),
                    &left_columns,
                    &right_columns,
                ) {
                    return Ok(PhysicalOperator::make(
                        OperatorKind::HashJoin(HashJoin {
                            join_type: join.join_type,
                            left_key: self.physicalize(&left_key)?,
                            right_key: self.physicalize(&right_key)?,
                            left_columns,
                            right_columns,
                        }),
                        Some(left_op),
                        Some(right_op),
                    ));
                }

                let predicate = match &join.predicate {
                    Some(predicate) => Some(self.physicalize(predicate)?),
                    None => None,
                };
                Ok(PhysicalOperator::make(
                    OperatorKind::NestedLoopJoin(NestedLoopJoin {
                        join_type: join.join_type,
                        predicate,
                        left_columns,
                        right_columns,
                    }),
                    Some(left_op),
                    Some(right_op),
                ))
            }
            LogicalNodeKind::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    rows.push(self.physicalize_all(row)?);
                }
                Ok(PhysicalOperator::make(
                    OperatorKind::Values(ValuesOperator { rows }),
                    None,
                    None,
                ))
            }
            LogicalNodeKind::Insert(insert) => {
                let (_, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Insert(InsertOperator {
                        table_name: insert.table_name.clone(),
                        table: insert.table.clone(),
                        columns: insert.columns.clone(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Update(update) => {
                let (input, input_op) = self.translate_input(node)?;
                let mut assignments = Vec::with_capacity(update.assignments.len());
                for (column, expression) in &update.assignments {
                    assignments.push((*column, self.physicalize(expression)?));
                }
                Ok(PhysicalOperator::make(
                    OperatorKind::Update(UpdateOperator {
                        table_name: update.table_name.clone(),
                        table: update.table.clone(),
                        assignments,
                        input_columns: input.column_expressions(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::Delete(delete) => {
                let (_, input_op) = self.translate_input(node)?;
                Ok(PhysicalOperator::make(
                    OperatorKind::Delete(DeleteOperator {
                        table_name: delete.table_name.clone(),
                    }),
                    Some(input_op),
                    None,
                ))
            }
            LogicalNodeKind::CreateTable(create) => Ok(PhysicalOperator::make(
                OperatorKind::CreateTable(CreateTableOperator {
                    storage: self.storage.clone(),
                    table_name: create.table_name.clone(),
                    columns: create.columns.clone(),
                    if_not_exists: create.if_not_exists,
                    target_chunk_size: self.target_chunk_size,
                }),
                None,
                None,
            )),
            LogicalNodeKind::DropTable(drop) => Ok(PhysicalOperator::make(
                OperatorKind::DropTable(DropTableOperator {
                    storage: self.storage.clone(),
                    table_name: drop.table_name.clone(),
                    if_exists: drop.if_exists,
                }),
                None,
                None,
            )),
            LogicalNodeKind::ShowTables(_) => Ok(PhysicalOperator::make(
                OperatorKind::ShowTables(ShowTablesOperator {
                    storage: self.storage.clone(),
                }),
                None,
                None,
            )),
            LogicalNodeKind::ShowColumns(show) => Ok(PhysicalOperator::make(
                OperatorKind::ShowColumns(ShowColumnsOperator {
                    table_name: show.table_name.clone(),
                    table: show.table.clone(),
                }),
                None,
                None,
            )),
            LogicalNodeKind::Mock(_) => Err(GraniteError::new("mock nodes are not executable")),
        }
    }

    fn physicalize_all(&mut self, expressions: &[Expression]) -> Result<Vec<Expression>> {
        expressions.iter().map(|e| self.physicalize(e)).collect()
    }

    /// Replace logical subquery plans with freshly translated operator DAGs.
    fn physicalize(&mut self, expression: &Expression) -> Result<Expression> {
        let mut out = expression.clone();
        self.physicalize_in_place(&mut out)?;
        Ok(out)
    }

    fn physicalize_in_place(&mut self, expression: &mut Expression) -> Result<()> {
        if let Expression::Subquery(subquery) = expression {
            if let SubqueryPlan::Logical(plan) = &subquery.plan {
                // A subplan is its own DAG; it gets its own memo.
                let mut translator =
                    LqpTranslator::new(self.storage.clone(), self.target_chunk_size);
                subquery.plan = SubqueryPlan::Physical(translator.translate(plan)?);
            }
        }
        for child in expression.arguments_mut() {
            self.physicalize_in_place(child)?;
        }
        Ok(())
    }
}

/// For an equality predicate with one side per input, the (left, right) key
/// expressions. Anything else nested-loops.
fn equi_join_keys(
    join_type: JoinType,
    predicate: Option<&Expression>,
    left_columns: &[Expression],
    right_columns: &[Expression],
) -> Option<(Expression, Expression)> {
    if join_type == JoinType::Cross {
        return None;
    }
    let comparison = match predicate {
        Some(Expression::Comparison(comparison)) if comparison.op == ComparisonOperator::Eq => {
            comparison
        }
        _ => return None,
    };

    let table_refs = |columns: &[Expression]| -> HashSet<TableRef> {
        columns
            .iter()
            .flat_map(|expr| {
                let mut refs = Vec::new();
                expr.collect_column_refs(&mut refs);
                refs.into_iter().map(|c| c.table_ref)
            })
            .collect()
    };
    let left_refs = table_refs(left_columns);
    let right_refs = table_refs(right_columns);

    let side_of = |expr: &Expression| -> Option<bool> {
        let mut refs = Vec::new();
        expr.collect_column_refs(&mut refs);
        if refs.is_empty() {
            return None;
        }
        if refs.iter().all(|c| left_refs.contains(&c.table_ref)) {
            Some(true)
        } else if refs.iter().all(|c| right_refs.contains(&c.table_ref)) {
            Some(false)
        } else {
            None
        }
    };

    match (side_of(&comparison.left), side_of(&comparison.right)) {
        (Some(true), Some(false)) => Some(((*comparison.left).clone(), (*comparison.right).clone())),
        (Some(false), Some(true)) => Some(((*comparison.right).clone(), (*comparison.left).clone())),
        _ => None,
    }
}
