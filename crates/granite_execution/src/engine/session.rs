use super::Engine;
use crate::execution::{build_operator_tasks, LqpTranslator};
use crate::logical::explain_plan;
use crate::optimizer::Optimizer;
use crate::sql::SqlTranslator;
use crate::storage::table::DEFAULT_TARGET_CHUNK_SIZE;
use crate::storage::{ColumnDefinition, DataType, ScalarValue, Table};
use granite_error::{GraniteError, Result};
use sqlparser::ast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct StatementResult {
    pub table: Arc<Table>,
}

/// Runs statements against an engine: parse, translate, optimize, translate
/// to operators, schedule, wait, then commit or roll back. One transaction
/// per statement.
pub struct Session<'a> {
    engine: &'a Engine,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a Engine) -> Session<'a> {
        Session { engine }
    }

    pub fn execute_sql(&self, sql: &str) -> Result<Vec<StatementResult>> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql)
            .map_err(|e| GraniteError::parse(e.to_string()))?;

        let mut results = Vec::with_capacity(statements.len());
        for statement in &statements {
            results.push(self.execute_statement(statement)?);
        }
        Ok(results)
    }

    pub fn execute_statement(&self, statement: &ast::Statement) -> Result<StatementResult> {
        if let ast::Statement::Explain { statement, .. } = statement {
            return self.explain_statement(statement);
        }

        let plan = self.plan_statement(statement)?;

        let mut translator = LqpTranslator::new(
            self.engine.storage().clone(),
            self.engine.config().target_chunk_size,
        );
        let root = translator.translate(&plan)?;

        let ctx = self.engine.transaction_manager().new_transaction_context();
        root.set_transaction_context_recursively(Arc::downgrade(&ctx));

        let tasks = build_operator_tasks(&root);
        debug!(num_tasks = tasks.len(), "scheduling query");
        self.engine.scheduler().schedule_and_wait(&tasks)?;

        if ctx.is_aborted() {
            let error = ctx.take_error();
            ctx.rollback();
            return Err(error.unwrap_or_else(GraniteError::transaction_aborted));
        }
        ctx.commit()?;

        let table = root
            .output()
            .ok_or_else(|| GraniteError::new("query produced no output"))?;
        Ok(StatementResult { table })
    }

    fn plan_statement(&self, statement: &ast::Statement) -> Result<crate::logical::NodeRef> {
        let translator = SqlTranslator::new(
            self.engine.storage().clone(),
            self.engine.config().validate_queries,
        );
        let plan = translator.translate_statement(statement)?;
        Optimizer::new().optimize(plan)
    }

    fn explain_statement(&self, statement: &ast::Statement) -> Result<StatementResult> {
        let plan = self.plan_statement(statement)?;
        let rendered = explain_plan(&plan);

        let table = Table::new(
            vec![ColumnDefinition::new("plan", DataType::Utf8, false)],
            DEFAULT_TARGET_CHUNK_SIZE,
        );
        table.append_rows(
            rendered
                .lines()
                .map(|line| vec![ScalarValue::Utf8(line.to_string())])
                .collect(),
            0,
        )?;
        Ok(StatementResult {
            table: Arc::new(table),
        })
    }
}
