//! Physical execution: operators, the logical-to-physical translator,
//! expression evaluation and the scheduler bridge.

pub mod evaluator;
pub mod lqp_translator;
pub mod operator_task;
pub mod operators;

pub use lqp_translator::LqpTranslator;
pub use operator_task::build_operator_tasks;
