// SPDX-License-Identifier: MIT

//! Decomposition of a token stream into binary-operation tasks
//!
//! Two left-to-right passes: the first folds `*` and `/`, the second folds
//! `+` and `-`. Each fold emits a task and leaves a reference to it in the
//! operand position, so later folds pick it up as an operand. References
//! therefore always point at a task emitted earlier in the same run.

use super::token::Token;
use crate::common::{CalcError, Result};
use crate::engine::model::{Operand, Operator, Task};

/// Output of [`decompose`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Tasks in emission order
    pub tasks: Vec<Task>,
    /// The expression's value: a reference to the root task, or the literal
    /// itself when the expression has no operators
    pub value: Operand,
}

impl Decomposition {
    /// Id of the task holding the final value, if any task was emitted
    pub fn root_task_id(&self) -> Option<&str> {
        self.value.as_reference()
    }

    /// The final value for an operator-free expression
    pub fn literal_value(&self) -> Option<f64> {
        self.value.as_literal()
    }
}

#[derive(Debug)]
enum Slot {
    Value(Operand),
    Op(Operator),
}

/// Turn tokens into tasks for the expression `expression_id`
pub fn decompose(tokens: &[Token], expression_id: &str) -> Result<Decomposition> {
    let slots: Vec<Slot> = tokens
        .iter()
        .map(|t| match t {
            Token::Number(n) => Slot::Value(Operand::Literal(*n)),
            Token::Op(op) => Slot::Op(*op),
        })
        .collect();

    let mut tasks = Vec::new();
    let slots = fold_pass(slots, true, expression_id, &mut tasks)?;
    let mut slots = fold_pass(slots, false, expression_id, &mut tasks)?;

    if slots.len() != 1 {
        return Err(CalcError::malformed(format!(
            "expected a single value after decomposition, found {} items",
            slots.len()
        )));
    }

    match slots.pop() {
        Some(Slot::Value(value)) => {
            log::debug!(
                "Decomposed expression {} into {} task(s)",
                expression_id,
                tasks.len()
            );
            Ok(Decomposition { tasks, value })
        }
        _ => Err(CalcError::malformed("expression has no operands")),
    }
}

/// Fold every operator of one precedence tier into a task
fn fold_pass(
    slots: Vec<Slot>,
    multiplicative: bool,
    expression_id: &str,
    tasks: &mut Vec<Task>,
) -> Result<Vec<Slot>> {
    let mut out: Vec<Slot> = Vec::with_capacity(slots.len());
    let mut iter = slots.into_iter();

    while let Some(slot) = iter.next() {
        match slot {
            Slot::Op(op) if op.is_multiplicative() == multiplicative => {
                let lhs = match out.pop() {
                    Some(Slot::Value(v)) => v,
                    _ => {
                        return Err(CalcError::malformed(format!(
                            "operator '{}' has no left operand",
                            op
                        )))
                    }
                };
                let rhs = match iter.next() {
                    Some(Slot::Value(v)) => v,
                    _ => {
                        return Err(CalcError::malformed(format!(
                            "operator '{}' has no right operand",
                            op
                        )))
                    }
                };

                let task = Task::new(lhs, op, rhs, expression_id);
                out.push(Slot::Value(Operand::Reference(task.id.clone())));
                tasks.push(task);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expression::tokenize;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn decompose_str(input: &str) -> Result<Decomposition> {
        decompose(&tokenize(input)?, "expr-1")
    }

    /// Resolve tasks in emission order, the way workers would bottom-up
    fn resolve(decomposition: &Decomposition) -> f64 {
        let mut results: HashMap<&str, f64> = HashMap::new();
        let value_of = |op: &Operand, results: &HashMap<&str, f64>| match op {
            Operand::Literal(v) => *v,
            Operand::Reference(id) => results[id.as_str()],
        };
        for task in &decomposition.tasks {
            let v = task.operation.apply(
                value_of(&task.arg1, &results),
                value_of(&task.arg2, &results),
            );
            results.insert(task.id.as_str(), v);
        }
        value_of(&decomposition.value, &results)
    }

    #[test]
    fn test_precedence_scenario() {
        let d = decompose_str("2 + 3 * 4").unwrap();
        assert_eq!(d.tasks.len(), 2);

        let t1 = &d.tasks[0];
        assert_eq!(t1.arg1, Operand::Literal(3.0));
        assert_eq!(t1.operation, Operator::Multiply);
        assert_eq!(t1.arg2, Operand::Literal(4.0));
        assert!(t1.is_ready());

        let t2 = &d.tasks[1];
        assert_eq!(t2.arg1, Operand::Literal(2.0));
        assert_eq!(t2.operation, Operator::Add);
        assert_eq!(t2.arg2, Operand::Reference(t1.id.clone()));
        assert!(!t2.is_ready());

        assert_eq!(d.root_task_id(), Some(t2.id.as_str()));
        assert_eq!(resolve(&d), 14.0);
    }

    #[test]
    fn test_single_operation() {
        let d = decompose_str("5 + 7").unwrap();
        assert_eq!(d.tasks.len(), 1);
        assert!(d.tasks[0].is_ready());
        assert_eq!(d.root_task_id(), Some(d.tasks[0].id.as_str()));
        assert_eq!(d.tasks[0].expression_id, "expr-1");
    }

    #[test]
    fn test_chained_multiplication_is_left_associative() {
        let d = decompose_str("8 / 4 / 2").unwrap();
        assert_eq!(d.tasks.len(), 2);
        assert_eq!(d.tasks[1].arg1, Operand::Reference(d.tasks[0].id.clone()));
        assert_eq!(d.tasks[1].arg2, Operand::Literal(2.0));
        assert_eq!(resolve(&d), 1.0);
    }

    #[test]
    fn test_mixed_chain() {
        let d = decompose_str("10 - 2 * 3 - 4 / 2 + 1").unwrap();
        assert_eq!(d.tasks.len(), 5);
        assert_eq!(resolve(&d), 10.0 - 6.0 - 2.0 + 1.0);
    }

    #[test]
    fn test_references_point_backwards() {
        let d = decompose_str("1 * 2 + 3 * 4 - 5 * 6 / 7").unwrap();
        for (i, task) in d.tasks.iter().enumerate() {
            for r in task.references() {
                let pos = d.tasks.iter().position(|t| t.id == r).unwrap();
                assert!(pos < i, "task {} references later task {}", i, pos);
            }
        }
    }

    #[test]
    fn test_task_count_equals_operator_count() {
        for (input, ops) in [("1", 0), ("1+2", 1), ("1+2*3", 2), ("1*2*3*4-5", 4)] {
            assert_eq!(decompose_str(input).unwrap().tasks.len(), ops, "{}", input);
        }
    }

    #[test]
    fn test_bare_number_has_no_tasks() {
        let d = decompose_str("42").unwrap();
        assert!(d.tasks.is_empty());
        assert_eq!(d.root_task_id(), None);
        assert_eq!(d.literal_value(), Some(42.0));
    }

    #[test]
    fn test_parentheses_do_not_override_precedence() {
        let d = decompose_str("(2 + 3) * 4").unwrap();
        assert_eq!(resolve(&d), 14.0);
    }

    #[test]
    fn test_leading_operator_is_malformed() {
        let err = decompose_str("* 3").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
        let err = decompose_str("- 3").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
    }

    #[test]
    fn test_trailing_operator_is_malformed() {
        let err = decompose_str("3 +").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
        let err = decompose_str("3 /").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
    }

    #[test]
    fn test_adjacent_operators_are_malformed() {
        let err = decompose_str("2 + * 3").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
    }

    #[test]
    fn test_adjacent_numbers_are_malformed() {
        let err = decompose_str("2 3 + 4").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
    }

    #[test]
    fn test_empty_token_stream_is_malformed() {
        let err = decompose(&[], "expr-1").unwrap_err();
        assert!(matches!(err, CalcError::MalformedExpression(_)));
    }
}
