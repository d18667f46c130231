//! Classification of `goto` against the operations emitted so far.

use crate::error::{Error, Result};

use super::operation::{OpKind, Operation, Position};

/// Index of the first operation of `kind` positioned strictly after `after`,
/// in position order (emission order breaks ties).
pub fn find_next(operations: &[Operation], after: Position, kind: OpKind) -> Option<usize> {
    operations
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind == kind && op.position > after)
        .min_by_key(|(i, op)| (op.position, *i))
        .map(|(i, _)| i)
}

/// Like [`find_next`] but also accepting an operation exactly at `from`.
pub fn find_from(operations: &[Operation], from: Position, kind: OpKind) -> Option<usize> {
    operations
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind == kind && op.position >= from)
        .min_by_key(|(i, op)| (op.position, *i))
        .map(|(i, _)| i)
}

/// What a `goto` turned out to be.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GotoKind {
    /// Leaves a switch case.
    Break,
    /// Jumps over an else branch. `ternary` is set when a value is left on
    /// the stack, which makes the whole if/else a conditional expression.
    Else { ternary: bool },
    /// Back edge of a loop.
    Loop,
    /// Jump over code nothing else refers to; instructions up to the target
    /// are ignored.
    Skip,
}

/// Classifies the `goto` at `address` jumping to `target` and rewrites
/// `operations` to match.
pub fn classify_goto(
    operations: &mut Vec<Operation>,
    address: u32,
    target: u32,
    stack_depth: usize,
) -> Result<GotoKind> {
    let here = Position::at(address);
    let to = Position::at(target);
    let endif = find_next(operations, here, OpKind::EndIf);
    let case = find_next(operations, here, OpKind::Case);

    if let Some(case) = case {
        if to > operations[case].position {
            operations.push(Operation::new(here, OpKind::Break));
            return Ok(GotoKind::Break);
        }
    }

    match endif {
        Some(endif) if target > address => {
            operations[endif].kind = OpKind::Else;
            operations.push(Operation::new(to, OpKind::EndIf));
            Ok(GotoKind::Else {
                ternary: stack_depth != 0,
            })
        }
        Some(endif) => {
            let head = find_from(operations, to, OpKind::If).ok_or_else(|| {
                Error::shape(address, format!("backward goto to {target} has no loop condition"))
            })?;
            operations[endif].kind = OpKind::EndLoop;
            operations[head].kind = OpKind::Loop;
            Ok(GotoKind::Loop)
        }
        None if target > address => Ok(GotoKind::Skip),
        None => Err(Error::shape(
            address,
            format!("goto {target} matches no enclosing block"),
        )),
    }
}
