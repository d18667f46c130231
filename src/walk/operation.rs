use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Most operations a single call site may splice in.
pub const STEP_LIMIT: u32 = u32::MAX / 2;

/// Sort key of an operation.
///
/// `major` is a bytecode address. Operations produced by an inlined call get
/// the call site's address and an increasing `minor`, so they sort after the
/// call and before the next instruction. [`Position::closing`] counts down
/// from the top of the same range for markers that must follow all of them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub major: u32,
    pub minor: u32,
}

impl Position {
    pub const fn at(address: u32) -> Self {
        Position {
            major: address,
            minor: 0,
        }
    }

    pub fn step(self, k: u32) -> Self {
        Position {
            major: self.major,
            minor: self.minor.saturating_add(k),
        }
    }

    pub fn closing(self, k: u32) -> Self {
        Position {
            major: self.major,
            minor: u32::MAX - k,
        }
    }

    /// The same offset one address further on.
    pub fn next_address(self) -> Self {
        Position::at(self.major + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}+{}", self.major, self.minor)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Write,
    Store,
    ArrayStore,
    PutField,
    If,
    Else,
    EndIf,
    Loop,
    EndLoop,
    Switch,
    Case,
    Break,
    EndSwitch,
    Increment,
    InterfaceCall,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Write => "write",
            OpKind::Store => "store",
            OpKind::ArrayStore => "arraystore",
            OpKind::PutField => "putfield",
            OpKind::If => "if",
            OpKind::Else => "else",
            OpKind::EndIf => "endif",
            OpKind::Loop => "loop",
            OpKind::EndLoop => "endloop",
            OpKind::Switch => "switch",
            OpKind::Case => "case",
            OpKind::Break => "break",
            OpKind::EndSwitch => "endswitch",
            OpKind::Increment => "increment",
            OpKind::InterfaceCall => "interfacecall",
        }
    }

    /// Starts a nested block. `else` both closes and opens.
    pub fn opens(self) -> bool {
        matches!(self, OpKind::If | OpKind::Loop | OpKind::Switch | OpKind::Else)
    }

    pub fn closes(self) -> bool {
        matches!(
            self,
            OpKind::EndIf | OpKind::EndLoop | OpKind::EndSwitch | OpKind::Else
        )
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One side effect seen while walking a method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub position: Position,
    #[serde(rename = "operation")]
    pub kind: OpKind,
    #[serde(flatten)]
    pub attrs: BTreeMap<&'static str, String>,
}

impl Operation {
    pub fn new(position: Position, kind: OpKind) -> Self {
        Operation {
            position,
            kind,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.attrs.insert(key, value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

/// Stable sort by position; equal positions keep their emission order.
pub fn sort_operations(operations: &mut [Operation]) {
    operations.sort_by_key(|op| op.position);
}

/// Moves `operations` to `base.step(1)`, `base.step(2)`, ... in position order.
pub fn renumber(operations: &mut [Operation], base: Position) -> Result<()> {
    if operations.len() as u64 >= STEP_LIMIT as u64 {
        return Err(Error::shape(
            base.major,
            format!("{} operations do not fit after one call site", operations.len()),
        ));
    }
    sort_operations(operations);
    for (k, op) in operations.iter_mut().enumerate() {
        op.position = base.step(k as u32 + 1);
    }
    Ok(())
}
