//! Symbolic interpretation of method bytecode.

pub mod descriptor;
pub mod flow;
pub mod hook;
pub mod inline;
pub mod invokedynamic;
pub mod machine;
pub mod nest;
pub mod operand;
pub mod operation;
pub mod value;

pub use self::hook::{
    fallback_invoke, DispatchHook, ExpressionHook, FieldAccess, InvokeKind, InvokeSite, Invoked, SpecialFields,
    ThunkTable,
};
pub use self::inline::{lambda_operations, sub_operations, walk_call, SubcallCache};
pub use self::invokedynamic::{DynamicTarget, InvokeDynamicInfo};
pub use self::machine::{interpret, Completion, MethodWalk, WalkContext};
pub use self::nest::{format, nest, Node};
pub use self::operation::{OpKind, Operation, Position};
pub use self::value::{Category, StackOperand, Value};
