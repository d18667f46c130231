//! The capability interface through which callers give meaning to
//! allocations, calls, field accesses and lambdas.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::error::Walk;

use super::descriptor::{display_class_name, MethodDescriptor};
use super::inline::lambda_operations;
use super::invokedynamic::InvokeDynamicInfo;
use super::machine::WalkContext;
use super::operation::{Operation, Position};
use super::value::{join, StackOperand, Value};

/// Field name to the value a `getfield` of it on the walked class yields.
pub type SpecialFields = BTreeMap<String, StackOperand>;

/// Wrapper methods to see through: calls on `owner` to `(name, descriptor)`
/// are treated as calls to the mapped method.
#[derive(Clone, Debug, Default)]
pub struct ThunkTable {
    pub owner: Option<String>,
    pub entries: HashMap<(String, String), (String, String)>,
}

impl ThunkTable {
    pub fn new(owner: &str) -> Self {
        ThunkTable {
            owner: Some(owner.to_string()),
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, from: (String, String), to: (String, String)) {
        self.entries.insert(from, to);
    }

    pub fn resolve(&self, class: &str, name: &str, descriptor: &str) -> Option<(&str, &str)> {
        if self.owner.as_deref() != Some(class) {
            return None;
        }
        self.entries
            .get(&(name.to_string(), descriptor.to_string()))
            .map(|(n, d)| (n.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// A method call about to happen, with its operands already popped.
#[derive(Debug)]
pub struct InvokeSite<'s> {
    pub position: u32,
    pub kind: InvokeKind,
    pub class: String,
    pub name: String,
    pub descriptor: MethodDescriptor,
    /// `None` for static calls.
    pub receiver: Option<StackOperand>,
    pub args: Vec<StackOperand>,
    /// Forwarded to walks of methods on the walked class.
    pub special_fields: &'s SpecialFields,
}

impl InvokeSite<'_> {
    pub fn is_static(&self) -> bool {
        self.kind == InvokeKind::Static
    }

    /// The receiver, or the class name for static calls.
    pub fn object(&self) -> String {
        match &self.receiver {
            Some(receiver) => receiver.to_string(),
            None => display_class_name(&self.class),
        }
    }

    /// The receiver followed by the arguments; just the arguments when static.
    pub fn receiver_and_args(&self) -> Vec<StackOperand> {
        self.receiver.iter().chain(self.args.iter()).cloned().collect()
    }

    pub fn call_position(&self) -> Position {
        Position::at(self.position)
    }
}

/// What a hook made of a call.
#[derive(Debug, Default)]
pub struct Invoked {
    /// Pushed if present. A non-void call without a result pushes an opaque value.
    pub result: Option<Value>,
    pub operations: Vec<Operation>,
    /// Replacement for the receiver of a constructor call, applied to every
    /// stack copy of the allocation.
    pub initialized: Option<Value>,
}

impl Invoked {
    pub fn value(result: Value) -> Self {
        Invoked {
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn operations(operations: Vec<Operation>) -> Self {
        Invoked {
            operations,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct FieldAccess {
    pub position: u32,
    pub is_static: bool,
    pub class: String,
    pub name: String,
    pub descriptor: String,
    /// The object for instance fields.
    pub object: Option<StackOperand>,
}

pub trait DispatchHook {
    fn on_new(&mut self, _cx: &mut WalkContext<'_>, _position: u32, class: &str) -> Walk<Value> {
        Ok(Value::expr(format!("new {}", display_class_name(class))))
    }

    fn on_invoke(&mut self, cx: &mut WalkContext<'_>, site: InvokeSite<'_>) -> Walk<Invoked> {
        fallback_invoke(self, cx, site)
    }

    /// `None` keeps the default `object.field` expression.
    fn on_get_field(&mut self, _cx: &mut WalkContext<'_>, _access: &FieldAccess) -> Walk<Option<Value>> {
        Ok(None)
    }

    fn on_put_field(
        &mut self,
        _cx: &mut WalkContext<'_>,
        _access: &FieldAccess,
        _value: &StackOperand,
    ) -> Walk<()> {
        Ok(())
    }

    fn on_invokedynamic(&mut self, _cx: &mut WalkContext<'_>, info: Rc<InvokeDynamicInfo>) -> Walk<Value> {
        Ok(Value::Lambda(info))
    }
}

/// Hook that only builds expressions.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExpressionHook;

impl DispatchHook for ExpressionHook {}

/// Call handling shared by hooks that have nothing special to say about a call.
pub fn fallback_invoke<H: DispatchHook + ?Sized>(
    hook: &mut H,
    cx: &mut WalkContext<'_>,
    site: InvokeSite<'_>,
) -> Walk<Invoked> {
    if site.name == "<init>" {
        if let Some(receiver @ StackOperand { value: Value::Expr(_), .. }) = &site.receiver {
            return Ok(Invoked {
                initialized: Some(Value::expr(format!("{}({})", receiver, join(&site.args, ", ")))),
                ..Invoked::default()
            });
        }
        return Ok(Invoked::default());
    }

    if let Some(Value::Lambda(info)) = site.receiver.as_ref().map(|r| &r.value) {
        if info.dynamic_name == site.name {
            let info = Rc::clone(info);
            let operations = lambda_operations(cx, hook, site.call_position(), &info, site.args)?;
            return Ok(Invoked::operations(operations));
        }
    }

    if site.descriptor.returns_void() {
        debug!(
            class = %site.class,
            method = %site.name,
            descriptor = %site.descriptor,
            "ignoring void call"
        );
        return Ok(Invoked::default());
    }
    Ok(Invoked::value(Value::expr(format!(
        "{}.{}({})",
        site.object(),
        site.name,
        join(&site.args, ", ")
    ))))
}
