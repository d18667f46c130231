use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::descriptor::JvmType;
use super::invokedynamic::InvokeDynamicInfo;

/// A symbolic object built up by a hook, shared between every stack slot
/// and local that refers to it.
pub type ObjectRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// What a stack slot holds.
#[derive(Clone, Debug)]
pub enum Value {
    /// A synthesized Java-like expression or literal.
    Expr(String),
    Object(ObjectRef),
    Lambda(Rc<InvokeDynamicInfo>),
    List(Vec<Value>),
    /// Something that exists but that nobody can describe.
    Opaque,
}

impl Value {
    pub fn expr(text: impl Into<String>) -> Self {
        Value::Expr(text.into())
    }

    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn as_expr(&self) -> Option<&str> {
        match self {
            Value::Expr(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Rc<InvokeDynamicInfo>> {
        match self {
            Value::Lambda(info) => Some(info),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Expr(text) => serde_json::Value::String(text.clone()),
            Value::Object(obj) => serde_json::Value::Object(
                obj.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Lambda(info) => serde_json::Value::String(info.to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Opaque => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Expr(text) => f.write_str(text),
            Value::Object(_) => write!(f, "{}", self.to_json()),
            Value::Lambda(info) => write!(f, "{info}"),
            Value::List(items) => write!(f, "[{}]", join(items, ", ")),
            Value::Opaque => f.write_str("<opaque>"),
        }
    }
}

/// JVM computational type category: how many slots a value takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Single,
    Double,
}

impl Category {
    pub fn of(ty: &JvmType) -> Self {
        if ty.is_wide() {
            Category::Double
        } else {
            Category::Single
        }
    }

    pub fn width(self) -> u16 {
        match self {
            Category::Single => 1,
            Category::Double => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StackOperand {
    pub value: Value,
    pub category: Category,
    /// Address of the `new` that allocated this value, if any. Copies made by
    /// `dup` keep it, so a constructor call can update all of them.
    pub origin: Option<u32>,
}

impl StackOperand {
    pub fn new(value: Value, category: Category) -> Self {
        StackOperand {
            value,
            category,
            origin: None,
        }
    }

    pub fn expr(text: impl Into<String>) -> Self {
        Self::new(Value::expr(text), Category::Single)
    }

    pub fn is_double(&self) -> bool {
        self.category == Category::Double
    }
}

impl From<Value> for StackOperand {
    fn from(value: Value) -> Self {
        Self::new(value, Category::Single)
    }
}

impl fmt::Display for StackOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Comma separated display of a list of operands.
pub fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}
