//! Decoding of `invokedynamic` call sites into something the walker can
//! display or call into.

use std::fmt;

use crate::classpath::LoadedClass;
use crate::constant_info::{
    format_constant, get_constant, get_method_type, get_name_and_type, get_utf8, resolve_method_handle,
    ConstantInfo,
};
use crate::error::{Error, Result};

use super::descriptor::{display_class_name, MethodDescriptor};
use super::value::StackOperand;

const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
const STRING_CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";

/// `MethodHandle` reference kinds (JVMS 4.4.8).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl RefKind {
    pub fn from_u8(kind: u8) -> Option<Self> {
        Some(match kind {
            1 => RefKind::GetField,
            2 => RefKind::GetStatic,
            3 => RefKind::PutField,
            4 => RefKind::PutStatic,
            5 => RefKind::InvokeVirtual,
            6 => RefKind::InvokeStatic,
            7 => RefKind::InvokeSpecial,
            8 => RefKind::NewInvokeSpecial,
            9 => RefKind::InvokeInterface,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum DynamicTarget {
    /// A lambda or method reference produced by `LambdaMetafactory`.
    Lambda {
        ref_kind: RefKind,
        class: String,
        name: String,
        desc: MethodDescriptor,
        /// The functional interface method as seen by callers, after generics.
        instantiated: MethodDescriptor,
    },
    /// `makeConcatWithConstants`: `\u{1}` takes the next argument, `\u{2}`
    /// the next bootstrap constant.
    StringConcat { recipe: String, constants: Vec<String> },
    Unknown { bootstrap: String },
}

#[derive(Clone, Debug)]
pub struct InvokeDynamicInfo {
    pub position: u32,
    pub dynamic_name: String,
    pub dynamic_desc: MethodDescriptor,
    pub target: DynamicTarget,
    /// Values captured when the call site ran, in argument order.
    pub stored_args: Vec<StackOperand>,
}

impl InvokeDynamicInfo {
    /// Decode the call site whose `InvokeDynamic` constant is `index` in `class`.
    pub fn create(class: &LoadedClass, index: u16, position: u32) -> Result<Self> {
        let pool = &class.constants;
        let missing = |what: &str| Error::Resolution(format!("{}: invokedynamic #{index}: {what}", class.name));

        let constant = match get_constant(pool, index) {
            Some(ConstantInfo::InvokeDynamic(c)) => c,
            _ => return Err(missing("not an InvokeDynamic constant")),
        };
        let (dynamic_name, dynamic_desc) =
            get_name_and_type(pool, constant.name_and_type_index).ok_or_else(|| missing("bad name and type"))?;
        let bootstrap = class
            .bootstrap_methods
            .get(constant.bootstrap_method_attr_index as usize)
            .ok_or_else(|| missing("no such bootstrap method"))?;
        let (_, bsm_class, bsm_name, _) = resolve_method_handle(pool, bootstrap.bootstrap_method_ref)
            .ok_or_else(|| missing("bootstrap method is not a method handle"))?;
        let args = &bootstrap.bootstrap_arguments;

        let target = if bsm_class == LAMBDA_METAFACTORY {
            if args.len() < 3 {
                return Err(missing("metafactory takes at least three arguments"));
            }
            let (kind, class, name, desc) =
                resolve_method_handle(pool, args[1]).ok_or_else(|| missing("implementation is not a method handle"))?;
            let instantiated = get_method_type(pool, args[2]).ok_or_else(|| missing("instantiated type missing"))?;
            DynamicTarget::Lambda {
                ref_kind: RefKind::from_u8(kind).ok_or_else(|| missing("bad reference kind"))?,
                class: class.to_string(),
                name: name.to_string(),
                desc: MethodDescriptor::parse(desc)?,
                instantiated: MethodDescriptor::parse(instantiated)?,
            }
        } else if bsm_class == STRING_CONCAT_FACTORY && bsm_name == "makeConcatWithConstants" {
            let recipe = match args.first().and_then(|&i| get_constant(pool, i)) {
                Some(ConstantInfo::String(s)) => get_utf8(pool, s.string_index),
                _ => None,
            }
            .ok_or_else(|| missing("recipe is not a string"))?;
            DynamicTarget::StringConcat {
                recipe: recipe.to_string(),
                constants: args[1..]
                    .iter()
                    .map(|&i| format_constant(pool, i).ok_or_else(|| missing("bad concat constant")))
                    .collect::<Result<_>>()?,
            }
        } else {
            DynamicTarget::Unknown {
                bootstrap: format!("{bsm_class}.{bsm_name}"),
            }
        };

        Ok(InvokeDynamicInfo {
            position,
            dynamic_name: dynamic_name.to_string(),
            dynamic_desc: MethodDescriptor::parse(dynamic_desc)?,
            target,
            stored_args: Vec::new(),
        })
    }

    /// Descriptor of the method a lambda ends up calling.
    pub fn method_desc(&self) -> Option<&MethodDescriptor> {
        match &self.target {
            DynamicTarget::Lambda { desc, .. } => Some(desc),
            _ => None,
        }
    }

    pub fn instantiated_desc(&self) -> Option<&MethodDescriptor> {
        match &self.target {
            DynamicTarget::Lambda { instantiated, .. } => Some(instantiated),
            _ => None,
        }
    }

    /// Display name of the type of the last argument the lambda target takes.
    pub fn last_arg_type(&self) -> Option<String> {
        let last = self.method_desc()?.args.last()?;
        Some(last.base_name().replace('/', "."))
    }

    /// Renders a string concatenation site with its stored arguments.
    pub fn render_concat(&self) -> Option<String> {
        let DynamicTarget::StringConcat { recipe, constants } = &self.target else {
            return None;
        };
        let mut args = self.stored_args.iter();
        let mut constants = constants.iter();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let flush = |literal: &mut String, parts: &mut Vec<String>| {
            if !literal.is_empty() {
                parts.push(format!("\"{literal}\""));
                literal.clear();
            }
        };
        for ch in recipe.chars() {
            match ch {
                '\u{1}' => {
                    flush(&mut literal, &mut parts);
                    parts.push(args.next().map(|a| a.to_string()).unwrap_or_default());
                }
                '\u{2}' => {
                    flush(&mut literal, &mut parts);
                    parts.push(constants.next().cloned().unwrap_or_default());
                }
                _ => literal.push(ch),
            }
        }
        flush(&mut literal, &mut parts);
        if parts.is_empty() {
            return Some("\"\"".to_string());
        }
        Some(parts.join(" + "))
    }
}

impl fmt::Display for InvokeDynamicInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            DynamicTarget::Lambda { class, name, .. } => write!(f, "{}::{}", display_class_name(class), name),
            DynamicTarget::StringConcat { .. } => f.write_str(&self.render_concat().unwrap_or_default()),
            DynamicTarget::Unknown { bootstrap } => write!(f, "{}<{}>", self.dynamic_name, bootstrap),
        }
    }
}
