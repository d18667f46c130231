//! Splicing the operations of called methods into the caller.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::classpath::{ClassSource, LoadedClass};
use crate::error::{Error, Result, Walk};

use super::descriptor::MethodDescriptor;
use super::hook::{DispatchHook, InvokeKind, InvokeSite, SpecialFields};
use super::invokedynamic::{DynamicTarget, InvokeDynamicInfo, RefKind};
use super::machine::{interpret, MethodWalk, WalkContext};
use super::operation::{renumber, OpKind, Operation, Position};
use super::value::{join, Category, StackOperand};

/// Identity of an inlined call: the method plus how its arguments display.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubcallKey {
    pub class: String,
    pub name: String,
    pub descriptor: String,
    pub args: String,
    pub special: String,
}

impl SubcallKey {
    fn new(class: &str, name: &str, descriptor: &MethodDescriptor, args: &[StackOperand], special: &SpecialFields) -> Self {
        SubcallKey {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.raw.clone(),
            args: join(args, ","),
            special: special
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Operations of previously inlined calls, for the length of one extraction.
#[derive(Debug, Default)]
pub struct SubcallCache {
    entries: HashMap<SubcallKey, Vec<Operation>>,
    hits: usize,
    misses: usize,
}

impl SubcallCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Finds `name` taking `args_descriptor` on `class` or the nearest superclass
/// declaring it. Returns the declaring class and the method's index in it.
pub fn resolve_method(
    classes: &dyn ClassSource,
    class: &str,
    name: &str,
    args_descriptor: &str,
) -> Result<(Rc<LoadedClass>, usize)> {
    let mut current = classes.load(class)?;
    loop {
        if let Some(index) = current
            .methods
            .iter()
            .position(|m| m.name == name && m.descriptor.args_descriptor() == args_descriptor)
        {
            return Ok((current, index));
        }
        let parent = match current.super_name.as_deref() {
            Some(parent) if parent != "java/lang/Object" => parent.to_string(),
            _ => {
                return Err(Error::Resolution(format!(
                    "no method {name}{args_descriptor} in {class} or its superclasses"
                )))
            }
        };
        current = classes.load(&parent)?;
    }
}

/// Operations of a call to `class.name`, placed right after `position`.
///
/// `args` includes the receiver for instance methods. Abstract targets yield
/// a single `interfacecall` describing the call instead of a walk.
#[allow(clippy::too_many_arguments)]
#[instrument(level = "debug", skip_all, fields(class = %class, method = %name))]
pub fn sub_operations<H: DispatchHook + ?Sized>(
    cx: &mut WalkContext<'_>,
    hook: &mut H,
    position: Position,
    class: &str,
    name: &str,
    descriptor: &MethodDescriptor,
    args: Vec<StackOperand>,
    special_fields: &SpecialFields,
) -> Walk<Vec<Operation>> {
    let key = SubcallKey::new(class, name, descriptor, &args, special_fields);
    if let Some(cached) = cx.cache.entries.get(&key) {
        let mut operations = cached.clone();
        cx.cache.hits += 1;
        debug!(class, method = name, "inlined call served from cache");
        renumber(&mut operations, position)?;
        return Ok(operations);
    }
    cx.cache.misses += 1;

    let (owner, index) = resolve_method(cx.classes, class, name, descriptor.args_descriptor())?;
    let method = &owner.methods[index];
    let mut operations = if method.is_abstract() {
        if method.is_static() {
            return Err(Error::Resolution(format!("{class}.{name}{descriptor} is static and abstract")).into());
        }
        let field = args
            .first()
            .ok_or_else(|| Error::shape(position.major, "abstract call without a receiver"))?;
        vec![Operation::new(position, OpKind::InterfaceCall)
            .with("type", if owner.is_interface() { "interface" } else { "abstract" })
            .with("target", class)
            .with("name", name)
            .with("method", format!("{name}{descriptor}"))
            .with("field", field)
            .with("args", join(&args[1..], ", "))]
    } else {
        cx.nested(|cx| interpret(cx, &owner, method, args, hook, special_fields))?
            .operations
    };

    renumber(&mut operations, position)?;
    cx.cache.entries.insert(key, operations.clone());
    Ok(operations)
}

/// Operations of calling the lambda `info` with `args`, placed after `base`.
///
/// The call to the lambda's target is handed to `hook` the way the call
/// site would dispatch it, so method references on the buffer or on other
/// hooked classes are seen as calls rather than walked through.
pub fn lambda_operations<H: DispatchHook + ?Sized>(
    cx: &mut WalkContext<'_>,
    hook: &mut H,
    base: Position,
    info: &InvokeDynamicInfo,
    args: Vec<StackOperand>,
) -> Walk<Vec<Operation>> {
    let DynamicTarget::Lambda {
        ref_kind,
        class,
        name,
        desc,
        instantiated,
    } = &info.target
    else {
        return Err(Error::Resolution(format!("{info} is not a lambda")).into());
    };
    if args.len() != instantiated.args.len() {
        return Err(Error::shape(
            base.major,
            format!("{info} takes {} arguments, got {}", instantiated.args.len(), args.len()),
        )
        .into());
    }

    let stored = info.stored_args.len();
    let mut effective = info.stored_args.clone();
    effective.extend(args);
    let kind = match ref_kind {
        RefKind::InvokeStatic => InvokeKind::Static,
        RefKind::InvokeVirtual => InvokeKind::Virtual,
        RefKind::InvokeInterface => InvokeKind::Interface,
        RefKind::InvokeSpecial | RefKind::NewInvokeSpecial => InvokeKind::Special,
        other => {
            return Err(Error::Resolution(format!("{info}: {other:?} handles cannot be called")).into());
        }
    };
    let takes_receiver = !matches!(ref_kind, RefKind::InvokeStatic | RefKind::NewInvokeSpecial);
    let arity_ok = if takes_receiver {
        effective.len() == desc.args.len() + 1 && stored <= 1
    } else {
        effective.len() == desc.args.len()
    };
    if !arity_ok {
        return Err(Error::shape(
            base.major,
            format!("{info} called with {} values for {desc}", effective.len()),
        )
        .into());
    }

    let receiver = if *ref_kind == RefKind::NewInvokeSpecial {
        let value = hook.on_new(cx, base.major, class)?;
        Some(StackOperand {
            value,
            category: Category::Single,
            origin: Some(base.major),
        })
    } else if takes_receiver {
        Some(effective.remove(0))
    } else {
        None
    };
    let (name, descriptor) = match cx.thunks.resolve(class, name, &desc.raw) {
        Some((to_name, to_descriptor)) => (to_name.to_string(), MethodDescriptor::parse(to_descriptor)?),
        None => (name.clone(), desc.clone()),
    };

    let no_fields = SpecialFields::new();
    let site = InvokeSite {
        position: base.major,
        kind,
        class: class.clone(),
        name,
        descriptor,
        receiver,
        args: effective,
        special_fields: &no_fields,
    };
    let mut operations = cx.nested(|cx| hook.on_invoke(cx, site))?.operations;
    renumber(&mut operations, base)?;
    Ok(operations)
}

/// Walks `class.name` with `args` one level deeper, without caching. Used by
/// hooks that want the callee's returned value rather than its operations.
#[instrument(level = "debug", skip(cx, hook, args))]
pub fn walk_call<H: DispatchHook + ?Sized>(
    cx: &mut WalkContext<'_>,
    hook: &mut H,
    class: &str,
    name: &str,
    descriptor: &str,
    args: Vec<StackOperand>,
) -> Walk<MethodWalk> {
    let owner = cx.classes.load(class)?;
    let method = owner
        .find_method(name, descriptor)
        .ok_or_else(|| Error::Resolution(format!("no method {name}{descriptor} in {class}")))?;
    cx.nested(|cx| interpret(cx, &owner, method, args, hook, &SpecialFields::new()))
}
