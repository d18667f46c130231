//! Reads the entries a registry class sets up in its static initializer.
//!
//! Each `register("name", ..., entry)` call in `<clinit>` becomes an entry
//! with a `text_id` and a running `numeric_id`. Builder calls before the
//! registration fill in the entry's properties.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::classpath::ClassSource;
use crate::error::{Halt, Result, Walk};
use crate::options::ExtractOptions;
use crate::walk::hook::{fallback_invoke, DispatchHook, FieldAccess, InvokeSite, Invoked, ThunkTable};
use crate::walk::inline::{walk_call, SubcallCache};
use crate::walk::invokedynamic::{DynamicTarget, InvokeDynamicInfo, RefKind};
use crate::walk::machine::{Completion, WalkContext};
use crate::walk::value::{ObjectRef, StackOperand, Value};

use super::Extraction;

/// Keys an entry gets at registration, dropped when a builder copies it.
const IDENTITY_KEYS: [&str; 4] = ["text_id", "numeric_id", "class", "display_name"];

pub struct RegistryHook<'c> {
    list: &'c str,
    entry: &'c str,
    builder: Option<&'c str>,
    next_id: u32,
    pub entries: BTreeMap<String, ObjectRef>,
    pub ordered: Vec<String>,
    pub fields: BTreeMap<String, String>,
}

impl<'c> RegistryHook<'c> {
    pub fn new(list: &'c str, entry: &'c str, builder: Option<&'c str>) -> Self {
        RegistryHook {
            list,
            entry,
            builder,
            next_id: 0,
            entries: BTreeMap::new(),
            ordered: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    fn is_entry_or_builder(&self, class: &str) -> bool {
        class == self.entry || Some(class) == self.builder
    }

    /// `class` and its superclasses, stopping after the entry class.
    fn super_chain(&self, classes: &dyn ClassSource, class: &str) -> Value {
        let mut chain = Vec::new();
        let mut current = class.to_string();
        while current != self.entry {
            let parent = match classes.load(&current) {
                Ok(loaded) => loaded.super_name.clone(),
                Err(e) => {
                    debug!(class = %current, error = %e, "superclass chain cut short");
                    None
                }
            };
            match parent {
                Some(parent) => {
                    chain.push(Value::expr(parent.clone()));
                    current = parent;
                }
                None => break,
            }
        }
        Value::List(chain)
    }

    fn allocation(&self, classes: &dyn ClassSource, class: &str) -> Value {
        Value::object([
            ("class".to_string(), Value::expr(class)),
            ("super".to_string(), self.super_chain(classes, class)),
        ])
    }

    fn register(&mut self, site: &InvokeSite<'_>) -> Walk<Invoked> {
        let text_id = site.args[0].to_string().trim_matches('"').to_string();
        let Some(entry) = site.args.last().and_then(|arg| arg.value.as_object()).cloned() else {
            debug!(text_id, "registered value is not an object");
            return Ok(Invoked::value(Value::Opaque));
        };
        if site.args.len() == 3 {
            if let Some(extra) = site.args[1].value.as_object() {
                if !Rc::ptr_eq(extra, &entry) {
                    let extra = extra.borrow().clone();
                    entry.borrow_mut().extend(extra);
                }
            }
        }
        {
            let mut fields = entry.borrow_mut();
            fields.insert("text_id".into(), Value::expr(&text_id));
            fields.insert("numeric_id".into(), Value::expr(self.next_id.to_string()));
        }
        self.next_id += 1;
        self.entries.insert(text_id.clone(), Rc::clone(&entry));
        self.ordered.push(text_id);
        Ok(Invoked::value(Value::Object(entry)))
    }

    fn static_call(&mut self, cx: &mut WalkContext<'_>, site: InvokeSite<'_>) -> Walk<Invoked> {
        let desc = &site.descriptor;
        if site.class == self.list {
            let registers = matches!(desc.args.len(), 2 | 3)
                && desc.args[0].is_class("java/lang/String")
                && desc.args.last().is_some_and(|last| self.is_entry_or_builder(last.base_name()));
            if registers {
                return self.register(&site);
            }
            let walk = walk_call(cx, self, &site.class, &site.name, &desc.raw, site.args)?;
            return Ok(Invoked {
                result: Some(walk.returned.map_or(Value::Opaque, |r| r.value)),
                ..Invoked::default()
            });
        }

        if Some(site.class.as_str()) == self.builder {
            let copied = match site.args.as_slice() {
                [source] if desc.args[0].is_class(self.entry) => source.value.as_object().map(|source| {
                    let mut copy = source.borrow().clone();
                    for key in IDENTITY_KEYS {
                        copy.remove(key);
                    }
                    copy
                }),
                _ => None,
            };
            return Ok(Invoked::value(Value::object(copied.unwrap_or_default())));
        }

        fallback_invoke(self, cx, site)
    }
}

impl DispatchHook for RegistryHook<'_> {
    fn on_new(&mut self, cx: &mut WalkContext<'_>, _position: u32, class: &str) -> Walk<Value> {
        Ok(self.allocation(cx.classes, class))
    }

    fn on_invoke(&mut self, cx: &mut WalkContext<'_>, site: InvokeSite<'_>) -> Walk<Invoked> {
        if site.is_static() {
            return self.static_call(cx, site);
        }
        if site.name == "hasNext" {
            // Iteration over the finished registry begins here.
            return Err(Halt::Stop);
        }

        let desc = &site.descriptor;
        let object = site.receiver.as_ref().and_then(|r| r.value.as_object()).cloned();
        if let Some(object) = &object {
            if site.name == "<init>" {
                let builder = desc
                    .args
                    .iter()
                    .position(|arg| self.builder.is_some_and(|b| arg.is_class(b)))
                    .and_then(|i| site.args[i].value.as_object());
                if let Some(builder) = builder.filter(|b| !Rc::ptr_eq(b, object)) {
                    let fields = builder.borrow().clone();
                    object.borrow_mut().extend(fields);
                }
                return Ok(Invoked::default());
            }

            let value = match site.args.as_slice() {
                [] => Value::expr("true"),
                [one] => one.value.clone(),
                many => Value::List(many.iter().map(|arg| arg.value.clone()).collect()),
            };
            object.borrow_mut().insert(site.name.clone(), value);
        }

        let returns = desc.returns.base_name();
        if desc.returns.dimensions() == 0 && self.is_entry_or_builder(returns) {
            return Ok(Invoked {
                result: site.receiver.map(|r| r.value),
                ..Invoked::default()
            });
        }
        if object.is_some() {
            return Ok(if desc.returns_void() {
                Invoked::default()
            } else {
                Invoked::value(Value::Opaque)
            });
        }
        fallback_invoke(self, cx, site)
    }

    fn on_get_field(&mut self, _cx: &mut WalkContext<'_>, access: &FieldAccess) -> Walk<Option<Value>> {
        if !access.is_static || access.class != self.list {
            return Ok(None);
        }
        Ok(self
            .fields
            .get(&access.name)
            .and_then(|text_id| self.entries.get(text_id))
            .map(|entry| Value::Object(Rc::clone(entry))))
    }

    fn on_put_field(&mut self, _cx: &mut WalkContext<'_>, access: &FieldAccess, value: &StackOperand) -> Walk<()> {
        let Some(entry) = value.value.as_object() else {
            return Ok(());
        };
        let mut entry = entry.borrow_mut();
        entry.insert("field".into(), Value::expr(&access.name));
        if let Some(text_id) = entry.get("text_id") {
            self.fields.insert(access.name.clone(), text_id.to_string());
        }
        Ok(())
    }

    fn on_invokedynamic(&mut self, cx: &mut WalkContext<'_>, info: Rc<InvokeDynamicInfo>) -> Walk<Value> {
        if let DynamicTarget::Lambda {
            ref_kind: RefKind::NewInvokeSpecial,
            class,
            ..
        } = &info.target
        {
            return Ok(self.allocation(cx.classes, class));
        }
        Ok(Value::Lambda(info))
    }
}

/// Walks the static initializer of the `registry.list` class and fills the
/// registry section with what it registers.
#[instrument(skip_all)]
pub fn act(extraction: &mut Extraction, classes: &dyn ClassSource, options: &ExtractOptions) -> Result<()> {
    let roles = &extraction.classes;
    let list = roles.require("registry.list")?;
    let entry = roles.require("registry.entry")?;
    let mut hook = RegistryHook::new(list, entry, roles.get("registry.builder"));

    let mut cache = SubcallCache::new();
    let thunks = ThunkTable::default();
    let mut cx = WalkContext::new(classes, &mut cache, &thunks, options);
    let walk = match walk_call(&mut cx, &mut hook, list, "<clinit>", "()V", Vec::new()) {
        Ok(walk) => walk.completion,
        // `<clinit>` runs one level down, so its stop arrives here.
        Err(Halt::Stop) => Completion::Stopped,
        Err(Halt::Fail(e)) => return Err(e),
    };
    debug!(entries = hook.ordered.len(), completion = ?walk, "registry walked");

    let section = &mut extraction.registry;
    section.entries = hook
        .entries
        .iter()
        .map(|(text_id, entry)| (text_id.clone(), Value::Object(Rc::clone(entry)).to_json()))
        .collect();
    section.ordered = hook.ordered;
    section.fields = hook.fields;
    Ok(())
}
