//! Recovers the write order of network packets from their serializer methods.
//!
//! A packet's write method is walked with `this` and a marker buffer value
//! ([`PACKETBUF_NAME`]). Calls on that marker become `write` operations;
//! calls that hand the buffer to other code are inlined.

use std::rc::Rc;

use tracing::{debug, instrument, warn};

use crate::classpath::{ClassSource, LoadedClass};
use crate::code_attribute::{Instruction, LocalAccess};
use crate::constant_info::resolve_ref;
use crate::error::{Error, Halt, Result, Walk};
use crate::options::ExtractOptions;
use crate::walk::descriptor::JvmType;
use crate::walk::hook::{fallback_invoke, DispatchHook, InvokeSite, Invoked, SpecialFields, ThunkTable};
use crate::walk::inline::{lambda_operations, sub_operations, SubcallCache};
use crate::walk::invokedynamic::InvokeDynamicInfo;
use crate::walk::machine::{interpret, MethodWalk, WalkContext};
use crate::walk::nest::format;
use crate::walk::operation::{OpKind, Operation, Position};
use crate::walk::value::{StackOperand, Value};

use super::{ClassRoles, Extraction};

/// Display value standing for the buffer being written to.
pub const PACKETBUF_NAME: &str = "packetbuffer";

const NETTY_BYTEBUF: &str = "io/netty/buffer/ByteBuf";
const NETTY_BYTEBUF_DESC: &str = "Lio/netty/buffer/ByteBuf;";

/// Type written by a Netty `ByteBuf` write method.
fn netty_write_type(name: &str) -> Option<&'static str> {
    Some(match name {
        "writeBoolean" => "boolean",
        "writeByte" => "byte",
        "writeBytes" => "byte[]",
        "writeChar" => "char",
        "writeDouble" => "double",
        "writeFloat" => "float",
        "writeInt" => "int",
        "writeLong" => "long",
        "writeShort" => "short",
        _ => return None,
    })
}

fn write(position: Position, ty: &str, field: impl std::fmt::Display) -> Operation {
    Operation::new(position, OpKind::Write)
        .with("type", ty)
        .with("field", field)
}

fn store(position: Position, ty: &str, var: &str, value: impl std::fmt::Display) -> Operation {
    Operation::new(position, OpKind::Store)
        .with("type", ty)
        .with("var", var)
        .with("value", value)
}

/// Reads an int literal as the walker prints it (`12`, `-1`, `0x7fff`).
fn parse_int_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn unexpected(site: &InvokeSite<'_>) -> Halt {
    Error::Hook(format!(
        "unexpected buffer call {}.{}{}",
        site.class, site.name, site.descriptor
    ))
    .into()
}

fn lambda_arg(site: &InvokeSite<'_>, index: usize) -> Walk<Rc<InvokeDynamicInfo>> {
    site.args
        .get(index)
        .and_then(|arg| arg.value.as_lambda())
        .cloned()
        .ok_or_else(|| {
            Error::Hook(format!(
                "argument {index} of {}.{} is not a lambda",
                site.class, site.name
            ))
            .into()
        })
}

fn int_arg(site: &InvokeSite<'_>, index: usize) -> Walk<i64> {
    let arg = &site.args[index];
    arg.value
        .as_expr()
        .and_then(parse_int_literal)
        .ok_or_else(|| Error::Hook(format!("{arg} is not an int literal")).into())
}

pub struct PacketHook<'r> {
    roles: &'r ClassRoles,
    buffer: String,
    position: Option<String>,
    assumed_position: Option<String>,
}

impl<'r> PacketHook<'r> {
    /// `assumed_position` carries a position class guessed by an earlier run.
    pub fn new(roles: &'r ClassRoles, assumed_position: Option<String>) -> Result<Self> {
        let buffer = roles.require("packet.packetbuffer")?.to_string();
        let position = roles.get("position").map(str::to_string).or_else(|| assumed_position.clone());
        Ok(PacketHook {
            roles,
            buffer,
            position,
            assumed_position,
        })
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn assumed_position(&self) -> Option<&str> {
        self.assumed_position.as_deref()
    }

    fn takes_buffer(&self, ty: &JvmType) -> bool {
        ty.is_class(&self.buffer) || ty.is_class(NETTY_BYTEBUF)
    }

    fn instance(site: &InvokeSite<'_>) -> StackOperand {
        site.receiver
            .clone()
            .unwrap_or_else(|| StackOperand::expr(PACKETBUF_NAME))
    }

    fn one_arg_call(&mut self, cx: &mut WalkContext<'_>, site: &InvokeSite<'_>) -> Walk<Vec<Operation>> {
        let pos = site.call_position();
        let ty = &site.descriptor.args[0];
        let arg = &site.args[0];

        if ty.dimensions() == 1 {
            let element = match ty.base_name() {
                "byte" => "byte[]",
                "int" => "varint[]",
                "long" => "long[]",
                other => return Err(Error::Hook(format!("unexpected array type {other}[]")).into()),
            };
            return Ok(vec![
                write(pos, "varint", format!("{arg}.length")),
                write(pos, element, arg),
            ]);
        }
        if ty.dimensions() != 0 {
            return Err(unexpected(site));
        }

        let class = ty.base_name();
        let simple = match class {
            "java/lang/String" => Some("string"),
            "java/util/UUID" => Some("uuid"),
            "int" => Some("varint"),
            "long" => Some("varlong"),
            "java/lang/Enum" => Some("enum"),
            _ => ["nbtcompound", "itemstack", "chatcomponent", "identifier"]
                .into_iter()
                .find(|role| self.roles.is(role, class)),
        };
        if let Some(kind) = simple {
            return Ok(vec![write(pos, kind, arg)]);
        }
        if class == "java/util/Date" {
            return Ok(vec![write(pos, "long", format!("{arg}.getTime()"))]);
        }

        match self.position.as_deref() {
            None => {
                debug!(class, "assuming this is the position class");
                self.position = Some(class.to_string());
                self.assumed_position = Some(class.to_string());
                return Ok(vec![write(pos, "position", arg)]);
            }
            Some(position) if position == class => return Ok(vec![write(pos, "position", arg)]),
            Some(_) => {}
        }

        debug!(method = %site.name, class, "inlining buffer call");
        sub_operations(
            cx,
            self,
            pos,
            &site.class,
            &site.name,
            &site.descriptor,
            vec![Self::instance(site), arg.clone()],
            &SpecialFields::new(),
        )
    }

    fn two_arg_call(&mut self, cx: &mut WalkContext<'_>, site: &InvokeSite<'_>) -> Walk<Vec<Operation>> {
        let pos = site.call_position();
        let (first, second) = (&site.descriptor.args[0], &site.descriptor.args[1]);
        let field = &site.args[0];

        if first.is_class("java/lang/String") && *second == JvmType::Int {
            return Ok(vec![write(pos, "string", field).with("length", int_arg(site, 1)?)]);
        }
        if first.is_class("com/mojang/serialization/Codec") {
            return Ok(vec![write(
                pos,
                "nbtcompound",
                format!("{}.encode({})", field, site.args[1]),
            )]);
        }
        if first.is_class("java/util/Collection") {
            let info = lambda_arg(site, 1)?;
            let mut operations = vec![
                write(pos, "varint", format!("{field}.size()")),
                store(pos, "Iterator", "it", format!("{field}.iterator()")),
                Operation::new(pos, OpKind::Loop).with("condition", "it.hasNext()"),
                store(pos, &info.last_arg_type().unwrap_or_default(), "itv", "it.next()"),
            ];
            operations.extend(lambda_operations(
                cx,
                self,
                pos,
                &info,
                vec![Self::instance(site), StackOperand::expr("itv")],
            )?);
            operations.push(Operation::new(pos.closing(1), OpKind::EndLoop));
            return Ok(operations);
        }
        let guard = if first.is_class("java/util/Optional") {
            Some((format!("{field}.isPresent()"), format!("{field}.get()")))
        } else if first.is_class("java/lang/Object") {
            Some((format!("{field} != null"), field.to_string()))
        } else {
            None
        };
        if let Some((condition, value)) = guard {
            let info = lambda_arg(site, 1)?;
            let mut operations = vec![
                write(pos, "boolean", &condition),
                Operation::new(pos, OpKind::If).with("condition", &condition),
            ];
            operations.extend(lambda_operations(
                cx,
                self,
                pos,
                &info,
                vec![Self::instance(site), StackOperand::expr(value)],
            )?);
            operations.push(Operation::new(pos.closing(1), OpKind::EndIf));
            return Ok(operations);
        }
        if self.roles.get("idmap").is_some_and(|idmap| first.is_class(idmap)) {
            return Ok(vec![write(
                pos,
                "varint",
                format!("{}.getId({})", field, site.args[1]),
            )]);
        }
        if first.is_class("java/util/BitSet") {
            return Ok(vec![write(pos, "bitset", field).with("length", int_arg(site, 1)?)]);
        }
        if first.is_class("java/util/EnumSet") {
            let enum_class = site.args[1]
                .value
                .as_expr()
                .ok_or_else(|| Error::Hook(format!("{} is not a class literal", site.args[1])))?;
            let constants = cx.classes.load(enum_class)?.enum_constants().len();
            return Ok(vec![write(pos, "bitset", field).with("length", constants)]);
        }
        Err(unexpected(site))
    }

    fn three_arg_call(&mut self, cx: &mut WalkContext<'_>, site: &InvokeSite<'_>) -> Walk<Vec<Operation>> {
        let pos = site.call_position();
        let first = &site.descriptor.args[0];
        let field = &site.args[0];

        if first.is_class("java/util/Map") {
            let key = lambda_arg(site, 1)?;
            let value = lambda_arg(site, 2)?;
            let entry = format!(
                "Map.Entry<{}, {}>",
                key.last_arg_type().unwrap_or_default(),
                value.last_arg_type().unwrap_or_default()
            );
            let mut operations = vec![
                write(pos, "varint", format!("{field}.size()")),
                store(pos, "Iterator", "it", format!("{field}.iterator()")),
                Operation::new(pos, OpKind::Loop).with("condition", "it.hasNext()"),
                store(pos, &entry, "itv", "it.next()"),
            ];
            let key_operations = lambda_operations(
                cx,
                self,
                pos,
                &key,
                vec![Self::instance(site), StackOperand::expr("itv.getKey()")],
            )?;
            // The value writes continue where the key writes stopped.
            let value_base = pos.step(key_operations.len() as u32);
            operations.extend(key_operations);
            operations.extend(lambda_operations(
                cx,
                self,
                value_base,
                &value,
                vec![Self::instance(site), StackOperand::expr("itv.getValue()")],
            )?);
            operations.push(Operation::new(pos.closing(1), OpKind::EndLoop));
            return Ok(operations);
        }
        if first.is_class("com/mojang/datafixers/util/Either") {
            let left = lambda_arg(site, 1)?;
            let right = lambda_arg(site, 2)?;
            let condition = format!("{field}.isLeft()");
            let mut operations = vec![
                write(pos, "boolean", &condition),
                Operation::new(pos, OpKind::If).with("condition", &condition),
            ];
            operations.extend(lambda_operations(
                cx,
                self,
                pos,
                &left,
                vec![Self::instance(site), StackOperand::expr(format!("{field}.left()"))],
            )?);
            operations.push(Operation::new(pos.closing(1), OpKind::Else));
            let right_base = pos.next_address();
            operations.extend(lambda_operations(
                cx,
                self,
                right_base,
                &right,
                vec![Self::instance(site), StackOperand::expr(format!("{field}.right()"))],
            )?);
            operations.push(Operation::new(right_base.closing(1), OpKind::EndIf));
            return Ok(operations);
        }
        if self.roles.get("idmap").is_some_and(|idmap| first.is_class(idmap)) {
            let key = &site.args[1];
            let consumer = lambda_arg(site, 2)?;
            let direct = pos.next_address();
            let mut operations = vec![
                Operation::new(pos, OpKind::Switch).with("field", format!("{key}.getKind()")),
                Operation::new(pos.step(1), OpKind::Case).with("value", "Kind.REFERENCE"),
                write(pos.step(2), "varint", format!("{field}.getId({key}) + 1")),
                Operation::new(pos.step(3), OpKind::Break),
                Operation::new(pos.closing(2), OpKind::Case).with("value", "Kind.DIRECT"),
                write(pos.closing(1), "varint", "0"),
            ];
            operations.extend(lambda_operations(
                cx,
                self,
                direct,
                &consumer,
                vec![Self::instance(site), key.clone()],
            )?);
            operations.push(Operation::new(direct.closing(2), OpKind::Break));
            operations.push(Operation::new(direct.closing(1), OpKind::EndSwitch));
            return Ok(operations);
        }
        if first.is_class("com/mojang/serialization/DynamicOps")
            && site.descriptor.args[1].is_class("com/mojang/serialization/Codec")
        {
            return Ok(vec![write(
                pos,
                "nbtcompound",
                format!("{}.encode({}, {})", site.args[1], field, site.args[2]),
            )]);
        }
        Err(unexpected(site))
    }

    fn for_each(&mut self, cx: &mut WalkContext<'_>, site: &InvokeSite<'_>) -> Walk<Vec<Operation>> {
        let pos = site.call_position();
        if site.args.len() != 1 || site.is_static() {
            return Err(unexpected(site));
        }
        if !site.descriptor.args[0].base_name().contains("Consumer") {
            return Err(unexpected(site));
        }
        let consumer = lambda_arg(site, 0)?;
        let mut operations = vec![
            store(pos, "Iterator", "it", format!("{}.iterator()", site.object())),
            Operation::new(pos, OpKind::Loop).with("condition", "it.hasNext()"),
            store(pos, &consumer.last_arg_type().unwrap_or_default(), "itv", "it.next()"),
        ];
        operations.extend(lambda_operations(
            cx,
            self,
            pos,
            &consumer,
            vec![StackOperand::expr("itv")],
        )?);
        operations.push(Operation::new(pos.closing(1), OpKind::EndLoop));
        Ok(operations)
    }
}

impl DispatchHook for PacketHook<'_> {
    fn on_invoke(&mut self, cx: &mut WalkContext<'_>, site: InvokeSite<'_>) -> Walk<Invoked> {
        if let Some(ty) = netty_write_type(&site.name) {
            let receiver = site.receiver.as_ref().ok_or_else(|| unexpected(&site))?;
            let operation = match site.args.as_slice() {
                [a, b, c] if site.name == "writeBytes" => {
                    write(site.call_position(), ty, format!("arrayRange({a}, {b}, {c})"))
                }
                [value] => write(site.call_position(), ty, value),
                _ => return Err(unexpected(&site)),
            };
            return Ok(Invoked {
                result: Some(receiver.value.clone()),
                operations: vec![operation],
                initialized: None,
            });
        }

        let on_buffer = site
            .receiver
            .as_ref()
            .and_then(|r| r.value.as_expr())
            .is_some_and(|r| r == PACKETBUF_NAME);
        if site.name.chars().count() == 1 && on_buffer {
            let operations = match site.args.len() {
                1 => self.one_arg_call(cx, &site)?,
                2 => self.two_arg_call(cx, &site)?,
                3 => self.three_arg_call(cx, &site)?,
                _ => return Err(unexpected(&site)),
            };
            let result = if site.descriptor.returns.is_class(&self.buffer) {
                site.receiver.map(|r| r.value)
            } else if !site.descriptor.returns_void() {
                debug!(method = %site.name, "buffer method returning something other than the buffer");
                Some(Value::Opaque)
            } else {
                None
            };
            return Ok(Invoked {
                result,
                operations,
                initialized: None,
            });
        }

        if site.name == "forEach" {
            return self.for_each(cx, &site).map(Invoked::operations);
        }

        let calls_lambda = site
            .receiver
            .as_ref()
            .and_then(|r| r.value.as_lambda())
            .is_some_and(|info| info.dynamic_name == site.name);
        if site.name == "<init>" || calls_lambda || !site.descriptor.returns_void() {
            return fallback_invoke(self, cx, site);
        }

        if site.descriptor.args.iter().any(|arg| self.takes_buffer(arg)) {
            if self.roles.is("metadata", &site.class) {
                let field = match &site.receiver {
                    Some(receiver) => receiver.clone(),
                    None => site.args.first().cloned().ok_or_else(|| unexpected(&site))?,
                };
                return Ok(Invoked::operations(vec![write(
                    site.call_position(),
                    "metadata",
                    field,
                )]));
            }
            let operations = sub_operations(
                cx,
                self,
                site.call_position(),
                &site.class,
                &site.name,
                &site.descriptor,
                site.receiver_and_args(),
                site.special_fields,
            )?;
            return Ok(Invoked::operations(operations));
        }

        fallback_invoke(self, cx, site)
    }
}

/// Finds buffer methods that only forward to a Netty `ByteBuf` method and
/// return the buffer, so calls to them can be treated as the Netty call.
pub fn list_thunks(classes: &dyn ClassSource, buffer: &str) -> Result<ThunkTable> {
    let class = classes.load(buffer)?;
    let pool = &class.constants;
    let returns = format!("L{buffer};");
    let mut thunks = ThunkTable::new(buffer);

    for method in &class.methods {
        if method.descriptor.returns.to_descriptor() != returns {
            continue;
        }
        let code = method.instructions();
        let n = code.len();
        if n < 6 {
            continue;
        }
        if code[0].instruction.local_slot() != Some((LocalAccess::Load, 0)) {
            continue;
        }
        let field_ok = match code[1].instruction {
            Instruction::Getfield(index) => resolve_ref(pool, index).is_some_and(|(_, _, d)| d == NETTY_BYTEBUF_DESC),
            _ => false,
        };
        let target = match code[n - 4].instruction {
            Instruction::Invokevirtual(index) => {
                resolve_ref(pool, index).filter(|(_, _, d)| d.ends_with(NETTY_BYTEBUF_DESC))
            }
            _ => None,
        };
        let tail_ok = matches!(code[n - 3].instruction, Instruction::Pop)
            && code[n - 2].instruction.local_slot() == Some((LocalAccess::Load, 0))
            && matches!(code[n - 1].instruction, Instruction::Areturn);
        let loads_ok = code[2..n - 4]
            .iter()
            .enumerate()
            .all(|(i, ins)| ins.instruction.local_slot() == Some((LocalAccess::Load, i as u16 + 1)));

        if let (true, Some((_, name, desc)), true, true) = (field_ok, target, tail_ok, loads_ok) {
            thunks.insert(
                (method.name.clone(), method.descriptor.raw.clone()),
                (name.to_string(), desc.to_string()),
            );
        }
    }
    debug!(buffer, thunks = thunks.len(), "detected buffer thunks");
    Ok(thunks)
}

/// Index of the write method of `class` taking `arg`: the second of two
/// overloads (the first is a bridge), or the only one.
fn pick_write_method(class: &LoadedClass, arg: &str) -> Result<Option<usize>> {
    let args = format!("(L{arg};)");
    let found: Vec<usize> = class
        .methods
        .iter()
        .enumerate()
        .filter(|(_, m)| m.name != "<init>" && m.descriptor.returns_void() && m.descriptor.args_descriptor() == args)
        .map(|(i, _)| i)
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        [_, second] => Ok(Some(*second)),
        more => Err(Error::Resolution(format!(
            "{} has {} methods taking {arg}",
            class.name,
            more.len()
        ))),
    }
}

/// Finds the method of `class_name` (or a superclass) that writes it to the buffer.
fn find_write_method(classes: &dyn ClassSource, class_name: &str, buffer: &str) -> Result<(Rc<LoadedClass>, usize)> {
    let class = classes.load(class_name)?;
    if let Some(index) = pick_write_method(&class, buffer)? {
        return Ok((class, index));
    }

    // Some packets take a subclass of the buffer, named by a one-argument constructor.
    let subclasses: Vec<String> = class
        .methods
        .iter()
        .filter(|m| m.name == "<init>" && m.descriptor.args.len() == 1)
        .filter_map(|m| match &m.descriptor.args[0] {
            JvmType::Reference(arg) => Some(arg.clone()),
            _ => None,
        })
        .collect();
    for arg in subclasses {
        if classes.load(&arg)?.super_name.as_deref() != Some(buffer) {
            continue;
        }
        if let Some(index) = pick_write_method(&class, &arg)? {
            return Ok((class, index));
        }
    }

    match class.super_name.as_deref() {
        Some(parent) if parent != "java/lang/Object" && parent != "java/lang/Record" => {
            find_write_method(classes, parent, buffer)
        }
        _ => Err(Error::Resolution(format!("no write method in {class_name} or its superclasses"))),
    }
}

/// Walks the write method of the packet class `class_name`.
pub fn class_operations(
    cx: &mut WalkContext<'_>,
    hook: &mut PacketHook<'_>,
    class_name: &str,
) -> Walk<MethodWalk> {
    let (class, index) = find_write_method(cx.classes, class_name, hook.buffer())?;
    let method = &class.methods[index];
    if method.is_static() || method.is_abstract() {
        return Err(Error::Resolution(format!(
            "write method {}.{}{} is static or abstract",
            class.name, method.name, method.descriptor
        ))
        .into());
    }
    interpret(
        cx,
        &class,
        method,
        vec![StackOperand::expr("this"), StackOperand::expr(PACKETBUF_NAME)],
        hook,
        &SpecialFields::new(),
    )
}

fn dump_operations(operations: &[Operation]) {
    debug!(
        operations = %serde_json::to_string_pretty(operations).unwrap_or_default(),
        "raw operations"
    );
}

/// Decodes every packet registered in `extraction`. A packet that fails is
/// logged and left without instructions.
#[instrument(skip_all, fields(packets = extraction.packets.packets.len()))]
pub fn act(extraction: &mut Extraction, classes: &dyn ClassSource, options: &ExtractOptions) -> Result<()> {
    let roles = &extraction.classes;
    let section = &mut extraction.packets;
    let buffer = roles.require("packet.packetbuffer")?;
    let thunks = if options.detect_thunks {
        list_thunks(classes, buffer)?
    } else {
        ThunkTable::new(buffer)
    };
    let mut cache = SubcallCache::new();
    let mut hook = PacketHook::new(roles, section.assumed_position_class.clone())?;

    for (key, packet) in section.packets.iter_mut() {
        let class = packet.class.strip_suffix(".class").unwrap_or(&packet.class).to_string();
        let mut cx = WalkContext::new(classes, &mut cache, &thunks, options);
        let walk = match class_operations(&mut cx, &mut hook, &class) {
            Ok(walk) => walk,
            Err(halt) => {
                let reason = halt.into_error().map(|e| e.to_string()).unwrap_or_else(|| "stopped".into());
                warn!(packet = %key, class = %class, error = %reason, "failed to decode packet instructions");
                if options.dump_failed_operations {
                    dump_operations(&cx.failed_operations);
                }
                continue;
            }
        };
        match format(&walk.operations) {
            Ok(mut formatted) => packet.instructions = Some(formatted["instructions"].take()),
            Err(e) => {
                warn!(packet = %key, class = %class, error = %e, "failed to nest packet instructions");
                if options.dump_failed_operations {
                    dump_operations(&walk.operations);
                }
            }
        }
    }

    section.assumed_position_class = hook.assumed_position().map(str::to_string);
    debug!(hits = cache.hits(), misses = cache.misses(), "packet walks done");
    Ok(())
}
