//! The symbolic stack machine.
//!
//! A method is replayed instruction by instruction against an abstract
//! operand stack. Values are display expressions (or hook-built objects),
//! and every side effect is recorded as an [`Operation`].

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::classpath::{ClassSource, LoadedClass, LoadedMethod};
use crate::code_attribute::{AddressedInstruction, Instruction, LocalAccess, WideInstruction};
use crate::error::{Error, Halt, Result, Walk};
use crate::options::ExtractOptions;

use super::descriptor::{display_class_name, parse_type_descriptor, MethodDescriptor};
use super::flow::{classify_goto, GotoKind};
use super::hook::{DispatchHook, FieldAccess, InvokeKind, InvokeSite, SpecialFields, ThunkTable};
use super::inline::SubcallCache;
use super::invokedynamic::InvokeDynamicInfo;
use super::operand::InstructionField;
use super::operation::{OpKind, Operation, Position};
use super::value::{Category, StackOperand, Value};

/// Everything a walk shares with the walks it starts.
pub struct WalkContext<'a> {
    pub classes: &'a dyn ClassSource,
    pub cache: &'a mut SubcallCache,
    pub thunks: &'a ThunkTable,
    pub options: &'a ExtractOptions,
    /// Number of enclosing walks; 0 for a top-level walk.
    pub depth: usize,
    /// Operations the last top-level walk had gathered when it failed.
    pub failed_operations: Vec<Operation>,
}

impl<'a> WalkContext<'a> {
    pub fn new(
        classes: &'a dyn ClassSource,
        cache: &'a mut SubcallCache,
        thunks: &'a ThunkTable,
        options: &'a ExtractOptions,
    ) -> Self {
        WalkContext {
            classes,
            cache,
            thunks,
            options,
            depth: 0,
            failed_operations: Vec::new(),
        }
    }

    /// Runs `f` one level deeper, failing once `max_inline_depth` is exceeded.
    pub fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Walk<T>) -> Walk<T> {
        if self.depth >= self.options.max_inline_depth {
            return Err(Error::shape(
                0,
                format!("inlining deeper than {} calls", self.options.max_inline_depth),
            )
            .into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Finished,
    /// A hook asked to stop; the operations are those seen until then.
    Stopped,
}

#[derive(Debug)]
pub struct MethodWalk {
    pub operations: Vec<Operation>,
    /// Value of the first `*return` reached.
    pub returned: Option<StackOperand>,
    pub completion: Completion,
}

/// Walks `method` of `class`.
///
/// `args` binds the parameters, `this` first for instance methods. A stop
/// requested by the hook ends a top-level walk normally; nested walks pass
/// it up to the walk that started them.
#[instrument(level = "debug", skip_all, fields(class = %class.name, method = %method.name))]
pub fn interpret<H: DispatchHook + ?Sized>(
    cx: &mut WalkContext<'_>,
    class: &LoadedClass,
    method: &LoadedMethod,
    args: Vec<StackOperand>,
    hook: &mut H,
    special_fields: &SpecialFields,
) -> Walk<MethodWalk> {
    if cx.depth == 0 {
        cx.failed_operations.clear();
    }
    let code = method.code.as_deref().ok_or_else(|| {
        Error::Resolution(format!("{}.{}{} has no code", class.name, method.name, method.descriptor))
    })?;
    if let Some(ins) = code
        .iter()
        .find(|ins| matches!(ins.instruction, Instruction::Lookupswitch { .. }))
    {
        return Err(Error::Unsupported {
            mnemonic: "lookupswitch",
            position: ins.address,
        }
        .into());
    }

    let mut frame = Frame::new(class, method, args)?;
    match frame.run(cx, code, hook, special_fields) {
        Ok(()) => Ok(frame.finish(Completion::Finished)),
        Err(Halt::Stop) if cx.depth == 0 => {
            debug!(operations = frame.operations.len(), "walk stopped by hook");
            Ok(frame.finish(Completion::Stopped))
        }
        Err(halt) => {
            if cx.depth == 0 {
                cx.failed_operations = frame.operations;
            }
            Err(halt)
        }
    }
}

struct Frame<'c> {
    class: &'c LoadedClass,
    stack: Vec<StackOperand>,
    locals: HashMap<u16, StackOperand>,
    /// Display names of the parameter slots.
    names: HashMap<u16, String>,
    operations: Vec<Operation>,
    returned: Option<StackOperand>,
    address: u32,
    skip_until: Option<u32>,
    ternary_at: Option<u32>,
    last_condition: Option<String>,
}

impl<'c> Frame<'c> {
    fn new(class: &'c LoadedClass, method: &LoadedMethod, args: Vec<StackOperand>) -> Result<Self> {
        let expected = method.descriptor.args.len() + usize::from(!method.is_static());
        if args.len() != expected {
            return Err(Error::shape(
                0,
                format!(
                    "{}.{}{} takes {expected} argument slots, got {}",
                    class.name,
                    method.name,
                    method.descriptor,
                    args.len()
                ),
            ));
        }

        let mut frame = Frame {
            class,
            stack: Vec::new(),
            locals: HashMap::new(),
            names: HashMap::new(),
            operations: Vec::new(),
            returned: None,
            address: 0,
            skip_until: None,
            ternary_at: None,
            last_condition: None,
        };
        let mut args = args.into_iter();
        let mut slot = 0u16;
        if !method.is_static() {
            if let Some(this) = args.next() {
                frame.bind(slot, this);
                slot += 1;
            }
        }
        for (ty, mut arg) in method.descriptor.args.iter().zip(args) {
            arg.category = Category::of(ty);
            let width = arg.category.width();
            frame.bind(slot, arg);
            slot += width;
        }
        Ok(frame)
    }

    fn bind(&mut self, slot: u16, arg: StackOperand) {
        self.names.insert(slot, arg.to_string());
        self.locals.insert(slot, arg);
    }

    fn finish(self, completion: Completion) -> MethodWalk {
        MethodWalk {
            operations: self.operations,
            returned: self.returned,
            completion,
        }
    }

    fn here(&self) -> Position {
        Position::at(self.address)
    }

    fn shape(&self, message: impl Into<String>) -> Error {
        Error::shape(self.address, message)
    }

    fn pop(&mut self) -> Result<StackOperand> {
        self.stack.pop().ok_or_else(|| self.shape("pop from an empty stack"))
    }

    /// The `depth`-th value from the top, 1 being the top.
    fn peek(&self, depth: usize) -> Result<&StackOperand> {
        self.stack
            .len()
            .checked_sub(depth)
            .and_then(|i| self.stack.get(i))
            .ok_or_else(|| self.shape(format!("stack has fewer than {depth} values")))
    }

    fn push(&mut self, value: StackOperand) {
        self.stack.push(value);
    }

    fn push_expr(&mut self, text: String, category: Category) {
        self.stack.push(StackOperand::new(Value::Expr(text), category));
    }

    /// Inserts a copy of the `from`-th value (1 = top) `below` values down.
    fn dup_into(&mut self, from: usize, below: usize) -> Result<()> {
        let value = self.peek(from)?.clone();
        let index = self
            .stack
            .len()
            .checked_sub(below)
            .ok_or_else(|| self.shape("dup below the bottom of the stack"))?;
        self.stack.insert(index, value);
        Ok(())
    }

    fn slot_name(&self, slot: u16) -> String {
        self.names
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| format!("var{slot}"))
    }

    fn binary(&mut self, operator: &str, category: Category) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.push_expr(format!("({left} {operator} {right})"), category);
        Ok(())
    }

    fn unary(&mut self, prefix: &str, category: Category) -> Result<()> {
        let value = self.pop()?;
        self.push_expr(format!("({prefix}{value})"), category);
        Ok(())
    }

    fn compare(&mut self, note: &str) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.push_expr(format!("compare({left}, {right}{note})"), Category::Single);
        Ok(())
    }

    fn array_load(&mut self, category: Category) -> Result<()> {
        let index = self.pop()?;
        let array = self.pop()?;
        self.push_expr(format!("{array}[{index}]"), category);
        Ok(())
    }

    fn load(&mut self, slot: u16, category: Category) {
        let value = self
            .locals
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| StackOperand::new(Value::Expr(format!("var{slot}")), category));
        self.push(value);
    }

    fn store(&mut self, slot: u16, mnemonic: &str) -> Result<()> {
        let value = self.pop()?;
        let var = self.slot_name(slot);
        self.operations.push(
            Operation::new(self.here(), OpKind::Store)
                .with("type", type_name(mnemonic))
                .with("var", &var)
                .with("value", &value),
        );
        let bound = match value.value {
            Value::Expr(_) => StackOperand::new(Value::Expr(var), value.category),
            _ => value,
        };
        self.locals.insert(slot, bound);
        Ok(())
    }

    fn array_store(&mut self, mnemonic: &str) -> Result<()> {
        let value = self.pop()?;
        let index = self.pop()?;
        let array = self.pop()?;
        self.operations.push(
            Operation::new(self.here(), OpKind::ArrayStore)
                .with("type", type_name(mnemonic))
                .with("index", index)
                .with("var", array)
                .with("value", value),
        );
        Ok(())
    }

    fn branch(&mut self, instruction: &Instruction, target: u32) -> Result<()> {
        use Instruction::*;
        let (left, right, zero) = match instruction {
            IfIcmpeq(_) | IfIcmpne(_) | IfIcmplt(_) | IfIcmpge(_) | IfIcmpgt(_) | IfIcmple(_)
            | IfAcmpeq(_) | IfAcmpne(_) => {
                let right = self.pop()?;
                (self.pop()?.to_string(), right.to_string(), false)
            }
            Ifnull(_) | Ifnonnull(_) => (self.pop()?.to_string(), "null".to_string(), false),
            _ => (self.pop()?.to_string(), "0".to_string(), true),
        };
        // The guarded code runs when the jump is not taken.
        let comparison = match instruction {
            Ifeq(_) | IfIcmpeq(_) | IfAcmpeq(_) | Ifnull(_) => "!=",
            Ifne(_) | IfIcmpne(_) | IfAcmpne(_) | Ifnonnull(_) => "==",
            Iflt(_) | IfIcmplt(_) => ">=",
            Ifge(_) | IfIcmpge(_) => "<",
            Ifgt(_) | IfIcmpgt(_) => "<=",
            Ifle(_) | IfIcmple(_) => ">",
            other => {
                return Err(Error::Unsupported {
                    mnemonic: other.mnemonic(),
                    position: self.address,
                })
            }
        };
        let condition = if zero && comparison == "!=" {
            left
        } else {
            format!("{left} {comparison} {right}")
        };

        self.operations
            .push(Operation::new(self.here(), OpKind::If).with("condition", &condition));
        self.operations
            .push(Operation::new(Position::at(target), OpKind::EndIf));
        // A nested if means the pending else cannot be a conditional expression.
        self.ternary_at = None;
        self.last_condition = Some(condition);
        Ok(())
    }

    fn collapse_ternary(&mut self) -> Result<()> {
        let n = self.operations.len();
        let tail: Vec<OpKind> = self.operations[n.saturating_sub(3)..]
            .iter()
            .map(|op| op.kind)
            .collect();
        if tail != [OpKind::If, OpKind::Else, OpKind::EndIf] {
            return Err(self.shape(format!("conditional expression ends after {tail:?}")));
        }
        self.operations.truncate(n - 3);
        let first = self.pop()?;
        let second = self.pop()?;
        let condition = self
            .last_condition
            .take()
            .ok_or_else(|| self.shape("conditional expression without a condition"))?;
        self.push_expr(
            format!("(({condition}) ? {second} : {first})"),
            first.category,
        );
        self.ternary_at = None;
        Ok(())
    }

    /// Whether a block closes after the current instruction, meaning a
    /// return here only ends one branch.
    fn inside_block(&self) -> bool {
        let here = self.here();
        self.operations.iter().any(|op| {
            op.position > here
                && matches!(
                    op.kind,
                    OpKind::EndIf | OpKind::Else | OpKind::EndLoop | OpKind::EndSwitch | OpKind::Case
                )
        })
    }

    fn run<H: DispatchHook + ?Sized>(
        &mut self,
        cx: &mut WalkContext<'_>,
        code: &[AddressedInstruction],
        hook: &mut H,
        special_fields: &SpecialFields,
    ) -> Walk<()> {
        let class = self.class;
        for ins in code {
            self.address = ins.address;
            if let Some(until) = self.skip_until {
                if ins.address != until {
                    continue;
                }
                self.skip_until = None;
            }
            if self.ternary_at == Some(ins.address) {
                self.collapse_ternary()?;
            }

            let fields = InstructionField::operands(ins, &class.constants)?;
            let operand = |i: usize| {
                fields
                    .get(i)
                    .copied()
                    .ok_or_else(|| Error::shape(ins.address, "missing operand"))
            };
            let mnemonic = ins.instruction.mnemonic();

            if let Some((access, slot)) = ins.instruction.local_slot() {
                match access {
                    LocalAccess::Load => self.load(slot, category_of(mnemonic)),
                    LocalAccess::Store => self.store(slot, mnemonic)?,
                }
                continue;
            }

            use Instruction::*;
            match &ins.instruction {
                Nop => {}
                Aconstnull => self.push_expr("null".into(), Category::Single),
                Iconstm1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 | Bipush(_)
                | Sipush(_) => self.push_expr(int_literal(operand(0)?.value()), Category::Single),
                Lconst0 => self.push_expr("0".into(), Category::Double),
                Lconst1 => self.push_expr("1".into(), Category::Double),
                Fconst0 => self.push_expr("0.0f".into(), Category::Single),
                Fconst1 => self.push_expr("1.0f".into(), Category::Single),
                Fconst2 => self.push_expr("2.0f".into(), Category::Single),
                Dconst0 => self.push_expr("0.0".into(), Category::Double),
                Dconst1 => self.push_expr("1.0".into(), Category::Double),
                Ldc(_) | LdcW(_) => self.push_expr(operand(0)?.name()?, Category::Single),
                Ldc2W(_) => self.push_expr(operand(0)?.name()?, Category::Double),

                Iaload | Faload | Aaload | Baload | Caload | Saload => self.array_load(Category::Single)?,
                Laload | Daload => self.array_load(Category::Double)?,
                Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
                    self.array_store(mnemonic)?
                }

                Pop => {
                    self.pop()?;
                }
                Pop2 => {
                    if !self.pop()?.is_double() {
                        self.pop()?;
                    }
                }
                Dup => self.dup_into(1, 0)?,
                Dupx1 => self.dup_into(1, 2)?,
                Dupx2 => {
                    let below = if self.peek(2)?.is_double() { 2 } else { 3 };
                    self.dup_into(1, below)?
                }
                Dup2 => {
                    if self.peek(1)?.is_double() {
                        self.dup_into(1, 0)?
                    } else {
                        self.dup_into(2, 0)?;
                        self.dup_into(2, 0)?
                    }
                }
                Dup2x1 => {
                    if self.peek(1)?.is_double() {
                        self.dup_into(1, 2)?
                    } else {
                        self.dup_into(2, 3)?;
                        self.dup_into(1, 3)?
                    }
                }
                Dup2x2 => {
                    if self.peek(1)?.is_double() {
                        let below = if self.peek(2)?.is_double() { 2 } else { 3 };
                        self.dup_into(1, below)?
                    } else {
                        let below = if self.peek(3)?.is_double() { 3 } else { 4 };
                        self.dup_into(2, below)?;
                        let below = if self.peek(3)?.is_double() { 3 } else { 4 };
                        self.dup_into(1, below)?
                    }
                }
                Swap => {
                    let top = self.pop()?;
                    let under = self.pop()?;
                    self.push(top);
                    self.push(under);
                }

                Iadd | Fadd => self.binary("+", Category::Single)?,
                Ladd | Dadd => self.binary("+", Category::Double)?,
                Isub | Fsub => self.binary("-", Category::Single)?,
                Lsub | Dsub => self.binary("-", Category::Double)?,
                Imul | Fmul => self.binary("*", Category::Single)?,
                Lmul | Dmul => self.binary("*", Category::Double)?,
                Idiv | Fdiv => self.binary("/", Category::Single)?,
                Ldiv | Ddiv => self.binary("/", Category::Double)?,
                Irem | Frem => self.binary("%", Category::Single)?,
                Lrem | Drem => self.binary("%", Category::Double)?,
                Ineg | Fneg => self.unary("-", Category::Single)?,
                Lneg | Dneg => self.unary("-", Category::Double)?,
                Ishl => self.binary("<<", Category::Single)?,
                Lshl => self.binary("<<", Category::Double)?,
                Ishr => self.binary(">>", Category::Single)?,
                Lshr => self.binary(">>", Category::Double)?,
                Iushr => self.binary(">>>", Category::Single)?,
                Lushr => self.binary(">>>", Category::Double)?,
                Iand => self.binary("&", Category::Single)?,
                Land => self.binary("&", Category::Double)?,
                Ior => self.binary("|", Category::Single)?,
                Lor => self.binary("|", Category::Double)?,
                Ixor => self.binary("^", Category::Single)?,
                Lxor => self.binary("^", Category::Double)?,
                I2l | F2l | D2l => self.unary("(long)", Category::Double)?,
                I2f | L2f | D2f => self.unary("(float)", Category::Single)?,
                I2d | L2d | F2d => self.unary("(double)", Category::Double)?,
                L2i | F2i | D2i => self.unary("(int)", Category::Single)?,
                I2b => self.unary("(byte)", Category::Single)?,
                I2c => self.unary("(char)", Category::Single)?,
                I2s => self.unary("(short)", Category::Single)?,
                Lcmp => self.compare("")?,
                Fcmpg | Dcmpg => self.compare(" /*, NaN -> 1 */")?,
                Fcmpl | Dcmpl => self.compare(" /*, NaN -> -1 */")?,

                Iinc { .. } | Wide(WideInstruction::Iinc { .. }) => {
                    let slot = operand(0)?.value() as u16;
                    self.operations.push(
                        Operation::new(self.here(), OpKind::Increment)
                            .with("field", self.slot_name(slot))
                            .with("amount", operand(1)?.value()),
                    );
                }

                Ifeq(_) | Ifne(_) | Iflt(_) | Ifge(_) | Ifgt(_) | Ifle(_) | IfIcmpeq(_) | IfIcmpne(_)
                | IfIcmplt(_) | IfIcmpge(_) | IfIcmpgt(_) | IfIcmple(_) | IfAcmpeq(_) | IfAcmpne(_)
                | Ifnull(_) | Ifnonnull(_) => {
                    let target = operand(0)?.target()?;
                    self.branch(&ins.instruction, target)?
                }
                Goto(_) | GotoW(_) => {
                    let target = operand(0)?.target()?;
                    match classify_goto(&mut self.operations, ins.address, target, self.stack.len())? {
                        GotoKind::Else { ternary: true } => self.ternary_at = Some(target),
                        GotoKind::Skip => self.skip_until = Some(target),
                        GotoKind::Else { ternary: false } | GotoKind::Break | GotoKind::Loop => {}
                    }
                }
                Tableswitch { .. } => {
                    let field = self.pop()?;
                    self.operations
                        .push(Operation::new(self.here(), OpKind::Switch).with("field", field));
                    let low = operand(1)?.value();
                    for (i, case) in fields.iter().skip(3).enumerate() {
                        self.operations.push(
                            Operation::new(Position::at(case.target()?), OpKind::Case)
                                .with("value", low + i as i64),
                        );
                    }
                    self.operations
                        .push(Operation::new(Position::at(operand(0)?.target()?), OpKind::EndSwitch));
                }

                Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => {
                    if !matches!(ins.instruction, Return) {
                        let value = self.pop()?;
                        self.returned.get_or_insert(value);
                    }
                    if !self.inside_block() {
                        return Ok(());
                    }
                }

                Getstatic(_) => {
                    let field = operand(0)?;
                    let access = FieldAccess {
                        position: ins.address,
                        is_static: true,
                        class: field.class()?.to_string(),
                        name: field.name()?,
                        descriptor: field.descriptor()?.to_string(),
                        object: None,
                    };
                    let category = Category::of(&field.field_type()?);
                    match hook.on_get_field(cx, &access)? {
                        Some(value) => self.push(StackOperand::new(value, category)),
                        None => self.push_expr(format!("{}.{}", field.classname()?, access.name), category),
                    }
                }
                Getfield(_) => {
                    let field = operand(0)?;
                    let name = field.name()?;
                    let category = Category::of(&field.field_type()?);
                    if field.class()? == class.name {
                        if let Some(special) = special_fields.get(&name) {
                            self.pop()?;
                            self.push(special.clone());
                            continue;
                        }
                    }
                    let object = self.pop()?;
                    let access = FieldAccess {
                        position: ins.address,
                        is_static: false,
                        class: field.class()?.to_string(),
                        name,
                        descriptor: field.descriptor()?.to_string(),
                        object: Some(object.clone()),
                    };
                    match hook.on_get_field(cx, &access)? {
                        Some(value) => self.push(StackOperand::new(value, category)),
                        None => self.push_expr(format!("{}.{}", object, access.name), category),
                    }
                }
                Putfield(_) => {
                    let field = operand(0)?;
                    let value = self.pop()?;
                    let object = self.pop()?;
                    let name = field.name()?;
                    self.operations.push(
                        Operation::new(self.here(), OpKind::PutField)
                            .with("field", &name)
                            .with("obj", &object)
                            .with("value", &value),
                    );
                    let access = FieldAccess {
                        position: ins.address,
                        is_static: false,
                        class: field.class()?.to_string(),
                        name,
                        descriptor: field.descriptor()?.to_string(),
                        object: Some(object),
                    };
                    hook.on_put_field(cx, &access, &value)?;
                }
                Putstatic(_) => {
                    let field = operand(0)?;
                    let value = self.pop()?;
                    let access = FieldAccess {
                        position: ins.address,
                        is_static: true,
                        class: field.class()?.to_string(),
                        name: field.name()?,
                        descriptor: field.descriptor()?.to_string(),
                        object: None,
                    };
                    hook.on_put_field(cx, &access, &value)?;
                }

                Invokevirtual(_) | Invokespecial(_) | Invokestatic(_) | Invokeinterface { .. } => {
                    let kind = match ins.instruction {
                        Invokevirtual(_) => InvokeKind::Virtual,
                        Invokespecial(_) => InvokeKind::Special,
                        Invokestatic(_) => InvokeKind::Static,
                        _ => InvokeKind::Interface,
                    };
                    self.invoke(cx, hook, operand(0)?, kind, special_fields)?
                }
                Invokedynamic { index, .. } => {
                    let mut info = InvokeDynamicInfo::create(class, *index, ins.address)?;
                    let captured = info.dynamic_desc.args.len();
                    if self.stack.len() < captured {
                        return Err(self.shape(format!("invokedynamic captures {captured} values")).into());
                    }
                    info.stored_args = self.stack.split_off(self.stack.len() - captured);
                    let category = Category::of(&info.dynamic_desc.returns);
                    match info.render_concat() {
                        Some(text) => self.push_expr(text, category),
                        None => {
                            let value = hook.on_invokedynamic(cx, Rc::new(info))?;
                            self.push(StackOperand::new(value, category));
                        }
                    }
                }

                New(_) => {
                    let value = hook.on_new(cx, ins.address, operand(0)?.class()?)?;
                    self.push(StackOperand {
                        value,
                        category: Category::Single,
                        origin: Some(ins.address),
                    });
                }
                Newarray(_) => {
                    let count = self.pop()?;
                    self.push_expr(format!("new {}[{}]", operand(0)?.atype()?, count), Category::Single);
                }
                Anewarray(_) => {
                    let count = self.pop()?;
                    self.push_expr(format!("new {}[{}]", operand(0)?.classname()?, count), Category::Single);
                }
                Multianewarray { .. } => {
                    let ty = parse_type_descriptor(operand(0)?.class()?)?;
                    let dimensions = operand(1)?.value() as usize;
                    let mut sizes = String::new();
                    for _ in 0..dimensions {
                        sizes = format!("[{}]{}", self.pop()?, sizes);
                    }
                    let rest = "[]".repeat(ty.dimensions().saturating_sub(dimensions));
                    self.push_expr(
                        format!("new {}{}{}", display_class_name(ty.base_name()), sizes, rest),
                        Category::Single,
                    );
                }
                Arraylength => {
                    let array = self.pop()?;
                    self.push_expr(format!("{array}.length"), Category::Single);
                }
                Athrow => {
                    // Kept on the stack so the bookkeeping after it stays aligned.
                    let thrown = self.pop()?;
                    self.push_expr(format!("throw {thrown}"), Category::Single);
                }
                Checkcast(_) => {
                    let value = self.pop()?;
                    self.push_expr(format!("(({}){})", operand(0)?.classname()?, value), Category::Single);
                }
                Instanceof(_) => {
                    let value = self.pop()?;
                    self.push_expr(
                        format!("({} instanceof {})", value, operand(0)?.classname()?),
                        Category::Single,
                    );
                }
                Monitorenter | Monitorexit => {
                    self.pop()?;
                }

                other => {
                    return Err(Error::Unsupported {
                        mnemonic: other.mnemonic(),
                        position: ins.address,
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    fn invoke<H: DispatchHook + ?Sized>(
        &mut self,
        cx: &mut WalkContext<'_>,
        hook: &mut H,
        method: InstructionField<'_>,
        kind: InvokeKind,
        special_fields: &SpecialFields,
    ) -> Walk<()> {
        let class = method.class()?;
        let mut name = method.name()?;
        let mut descriptor = method.descriptor()?.to_string();
        if let Some((to_name, to_descriptor)) = cx.thunks.resolve(class, &name, &descriptor) {
            name = to_name.to_string();
            descriptor = to_descriptor.to_string();
        }
        let descriptor = MethodDescriptor::parse(&descriptor)?;

        let count = descriptor.args.len();
        if self.stack.len() < count {
            return Err(self
                .shape(format!("{name}{descriptor} needs {count} arguments"))
                .into());
        }
        let args = self.stack.split_off(self.stack.len() - count);
        let receiver = match kind {
            InvokeKind::Static => None,
            _ => Some(self.pop()?),
        };
        let origin = receiver.as_ref().and_then(|r| r.origin);

        let no_fields = SpecialFields::new();
        let site = InvokeSite {
            position: self.address,
            kind,
            class: class.to_string(),
            name,
            descriptor: descriptor.clone(),
            receiver,
            args,
            special_fields: if class == self.class.name {
                special_fields
            } else {
                &no_fields
            },
        };
        let invoked = hook.on_invoke(cx, site)?;

        self.operations.extend(invoked.operations);
        if let (Some(value), Some(origin)) = (invoked.initialized, origin) {
            for slot in self.stack.iter_mut().filter(|s| s.origin == Some(origin)) {
                slot.value = value.clone();
            }
        }
        let category = Category::of(&descriptor.returns);
        match invoked.result {
            Some(value) => self.push(StackOperand::new(value, category)),
            None if !descriptor.returns_void() => self.push(StackOperand::new(Value::Opaque, category)),
            None => {}
        }
        Ok(())
    }
}

/// Bipush-style literal: small values in decimal, larger ones in hex.
fn int_literal(value: i64) -> String {
    if value > 5 {
        format!("{value:#x}")
    } else {
        value.to_string()
    }
}

fn category_of(mnemonic: &str) -> Category {
    match mnemonic.as_bytes().first() {
        Some(b'l' | b'd') => Category::Double,
        _ => Category::Single,
    }
}

/// Java type named by an instruction's type prefix.
fn type_name(mnemonic: &str) -> &'static str {
    match mnemonic.as_bytes().first() {
        Some(b'a') => "Object",
        Some(b'b') => "boolean",
        Some(b'c') => "char",
        Some(b'd') => "double",
        Some(b'f') => "float",
        Some(b'i') => "int",
        Some(b'l') => "long",
        Some(b's') => "short",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_literal() {
        assert_eq!(int_literal(5), "5");
        assert_eq!(int_literal(-3), "-3");
        assert_eq!(int_literal(16), "0x10");
        assert_eq!(int_literal(32767), "0x7fff");
    }

    #[test]
    fn test_type_prefixes() {
        assert_eq!(type_name("astore"), "Object");
        assert_eq!(type_name("bastore"), "boolean");
        assert_eq!(category_of("dload"), Category::Double);
        assert_eq!(category_of("aload"), Category::Single);
    }
}
