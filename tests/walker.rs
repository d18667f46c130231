extern crate classfile_walker;

use std::cell::Cell;
use std::rc::Rc;

use classfile_walker::code_attribute::Instruction::{self, *};
use classfile_walker::method_info::MethodAccessFlags;
use classfile_walker::walk::inline::resolve_method;
use classfile_walker::walk::{
    fallback_invoke, format, interpret, sub_operations, Category, Completion, DispatchHook, ExpressionHook,
    InvokeSite, Invoked, MethodWalk, OpKind, Operation, Position, SpecialFields, StackOperand, SubcallCache,
    ThunkTable, Value, WalkContext,
};
use classfile_walker::{
    ClassAccessFlags, ClassBuilder, ClassSource, Error, ExtractOptions, Halt, LoadedClass, MemoryClasses, Walk,
};
use serde_json::json;

const STATIC: MethodAccessFlags = MethodAccessFlags::PUBLIC.union(MethodAccessFlags::STATIC);

/// Turns `Sink.emit(x)` into a write of `x`, inlines `helper` calls and stops at `halt`.
struct Recorder;

impl DispatchHook for Recorder {
    fn on_invoke(&mut self, cx: &mut WalkContext<'_>, site: InvokeSite<'_>) -> Walk<Invoked> {
        match site.name.as_str() {
            "emit" => Ok(Invoked::operations(vec![Operation::new(site.call_position(), OpKind::Write)
                .with("type", "int")
                .with("field", &site.args[0])])),
            "helper" => {
                let operations = sub_operations(
                    cx,
                    self,
                    site.call_position(),
                    &site.class,
                    &site.name,
                    &site.descriptor,
                    site.receiver_and_args(),
                    &SpecialFields::new(),
                )?;
                Ok(Invoked::operations(operations))
            }
            "halt" => Err(Halt::Stop),
            _ => fallback_invoke(self, cx, site),
        }
    }
}

/// Counts loads of one class name.
struct Counting {
    inner: MemoryClasses,
    watched: &'static str,
    loads: Cell<usize>,
}

impl ClassSource for Counting {
    fn load(&self, name: &str) -> classfile_walker::Result<Rc<LoadedClass>> {
        if name == self.watched {
            self.loads.set(self.loads.get() + 1);
        }
        self.inner.load(name)
    }
}

fn emit(builder: &mut ClassBuilder) -> Instruction {
    Invokestatic(builder.pool().method_ref("t/Sink", "emit", "(Ljava/lang/Object;)V"))
}

fn class_with(name: &str, descriptor: &str, code: impl FnOnce(&mut ClassBuilder) -> Vec<Instruction>) -> LoadedClass {
    let mut builder = ClassBuilder::new(name);
    let code = code(&mut builder);
    builder.method("run", descriptor, STATIC, code).unwrap();
    builder.build()
}

fn walk_with<H: DispatchHook>(
    classes: &dyn ClassSource,
    cache: &mut SubcallCache,
    class: &str,
    args: Vec<StackOperand>,
    hook: &mut H,
) -> Walk<MethodWalk> {
    let thunks = ThunkTable::default();
    let options = ExtractOptions::default();
    let mut cx = WalkContext::new(classes, cache, &thunks, &options);
    let owner = classes.load(class).unwrap();
    let method = owner.methods.iter().find(|m| m.name == "run").unwrap();
    interpret(&mut cx, &owner, method, args, hook, &SpecialFields::new())
}

fn walk(class: LoadedClass, args: &[&str]) -> Walk<MethodWalk> {
    let name = class.name.clone();
    let mut classes = MemoryClasses::new();
    classes.insert(class);
    let args = args.iter().map(|a| StackOperand::expr(*a)).collect();
    walk_with(&classes, &mut SubcallCache::new(), &name, args, &mut Recorder)
}

fn fields(operations: &[Operation]) -> Vec<&str> {
    operations.iter().filter_map(|op| op.get("field")).collect()
}

#[test]
fn test_pop2_removes_one_wide_value() {
    let class = class_with("t/Pop", "(IJ)V", |b| vec![Iload0, Lload1, Pop2, emit(b), Return]);
    let result = walk(class, &["x", "y"]).unwrap();
    assert_eq!(fields(&result.operations), vec!["x"]);
}

#[test]
fn test_pop2_removes_two_narrow_values() {
    let class = class_with("t/Pop", "(I)V", |_| vec![Iload0, Iload0, Pop2, Pop, Return]);
    let err = walk(class, &["x"]).unwrap_err();
    assert!(matches!(err, Halt::Fail(Error::Shape { .. })));
}

#[test]
fn test_lookupswitch_fails_before_any_operation() {
    let class = class_with("t/Switch", "(I)V", |b| {
        vec![
            Iconst1,
            emit(b),
            Iload0,
            Lookupswitch {
                default: 40,
                npairs: 1,
                pairs: vec![(7, 40)],
            },
            Return,
        ]
    });
    let err = walk(class, &["x"]).unwrap_err();
    assert!(matches!(
        err,
        Halt::Fail(Error::Unsupported {
            mnemonic: "lookupswitch",
            ..
        })
    ));
}

#[test]
fn test_if_else_nests_into_sibling_blocks() {
    // 0 iload_0, 1 ifeq 11, 4 iconst_1, 5 emit, 8 goto 15, 11 iconst_2, 12 emit, 15 return
    let class = class_with("t/Branch", "(I)V", |b| {
        vec![Iload0, Ifeq(10), Iconst1, emit(b), Goto(7), Iconst2, emit(b), Return]
    });
    let result = walk(class, &["flag"]).unwrap();
    assert_eq!(
        format(&result.operations).unwrap(),
        json!({
            "instructions": [
                {
                    "operation": "if",
                    "condition": "flag",
                    "instructions": [{ "operation": "write", "type": "int", "field": "1" }]
                },
                {
                    "operation": "else",
                    "instructions": [{ "operation": "write", "type": "int", "field": "2" }]
                }
            ]
        })
    );
}

#[test]
fn test_backward_goto_becomes_loop() {
    // 0 iload_0, 1 ifeq 11, 4 iconst_1, 5 emit, 8 goto 0, 11 return
    let class = class_with("t/Loop", "(I)V", |b| vec![Iload0, Ifeq(10), Iconst1, emit(b), Goto(-8), Return]);
    let result = walk(class, &["more"]).unwrap();
    let kinds: Vec<_> = result.operations.iter().map(|op| op.kind).collect();
    assert_eq!(kinds, vec![OpKind::Loop, OpKind::EndLoop, OpKind::Write]);
    assert_eq!(result.operations[0].position, Position::at(1));
    assert_eq!(result.operations[1].position, Position::at(11));
}

#[test]
fn test_conditional_expression_collapses() {
    // 0 iload_0, 1 ifeq 8, 4 iconst_1, 5 goto 9, 8 iconst_2, 9 emit, 12 return
    let class = class_with("t/Ternary", "(I)V", |b| {
        vec![Iload0, Ifeq(7), Iconst1, Goto(4), Iconst2, emit(b), Return]
    });
    let result = walk(class, &["flag"]).unwrap();
    assert_eq!(result.operations.len(), 1);
    assert_eq!(result.operations[0].get("field"), Some("((flag) ? 1 : 2)"));
}

#[test]
fn test_comparison_is_reversed_for_the_guarded_branch() {
    // 0 iload_0, 1 iload_1, 2 if_icmpge 9, 5 iload_0, 6 emit, 9 return
    let class = class_with("t/Compare", "(II)V", |b| vec![Iload0, Iload1, IfIcmpge(7), Iload0, emit(b), Return]);
    let result = walk(class, &["a", "b"]).unwrap();
    assert_eq!(result.operations[0].get("condition"), Some("a < b"));
}

#[test]
fn test_return_inside_a_branch_does_not_end_the_walk() {
    // 0 iload_0, 1 ifeq 5, 4 return, 5 iconst_3, 6 emit, 9 return
    let class = class_with("t/Early", "(I)V", |b| vec![Iload0, Ifeq(4), Return, Iconst3, emit(b), Return]);
    let result = walk(class, &["done"]).unwrap();
    assert_eq!(fields(&result.operations), vec!["3"]);
}

#[test]
fn test_constructor_rewrites_every_copy() {
    let mut builder = ClassBuilder::new("t/Alloc");
    let pool = builder.pool();
    let foo = pool.class("t/Foo");
    let init = pool.method_ref("t/Foo", "<init>", "(I)V");
    let code = vec![New(foo), Dup, Iload0, Invokespecial(init), emit(&mut builder), Return];
    builder.method("run", "(I)V", STATIC, code).unwrap();
    let result = walk(builder.build(), &["size"]).unwrap();
    assert_eq!(fields(&result.operations), vec!["new t.Foo(size)"]);
}

#[test]
fn test_string_concatenation_renders_inline() {
    let mut builder = ClassBuilder::new("t/Concat");
    let pool = builder.pool();
    let factory = pool.method_ref(
        "java/lang/invoke/StringConcatFactory",
        "makeConcatWithConstants",
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
    );
    let handle = pool.method_handle(6, factory);
    let recipe = pool.string("id: \u{1}");
    let site = pool.invoke_dynamic(0, "makeConcatWithConstants", "(I)Ljava/lang/String;");
    builder.bootstrap_method(handle, vec![recipe]);
    let code = vec![Iload0, Invokedynamic { index: site, filler: 0 }, emit(&mut builder), Return];
    builder.method("run", "(I)V", STATIC, code).unwrap();

    let result = walk(builder.build(), &["count"]).unwrap();
    assert_eq!(fields(&result.operations), vec!["\"id: \" + count"]);
}

fn helper_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Helper");
    let code = vec![
        Iload0,
        emit(&mut builder),
        Iconst1,
        emit(&mut builder),
        Iconst2,
        emit(&mut builder),
        Iconst3,
        emit(&mut builder),
        Iconst4,
        emit(&mut builder),
        Return,
    ];
    builder.method("helper", "(I)V", STATIC, code).unwrap();
    builder.build()
}

fn caller_class(calls: usize) -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Caller");
    let helper = builder.pool().method_ref("t/Helper", "helper", "(I)V");
    // Six nops and a load put the first call at address 7; later calls follow every 4 bytes.
    let mut code = vec![Nop, Nop, Nop, Nop, Nop, Nop];
    for _ in 0..calls {
        code.push(Iload0);
        code.push(Invokestatic(helper));
    }
    code.push(Return);
    builder.method("run", "(I)V", STATIC, code).unwrap();
    builder.build()
}

#[test]
fn test_inlined_operations_fit_between_call_and_next_address() {
    let mut classes = MemoryClasses::new();
    classes.insert(helper_class());
    classes.insert(caller_class(1));
    let result = walk_with(
        &classes,
        &mut SubcallCache::new(),
        "t/Caller",
        vec![StackOperand::expr("flag")],
        &mut Recorder,
    )
    .unwrap();

    let positions: Vec<Position> = result.operations.iter().map(|op| op.position).collect();
    assert_eq!(positions.len(), 5);
    assert_eq!(positions[0], Position::at(7).step(1));
    assert_eq!(positions[4], Position::at(7).step(5));
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(positions.iter().all(|p| *p > Position::at(7) && *p < Position::at(8)));
    assert_eq!(fields(&result.operations), vec!["flag", "1", "2", "3", "4"]);
}

#[test]
fn test_repeated_inline_is_served_from_cache() {
    let mut inner = MemoryClasses::new();
    inner.insert(helper_class());
    inner.insert(caller_class(2));
    let classes = Counting {
        inner,
        watched: "t/Helper",
        loads: Cell::new(0),
    };
    let mut cache = SubcallCache::new();
    let result = walk_with(&classes, &mut cache, "t/Caller", vec![StackOperand::expr("flag")], &mut Recorder).unwrap();

    assert_eq!(classes.loads.get(), 1);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 1);
    let (first, second) = result.operations.split_at(5);
    let strip = |ops: &[Operation]| ops.iter().map(|op| (op.kind, op.attrs.clone())).collect::<Vec<_>>();
    assert_eq!(strip(first), strip(second));
    assert!(first.iter().all(|op| op.position.major == 7));
    assert!(second.iter().all(|op| op.position.major == 11));
}

#[test]
fn test_stop_keeps_operations_seen_so_far() {
    let mut builder = ClassBuilder::new("t/Stop");
    let halt = builder.pool().method_ref("t/Sink", "halt", "()V");
    let code = vec![Iconst1, emit(&mut builder), Invokestatic(halt), Iconst2, emit(&mut builder), Return];
    builder.method("run", "()V", STATIC, code).unwrap();

    let result = walk(builder.build(), &[]).unwrap();
    assert_eq!(result.completion, Completion::Stopped);
    assert_eq!(fields(&result.operations), vec!["1"]);
}

#[test]
fn test_stop_in_inlined_call_ends_the_outer_walk() {
    let mut helper = ClassBuilder::new("t/Helper");
    let halt = helper.pool().method_ref("t/Sink", "halt", "()V");
    helper.method("helper", "(I)V", STATIC, vec![Invokestatic(halt), Return]).unwrap();

    let mut classes = MemoryClasses::new();
    classes.insert(helper.build());
    classes.insert(caller_class(1));
    let result = walk_with(
        &classes,
        &mut SubcallCache::new(),
        "t/Caller",
        vec![StackOperand::expr("flag")],
        &mut Recorder,
    )
    .unwrap();
    assert_eq!(result.completion, Completion::Stopped);
    assert!(result.operations.is_empty());
}

#[test]
fn test_inline_depth_is_bounded() {
    let mut builder = ClassBuilder::new("t/Helper");
    let helper = builder.pool().method_ref("t/Helper", "helper", "(I)V");
    builder
        .method("helper", "(I)V", STATIC, vec![Iload0, Invokestatic(helper), Return])
        .unwrap();
    builder
        .method("run", "(I)V", STATIC, vec![Iload0, Invokestatic(helper), Return])
        .unwrap();
    let mut classes = MemoryClasses::new();
    classes.insert(builder.build());

    let err = walk_with(
        &classes,
        &mut SubcallCache::new(),
        "t/Helper",
        vec![StackOperand::expr("n")],
        &mut Recorder,
    )
    .unwrap_err();
    assert!(matches!(err, Halt::Fail(Error::Shape { .. })));
}

#[test]
fn test_expression_hook_builds_call_expressions() {
    let mut builder = ClassBuilder::new("t/Expr");
    let size = builder.pool().method_ref("t/List", "size", "()I");
    let code = vec![Aload0, Invokevirtual(size), Iconst1, Iadd, Ireturn];
    builder.method("run", "(Lt/List;)I", STATIC, code).unwrap();
    let mut classes = MemoryClasses::new();
    classes.insert(builder.build());

    let result = walk_with(
        &classes,
        &mut SubcallCache::new(),
        "t/Expr",
        vec![StackOperand::expr("items")],
        &mut ExpressionHook,
    )
    .unwrap();
    assert_eq!(result.returned.unwrap().to_string(), "(items.size() + 1)");
    assert_eq!(result.completion, Completion::Finished);
}

#[test]
fn test_tableswitch_nests_cases_and_breaks() {
    // 0 iload_0, 1 tableswitch 0..1 (24, 31, default 35), 24 iconst_1, 25 emit, 28 goto 35,
    // 31 iconst_2, 32 emit, 35 return
    let class = class_with("t/Switch", "(I)V", |b| {
        vec![
            Iload0,
            Tableswitch {
                default: 34,
                low: 0,
                high: 1,
                offsets: vec![23, 30],
            },
            Iconst1,
            emit(b),
            Goto(7),
            Iconst2,
            emit(b),
            Return,
        ]
    });
    let result = walk(class, &["key"]).unwrap();
    assert_eq!(
        format(&result.operations).unwrap(),
        json!({
            "instructions": [{
                "operation": "switch",
                "field": "key",
                "instructions": [
                    { "operation": "case", "value": "0" },
                    { "operation": "write", "type": "int", "field": "1" },
                    { "operation": "break" },
                    { "operation": "case", "value": "1" },
                    { "operation": "write", "type": "int", "field": "2" }
                ]
            }]
        })
    );
}

#[test]
fn test_abstract_target_becomes_interface_call() {
    let mut api = ClassBuilder::new("t/Api")
        .access(ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT);
    api.abstract_method("helper", "(I)V").unwrap();

    let mut builder = ClassBuilder::new("t/Client");
    let helper = builder.pool().interface_method_ref("t/Api", "helper", "(I)V");
    let code = vec![
        Aload0,
        Iload1,
        Invokeinterface {
            index: helper,
            count: 2,
            filler: 0,
        },
        Return,
    ];
    builder.method("run", "(Lt/Api;I)V", STATIC, code).unwrap();

    let mut classes = MemoryClasses::new();
    classes.insert(api.build());
    classes.insert(builder.build());
    let args = vec![StackOperand::expr("api"), StackOperand::expr("n")];
    let result = walk_with(&classes, &mut SubcallCache::new(), "t/Client", args, &mut Recorder).unwrap();

    assert_eq!(result.operations.len(), 1);
    let call = &result.operations[0];
    assert_eq!(call.kind, OpKind::InterfaceCall);
    assert_eq!(call.position, Position::at(2).step(1));
    assert_eq!(call.get("type"), Some("interface"));
    assert_eq!(call.get("target"), Some("t/Api"));
    assert_eq!(call.get("name"), Some("helper"));
    assert_eq!(call.get("field"), Some("api"));
    assert_eq!(call.get("args"), Some("n"));
}

#[test]
fn test_inherited_method_is_found_on_superclass() {
    let mut base = ClassBuilder::new("t/Base");
    let code = vec![Iload0, emit(&mut base), Return];
    base.method("helper", "(I)V", STATIC, code).unwrap();

    let mut builder = ClassBuilder::new("t/Caller");
    let helper = builder.pool().method_ref("t/Child", "helper", "(I)V");
    builder
        .method("run", "(I)V", STATIC, vec![Iload0, Invokestatic(helper), Return])
        .unwrap();

    let mut classes = MemoryClasses::new();
    classes.insert(base.build());
    classes.insert(ClassBuilder::new("t/Child").extends("t/Base").build());
    classes.insert(builder.build());
    let result = walk_with(
        &classes,
        &mut SubcallCache::new(),
        "t/Caller",
        vec![StackOperand::expr("n")],
        &mut Recorder,
    )
    .unwrap();
    assert_eq!(fields(&result.operations), vec!["n"]);

    let (owner, _) = resolve_method(&classes, "t/Child", "helper", "(I)").unwrap();
    assert_eq!(owner.name, "t/Base");
    assert!(resolve_method(&classes, "t/Child", "missing", "(I)").is_err());
}

#[test]
fn test_special_fields_replace_reads_of_the_walked_class() {
    let mut builder = ClassBuilder::new("t/Holder");
    let size = builder.pool().field_ref("t/Holder", "size", "I");
    let other = builder.pool().field_ref("t/Holder", "other", "I");
    let code = vec![
        Aload0,
        Getfield(size),
        emit(&mut builder),
        Aload0,
        Getfield(other),
        emit(&mut builder),
        Return,
    ];
    builder.method("run", "()V", MethodAccessFlags::PUBLIC, code).unwrap();
    let mut classes = MemoryClasses::new();
    classes.insert(builder.build());

    let mut special = SpecialFields::new();
    special.insert("size".to_string(), StackOperand::expr("42"));
    let mut cache = SubcallCache::new();
    let thunks = ThunkTable::default();
    let options = ExtractOptions::default();
    let mut cx = WalkContext::new(&classes, &mut cache, &thunks, &options);
    let owner = classes.load("t/Holder").unwrap();
    let result = interpret(
        &mut cx,
        &owner,
        &owner.methods[0],
        vec![StackOperand::expr("this")],
        &mut Recorder,
        &special,
    )
    .unwrap();
    assert_eq!(fields(&result.operations), vec!["42", "this.other"]);
}

#[test]
fn test_throw_keeps_stack_aligned_after_guard() {
    // 0 aload_0, 1 ifnonnull 12, 4 new, 7 dup, 8 invokespecial, 11 athrow, 12 aload_0, 13 emit, 16 return
    let mut builder = ClassBuilder::new("t/Guard");
    let pool = builder.pool();
    let exception = pool.class("java/lang/IllegalStateException");
    let init = pool.method_ref("java/lang/IllegalStateException", "<init>", "()V");
    let code = vec![
        Aload0,
        Ifnonnull(11),
        New(exception),
        Dup,
        Invokespecial(init),
        Athrow,
        Aload0,
        emit(&mut builder),
        Return,
    ];
    builder.method("run", "(Ljava/lang/Object;)V", STATIC, code).unwrap();

    let result = walk(builder.build(), &["value"]).unwrap();
    assert_eq!(result.operations[0].get("condition"), Some("value == null"));
    assert_eq!(fields(&result.operations), vec!["value"]);
    assert_eq!(
        format(&result.operations).unwrap(),
        json!({ "instructions": [{ "operation": "write", "type": "int", "field": "value" }] })
    );
}

fn emit_all(builder: &mut ClassBuilder, code: &mut Vec<Instruction>, count: usize) {
    for _ in 0..count {
        code.push(emit(builder));
    }
    code.push(Return);
}

fn dup_order(descriptor: &str, args: &[&str], mut code: Vec<Instruction>, emits: usize) -> Vec<String> {
    let mut builder = ClassBuilder::new("t/Dup");
    emit_all(&mut builder, &mut code, emits);
    builder.method("run", descriptor, STATIC, code).unwrap();
    let mut classes = MemoryClasses::new();
    classes.insert(builder.build());
    let args = args
        .iter()
        .zip(descriptor_categories(descriptor))
        .map(|(name, category)| StackOperand::new(Value::expr(*name), category))
        .collect();
    let result = walk_with(&classes, &mut SubcallCache::new(), "t/Dup", args, &mut Recorder).unwrap();
    fields(&result.operations).into_iter().map(str::to_string).collect()
}

fn descriptor_categories(descriptor: &str) -> Vec<Category> {
    let args = &descriptor[1..descriptor.find(')').unwrap()];
    args.chars()
        .map(|c| if c == 'J' || c == 'D' { Category::Double } else { Category::Single })
        .collect()
}

#[test]
fn test_dup_x2_respects_categories() {
    assert_eq!(dup_order("(III)V", &["a", "b", "c"], vec![Iload0, Iload1, Iload2, Dupx2], 4), ["c", "b", "a", "c"]);
    assert_eq!(dup_order("(JI)V", &["w", "i"], vec![Lload0, Iload2, Dupx2], 3), ["i", "w", "i"]);
}

#[test]
fn test_dup2_x1_respects_categories() {
    assert_eq!(
        dup_order("(III)V", &["a", "b", "c"], vec![Iload0, Iload1, Iload2, Dup2x1], 5),
        ["c", "b", "a", "c", "b"]
    );
    assert_eq!(dup_order("(IJ)V", &["i", "w"], vec![Iload0, Lload1, Dup2x1], 3), ["w", "i", "w"]);
}

#[test]
fn test_dup2_x2_respects_categories() {
    assert_eq!(
        dup_order("(IIII)V", &["a", "b", "c", "d"], vec![Iload0, Iload1, Iload2, Iload3, Dup2x2], 6),
        ["d", "c", "b", "a", "d", "c"]
    );
    assert_eq!(
        dup_order("(JII)V", &["w", "a", "b"], vec![Lload0, Iload2, Iload3, Dup2x2], 5),
        ["b", "a", "w", "b", "a"]
    );
    assert_eq!(
        dup_order("(IIJ)V", &["a", "b", "w"], vec![Iload0, Iload1, Lload2, Dup2x2], 4),
        ["w", "b", "a", "w"]
    );
    assert_eq!(dup_order("(JJ)V", &["x", "y"], vec![Lload0, Lload2, Dup2x2], 3), ["y", "x", "y"]);
}

#[test]
fn test_failed_walk_keeps_partial_operations() {
    let class = class_with("t/Broken", "()V", |b| vec![Iconst1, emit(b), Pop, Return]);
    let mut classes = MemoryClasses::new();
    classes.insert(class);
    let mut cache = SubcallCache::new();
    let thunks = ThunkTable::default();
    let options = ExtractOptions::default();
    let mut cx = WalkContext::new(&classes, &mut cache, &thunks, &options);
    let owner = classes.load("t/Broken").unwrap();

    let err = interpret(&mut cx, &owner, &owner.methods[0], vec![], &mut Recorder, &SpecialFields::new()).unwrap_err();
    assert!(matches!(err, Halt::Fail(Error::Shape { .. })));
    assert_eq!(fields(&cx.failed_operations), vec!["1"]);
}
