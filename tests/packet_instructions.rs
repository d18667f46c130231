extern crate classfile_walker;

use classfile_walker::code_attribute::Instruction::{self, *};
use classfile_walker::method_info::MethodAccessFlags;
use classfile_walker::toppings::packet_instructions::{act, list_thunks};
use classfile_walker::{ClassBuilder, ClassRoles, ExtractOptions, Extraction, LoadedClass, MemoryClasses};
use serde_json::json;

const BUF: &str = "t/Buf";
const WRITE: &str = "(Lt/Buf;)V";
const METAFACTORY: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const BICONSUMER: &str = "()Ljava/util/function/BiConsumer;";
const STRING_WRITER: (u8, &str, &str, &str) = (5, BUF, "a", "(Ljava/lang/String;)Lt/Buf;");
const INT_WRITER: (u8, &str, &str, &str) = (5, BUF, "c", "(I)Lt/Buf;");

/// Adds a `LambdaMetafactory` call site for `target` (reference kind, class,
/// name, descriptor) and returns its `InvokeDynamic` constant.
fn lambda_site(
    builder: &mut ClassBuilder,
    target: (u8, &str, &str, &str),
    instantiated: &str,
    site: &str,
) -> u16 {
    let (kind, class, name, descriptor) = target;
    let pool = builder.pool();
    let metafactory = pool.method_ref("java/lang/invoke/LambdaMetafactory", "metafactory", METAFACTORY);
    let bootstrap = pool.method_handle(6, metafactory);
    let body = pool.method_ref(class, name, descriptor);
    let handle = pool.method_handle(kind, body);
    let instantiated = pool.method_type(instantiated);
    let index = builder.bootstrap_method(bootstrap, vec![instantiated, handle, instantiated]);
    builder.pool().invoke_dynamic(index, "accept", site)
}

fn indy(index: u16) -> Instruction {
    Invokedynamic { index, filler: 0 }
}

fn buffer_class() -> LoadedClass {
    let mut builder = ClassBuilder::new(BUF);
    let pool = builder.pool();
    let parent = pool.field_ref(BUF, "parent", "Lio/netty/buffer/ByteBuf;");
    let write_int = pool.method_ref("io/netty/buffer/ByteBuf", "writeInt", "(I)Lio/netty/buffer/ByteBuf;");
    builder
        .method(
            "b",
            "(I)Lt/Buf;",
            MethodAccessFlags::PUBLIC,
            vec![Aload0, Getfield(parent), Iload1, Invokevirtual(write_int), Pop, Aload0, Areturn],
        )
        .unwrap();
    builder.abstract_method("a", "(Ljava/lang/String;)Lt/Buf;").unwrap();
    builder.build()
}

fn ping_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Ping");
    let pool = builder.pool();
    let name = pool.field_ref("t/Ping", "name", "Ljava/lang/String;");
    let id = pool.field_ref("t/Ping", "id", "I");
    let flag = pool.field_ref("t/Ping", "flag", "Z");
    let count = pool.field_ref("t/Ping", "count", "I");
    let write_string = pool.method_ref(BUF, "a", "(Ljava/lang/String;)Lt/Buf;");
    let thunk = pool.method_ref(BUF, "b", "(I)Lt/Buf;");
    let write_varint = pool.method_ref(BUF, "c", "(I)Lt/Buf;");
    // 22: ifeq 34 skips the count when the flag is clear.
    let code = vec![
        Aload1,
        Aload0,
        Getfield(name),
        Invokevirtual(write_string),
        Pop,
        Aload1,
        Aload0,
        Getfield(id),
        Invokevirtual(thunk),
        Pop,
        Aload0,
        Getfield(flag),
        Ifeq(12),
        Aload1,
        Aload0,
        Getfield(count),
        Invokevirtual(write_varint),
        Pop,
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn items_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Items");
    let pool = builder.pool();
    let items = pool.field_ref("t/Items", "items", "Ljava/util/Collection;");
    let metafactory = pool.method_ref("java/lang/invoke/LambdaMetafactory", "metafactory", METAFACTORY);
    let bootstrap = pool.method_handle(6, metafactory);
    let erased = pool.method_type("(Ljava/lang/Object;Ljava/lang/Object;)V");
    let body = pool.method_ref("t/Items", "lambda$write$0", "(Lt/Buf;Ljava/lang/String;)V");
    let handle = pool.method_handle(6, body);
    let instantiated = pool.method_type("(Lt/Buf;Ljava/lang/String;)V");
    let site = pool.invoke_dynamic(0, "accept", BICONSUMER);
    let write_collection = pool.method_ref(
        BUF,
        "d",
        "(Ljava/util/Collection;Ljava/util/function/BiConsumer;)V",
    );
    let write_string = pool.method_ref(BUF, "a", "(Ljava/lang/String;)Lt/Buf;");
    builder.bootstrap_method(bootstrap, vec![erased, handle, instantiated]);

    let code = vec![
        Aload1,
        Aload0,
        Getfield(items),
        Invokedynamic { index: site, filler: 0 },
        Invokevirtual(write_collection),
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder
        .method(
            "lambda$write$0",
            "(Lt/Buf;Ljava/lang/String;)V",
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
            vec![Aload0, Aload1, Invokevirtual(write_string), Pop, Return],
        )
        .unwrap();
    builder.build()
}

fn move_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Move");
    let pool = builder.pool();
    let pos = pool.field_ref("t/Move", "pos", "Lt/BlockPos;");
    let write_pos = pool.method_ref(BUF, "e", "(Lt/BlockPos;)Lt/Buf;");
    let code = vec![Aload1, Aload0, Getfield(pos), Invokevirtual(write_pos), Pop, Return];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn names_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Names");
    let names = builder.pool().field_ref("t/Names", "names", "Ljava/util/Collection;");
    let write_collection = builder.pool().method_ref(
        BUF,
        "d",
        "(Ljava/util/Collection;Ljava/util/function/BiConsumer;)V",
    );
    let site = lambda_site(&mut builder, STRING_WRITER, "(Lt/Buf;Ljava/lang/String;)V", BICONSUMER);
    let code = vec![Aload1, Aload0, Getfield(names), indy(site), Invokevirtual(write_collection), Return];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn maybe_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Maybe");
    let label = builder.pool().field_ref("t/Maybe", "label", "Ljava/util/Optional;");
    let write_optional = builder.pool().method_ref(
        BUF,
        "f",
        "(Ljava/util/Optional;Ljava/util/function/BiConsumer;)V",
    );
    let site = lambda_site(&mut builder, STRING_WRITER, "(Lt/Buf;Ljava/lang/String;)V", BICONSUMER);
    let code = vec![Aload1, Aload0, Getfield(label), indy(site), Invokevirtual(write_optional), Return];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn choice_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Choice");
    let either = builder
        .pool()
        .field_ref("t/Choice", "either", "Lcom/mojang/datafixers/util/Either;");
    let write_either = builder.pool().method_ref(
        BUF,
        "g",
        "(Lcom/mojang/datafixers/util/Either;Ljava/util/function/BiConsumer;Ljava/util/function/BiConsumer;)V",
    );
    let left = lambda_site(&mut builder, STRING_WRITER, "(Lt/Buf;Ljava/lang/String;)V", BICONSUMER);
    let right = lambda_site(&mut builder, INT_WRITER, "(Lt/Buf;Ljava/lang/Integer;)V", BICONSUMER);
    let code = vec![
        Aload1,
        Aload0,
        Getfield(either),
        indy(left),
        indy(right),
        Invokevirtual(write_either),
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn holder_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Sound");
    let registry = builder.pool().field_ref("t/Sound", "registry", "Lt/IdMap;");
    let holder = builder.pool().field_ref("t/Sound", "holder", "Lt/Holder;");
    let write_holder = builder.pool().method_ref(
        BUF,
        "h",
        "(Lt/IdMap;Lt/Holder;Ljava/util/function/BiConsumer;)V",
    );
    let site = lambda_site(&mut builder, STRING_WRITER, "(Lt/Buf;Lt/Holder;)V", BICONSUMER);
    let code = vec![
        Aload1,
        Aload0,
        Getfield(registry),
        Aload0,
        Getfield(holder),
        indy(site),
        Invokevirtual(write_holder),
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn each_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Each");
    let items = builder.pool().field_ref("t/Each", "items", "Ljava/util/List;");
    let for_each = builder
        .pool()
        .interface_method_ref("java/util/List", "forEach", "(Ljava/util/function/Consumer;)V");
    let write_string = builder.pool().method_ref(BUF, "a", "(Ljava/lang/String;)Lt/Buf;");
    let site = lambda_site(
        &mut builder,
        (6, "t/Each", "lambda$a$0", "(Lt/Buf;Ljava/lang/String;)V"),
        "(Ljava/lang/String;)V",
        "(Lt/Buf;)Ljava/util/function/Consumer;",
    );
    let code = vec![
        Aload0,
        Getfield(items),
        Aload1,
        indy(site),
        Invokeinterface {
            index: for_each,
            count: 2,
            filler: 0,
        },
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder
        .method(
            "lambda$a$0",
            "(Lt/Buf;Ljava/lang/String;)V",
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
            vec![Aload0, Aload1, Invokevirtual(write_string), Pop, Return],
        )
        .unwrap();
    builder.build()
}

fn misc_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Misc");
    let pool = builder.pool();
    let meta = pool.field_ref("t/Misc", "meta", "Lt/Meta;");
    let name = pool.field_ref("t/Misc", "name", "Ljava/lang/String;");
    let pack = pool.method_ref("t/Meta", "pack", WRITE);
    let write_name = pool.method_ref("t/Common", "writeName", "(Lt/Buf;Ljava/lang/String;)V");
    let code = vec![
        Aload0,
        Getfield(meta),
        Aload1,
        Invokevirtual(pack),
        Aload1,
        Aload0,
        Getfield(name),
        Invokestatic(write_name),
        Return,
    ];
    builder.method("a", WRITE, MethodAccessFlags::PUBLIC, code).unwrap();
    builder.build()
}

fn common_class() -> LoadedClass {
    let mut builder = ClassBuilder::new("t/Common");
    let write_string = builder.pool().method_ref(BUF, "a", "(Ljava/lang/String;)Lt/Buf;");
    builder
        .method(
            "writeName",
            "(Lt/Buf;Ljava/lang/String;)V",
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![Aload0, Aload1, Invokevirtual(write_string), Pop, Return],
        )
        .unwrap();
    builder.build()
}

fn classes() -> MemoryClasses {
    let mut classes = MemoryClasses::new();
    classes.insert(buffer_class());
    classes.insert(ping_class());
    classes.insert(items_class());
    classes.insert(move_class());
    classes.insert(ClassBuilder::new("t/Broken").build());
    for class in [
        names_class(),
        maybe_class(),
        choice_class(),
        holder_class(),
        each_class(),
        misc_class(),
        common_class(),
    ] {
        classes.insert(class);
    }
    classes
}

fn extract(packets: &[(&str, &str)]) -> Extraction {
    let roles: ClassRoles = [
        ("packet.packetbuffer", BUF),
        ("idmap", "t/IdMap"),
        ("metadata", "t/Meta"),
    ]
    .into_iter()
    .collect();
    let mut extraction = Extraction::new(roles);
    for (key, class) in packets {
        extraction.packets.insert(key, class);
    }
    act(&mut extraction, &classes(), &ExtractOptions::default()).unwrap();
    extraction
}

#[test]
fn test_thunks_are_detected() {
    let thunks = list_thunks(&classes(), BUF).unwrap();
    assert_eq!(thunks.len(), 1);
    assert_eq!(
        thunks.resolve(BUF, "b", "(I)Lt/Buf;"),
        Some(("writeInt", "(I)Lio/netty/buffer/ByteBuf;"))
    );
    assert_eq!(thunks.resolve("t/Other", "b", "(I)Lt/Buf;"), None);
}

#[test]
fn test_writes_fields_in_order() {
    let extraction = extract(&[("play.ping", "t/Ping.class")]);
    assert_eq!(
        extraction.packets.packets["play.ping"].instructions,
        Some(json!([
            { "operation": "write", "type": "string", "field": "name" },
            { "operation": "write", "type": "int", "field": "id" },
            {
                "operation": "if",
                "condition": "flag",
                "instructions": [{ "operation": "write", "type": "varint", "field": "count" }]
            }
        ]))
    );
}

#[test]
fn test_thunks_can_be_disabled() {
    let roles: ClassRoles = [("packet.packetbuffer", BUF)].into_iter().collect();
    let mut extraction = Extraction::new(roles);
    extraction.packets.insert("play.ping", "t/Ping");
    let options = ExtractOptions {
        detect_thunks: false,
        ..ExtractOptions::default()
    };
    act(&mut extraction, &classes(), &options).unwrap();
    let instructions = extraction.packets.packets["play.ping"].instructions.as_ref().unwrap();
    // Without the thunk, `b(int)` is an ordinary one-letter buffer call.
    assert_eq!(instructions[1], json!({ "operation": "write", "type": "varint", "field": "id" }));
}

#[test]
fn test_collection_becomes_a_loop() {
    let extraction = extract(&[("play.items", "t/Items.class")]);
    assert_eq!(
        extraction.packets.packets["play.items"].instructions,
        Some(json!([
            { "operation": "write", "type": "varint", "field": "items.size()" },
            { "operation": "store", "type": "Iterator", "var": "it", "value": "this.items.iterator()" },
            {
                "operation": "loop",
                "condition": "it.hasNext()",
                "instructions": [
                    { "operation": "store", "type": "java.lang.String", "var": "itv", "value": "it.next()" },
                    { "operation": "write", "type": "string", "field": "itv" }
                ]
            }
        ]))
    );
}

#[test]
fn test_first_unknown_argument_is_taken_as_position() {
    let extraction = extract(&[("play.move", "t/Move.class")]);
    assert_eq!(
        extraction.packets.packets["play.move"].instructions,
        Some(json!([{ "operation": "write", "type": "position", "field": "pos" }]))
    );
    assert_eq!(extraction.packets.assumed_position_class.as_deref(), Some("t/BlockPos"));
}

#[test]
fn test_failed_packet_keeps_no_instructions() {
    let extraction = extract(&[("play.broken", "t/Broken.class"), ("play.ping", "t/Ping.class")]);
    assert!(extraction.packets.packets["play.broken"].instructions.is_none());
    assert!(extraction.packets.packets["play.ping"].instructions.is_some());

    let json: serde_json::Value = serde_json::from_str(&extraction.to_json().unwrap()).unwrap();
    assert!(json["packets"]["packets"]["play.broken"].get("instructions").is_none());
}

#[test]
fn test_missing_buffer_role_is_an_error() {
    let mut extraction = Extraction::new(ClassRoles::new());
    assert!(act(&mut extraction, &classes(), &ExtractOptions::default()).is_err());
}

fn instructions(packet: &str, class: &str) -> serde_json::Value {
    extract(&[(packet, class)]).packets.packets[packet]
        .instructions
        .clone()
        .unwrap()
}

#[test]
fn test_method_reference_in_collection_is_dispatched() {
    assert_eq!(
        instructions("play.names", "t/Names.class"),
        json!([
            { "operation": "write", "type": "varint", "field": "names.size()" },
            { "operation": "store", "type": "Iterator", "var": "it", "value": "this.names.iterator()" },
            {
                "operation": "loop",
                "condition": "it.hasNext()",
                "instructions": [
                    { "operation": "store", "type": "java.lang.String", "var": "itv", "value": "it.next()" },
                    { "operation": "write", "type": "string", "field": "itv" }
                ]
            }
        ])
    );
}

#[test]
fn test_optional_becomes_guarded_write() {
    assert_eq!(
        instructions("play.maybe", "t/Maybe.class"),
        json!([
            { "operation": "write", "type": "boolean", "field": "label.isPresent()" },
            {
                "operation": "if",
                "condition": "label.isPresent()",
                "instructions": [{ "operation": "write", "type": "string", "field": "label.get()" }]
            }
        ])
    );
}

#[test]
fn test_either_becomes_if_else() {
    assert_eq!(
        instructions("play.choice", "t/Choice.class"),
        json!([
            { "operation": "write", "type": "boolean", "field": "either.isLeft()" },
            {
                "operation": "if",
                "condition": "either.isLeft()",
                "instructions": [{ "operation": "write", "type": "string", "field": "either.left()" }]
            },
            {
                "operation": "else",
                "instructions": [{ "operation": "write", "type": "varint", "field": "either.right()" }]
            }
        ])
    );
}

#[test]
fn test_idmap_holder_becomes_switch() {
    assert_eq!(
        instructions("play.sound", "t/Sound.class"),
        json!([{
            "operation": "switch",
            "field": "holder.getKind()",
            "instructions": [
                { "operation": "case", "value": "Kind.REFERENCE" },
                { "operation": "write", "type": "varint", "field": "registry.getId(holder) + 1" },
                { "operation": "break" },
                { "operation": "case", "value": "Kind.DIRECT" },
                { "operation": "write", "type": "varint", "field": "0" },
                { "operation": "write", "type": "string", "field": "holder" },
                { "operation": "break" }
            ]
        }])
    );
}

#[test]
fn test_for_each_becomes_a_loop() {
    assert_eq!(
        instructions("play.each", "t/Each.class"),
        json!([
            { "operation": "store", "type": "Iterator", "var": "it", "value": "this.items.iterator()" },
            {
                "operation": "loop",
                "condition": "it.hasNext()",
                "instructions": [
                    { "operation": "store", "type": "java.lang.String", "var": "itv", "value": "it.next()" },
                    { "operation": "write", "type": "string", "field": "itv" }
                ]
            }
        ])
    );
}

#[test]
fn test_metadata_and_helpers_taking_the_buffer() {
    assert_eq!(
        instructions("play.misc", "t/Misc.class"),
        json!([
            { "operation": "write", "type": "metadata", "field": "meta" },
            { "operation": "write", "type": "string", "field": "name" }
        ])
    );
}
