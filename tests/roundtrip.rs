//! End-to-end build / emit / load round trips over crafted assemblies.

use cilforge::assembly::{opcodes, BodyBuilder, Operand};
use cilforge::builder::CilAssembly;
use cilforge::metadata::method::ExceptionHandlerFlags;
use cilforge::metadata::signatures::{MethodSig, SigParam, TypeSig};
use cilforge::{CilImage, Token};

fn void_sig() -> MethodSig {
    MethodSig {
        return_type: SigParam {
            base: TypeSig::Void,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn static_void_with(params: Vec<TypeSig>) -> MethodSig {
    MethodSig {
        return_type: SigParam {
            base: TypeSig::Void,
            ..Default::default()
        },
        params: params
            .into_iter()
            .map(|base| SigParam {
                base,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Seed scenario 1: an assembly with no types beyond `<Module>`.
#[test]
fn empty_assembly() {
    let mut asm = CilAssembly::new("Empty", (1, 0, 0, 0), "Empty.dll");
    let bytes = asm.finish().unwrap();

    let image = CilImage::from_mem(bytes).unwrap();
    assert_eq!(image.tables().module.len(), 1);
    assert!(image.tables().assembly_ref.is_empty());

    let model = image.resolve().unwrap();
    assert_eq!(model.module.name, "Empty.dll");

    let assembly = model.assembly.as_ref().unwrap();
    assert_eq!(assembly.name, "Empty");
    assert_eq!(assembly.version, (1, 0, 0, 0));
}

fn build_hello() -> Vec<u8> {
    let mut asm = CilAssembly::new("Hello", (1, 0, 0, 0), "Hello.dll");

    let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
    let object = asm.type_ref(mscorlib, "System", "Object").unwrap();
    let console = asm.type_ref(mscorlib, "System", "Console").unwrap();

    let program = asm
        .class("Hello", "Program", 0x0010_0001, object)
        .unwrap();
    let main = asm
        .method(program, "Main", &void_sig(), 0x0096, 0)
        .unwrap();

    let write_line = asm
        .method_ref(console, "WriteLine", &static_void_with(vec![TypeSig::String]))
        .unwrap();
    let hi = asm.user_string("hi").unwrap();

    let mut body = BodyBuilder::new();
    body.emit_token(opcodes::wide(opcodes::LDSTR), hi).unwrap();
    body.emit_token(opcodes::wide(opcodes::CALL), write_line)
        .unwrap();
    body.emit(opcodes::wide(opcodes::RET)).unwrap();
    asm.method_body(main, &mut body).unwrap();

    asm.set_entry_point(main);
    asm.finish().unwrap()
}

/// Seed scenario 2: `ldstr "hi"; call WriteLine(string); ret`.
#[test]
fn hello_world() {
    let image = CilImage::from_mem(build_hello()).unwrap();

    // The #US heap holds "hi" exactly once
    let user_strings = image.user_strings().unwrap();
    let hits: Vec<_> = user_strings
        .iter()
        .filter(|(_, value)| value.to_string_lossy() == "hi")
        .collect();
    assert_eq!(hits.len(), 1);

    // Exactly one MemberRef row, and it is WriteLine
    let model = image.resolve().unwrap();
    assert_eq!(model.member_refs.len(), 1);
    assert_eq!(model.member_refs[0].name, "WriteLine");

    // The entry point token refers to Main
    let program = model
        .types
        .iter()
        .find(|ty| ty.name == "Program")
        .expect("Program type");
    let main = program.methods.iter().find(|m| m.name == "Main").unwrap();
    assert_eq!(image.entry_point(), Some(main.token));

    // The decoded body is the three instructions we assembled
    let body = main.body.as_ref().unwrap();
    assert_eq!(body.instructions.len(), 3);
    assert_eq!(body.instructions[0].mnemonic, "ldstr");
    assert_eq!(body.instructions[1].mnemonic, "call");
    assert_eq!(
        body.instructions[1].operand,
        Operand::Token(model.member_refs[0].token)
    );
    assert_eq!(body.instructions[2].mnemonic, "ret");
}

/// The master property, idempotence form: after one canonicalising round,
/// emit(load(x)) is a fixed point.
#[test]
fn hello_world_round_trip_is_idempotent() {
    let first = build_hello();

    let image1 = CilImage::from_mem(first).unwrap();
    let mut rebuilt1 = CilAssembly::from_image(&image1).unwrap();
    let second = rebuilt1.finish().unwrap();

    let image2 = CilImage::from_mem(second.clone()).unwrap();
    let mut rebuilt2 = CilAssembly::from_image(&image2).unwrap();
    let third = rebuilt2.finish().unwrap();

    assert_eq!(second, third);

    // And the rebuilt image still answers the scenario's questions
    let model = image2.resolve().unwrap();
    assert_eq!(model.member_refs.len(), 1);
    assert_eq!(model.member_refs[0].name, "WriteLine");
    assert_eq!(
        model.assembly.as_ref().map(|assembly| assembly.name.as_str()),
        Some("Hello")
    );
}

/// Seed scenario 3: a generic class with one parameter and a method using it.
#[test]
fn generic_class() {
    let mut asm = CilAssembly::new("Collections", (1, 0, 0, 0), "Collections.dll");

    let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
    let object = asm.type_ref(mscorlib, "System", "Object").unwrap();

    let list = asm
        .class("Collections", "List`1", 0x0010_0001, object)
        .unwrap();
    let type_param = asm.generic_param(list, 0, "T", 0).unwrap();
    assert_eq!(type_param.table(), 0x2A);

    // void Add(T item) — the parameter is VAR 0
    let add_sig = MethodSig {
        has_this: true,
        return_type: SigParam {
            base: TypeSig::Void,
            ..Default::default()
        },
        params: vec![SigParam {
            base: TypeSig::GenericVarType(0),
            ..Default::default()
        }],
        ..Default::default()
    };
    let add = asm.method(list, "Add", &add_sig, 0x0086, 0).unwrap();
    asm.param(add, 1, "item", 0).unwrap();

    let image = CilImage::from_mem(asm.finish().unwrap()).unwrap();
    let model = image.resolve().unwrap();

    let list_info = model.types.iter().find(|ty| ty.name == "List`1").unwrap();
    assert_eq!(list_info.generic_params.len(), 1);
    assert_eq!(list_info.generic_params[0].name, "T");
    assert_eq!(list_info.generic_params[0].number, 0);

    let add_info = list_info.methods.iter().find(|m| m.name == "Add").unwrap();
    assert_eq!(add_info.signature.params[0].base, TypeSig::GenericVarType(0));
    assert_eq!(add_info.params[0].name, "item");

    // The GenericParam row survives the full rebuild as well
    let mut rebuilt = CilAssembly::from_image(&image).unwrap();
    let image2 = CilImage::from_mem(rebuilt.finish().unwrap()).unwrap();
    let model2 = image2.resolve().unwrap();
    let list2 = model2.types.iter().find(|ty| ty.name == "List`1").unwrap();
    assert_eq!(list2.generic_params[0].name, "T");
    assert_eq!(
        list2.methods[0].signature.params[0].base,
        TypeSig::GenericVarType(0)
    );
}

/// Seed scenario 4: one catch and one finally over the same try range.
#[test]
fn exception_handlers() {
    let mut asm = CilAssembly::new("Handlers", (1, 0, 0, 0), "Handlers.dll");

    let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
    let object = asm.type_ref(mscorlib, "System", "Object").unwrap();
    let exception = asm.type_ref(mscorlib, "System", "Exception").unwrap();

    let holder = asm
        .class("Handlers", "Guarded", 0x0010_0001, object)
        .unwrap();
    let run = asm.method(holder, "Run", &void_sig(), 0x0096, 0).unwrap();

    let mut body = BodyBuilder::new();
    body.set_max_stack(9); // keep the fat header

    let try_start = body.label();
    let try_end = body.label();
    let catch_start = body.label();
    let catch_end = body.label();
    let finally_start = body.label();
    let finally_end = body.label();
    let done = body.label();

    body.bind(try_start).unwrap();
    body.emit(opcodes::wide(opcodes::NOP)).unwrap();
    body.emit_branch(opcodes::wide(opcodes::LEAVE_S), done).unwrap();
    body.bind(try_end).unwrap();
    body.bind(catch_start).unwrap();
    body.emit(opcodes::wide(opcodes::POP)).unwrap();
    body.emit_branch(opcodes::wide(opcodes::LEAVE_S), done).unwrap();
    body.bind(catch_end).unwrap();
    body.bind(finally_start).unwrap();
    body.emit(opcodes::wide(opcodes::ENDFINALLY)).unwrap();
    body.bind(finally_end).unwrap();
    body.bind(done).unwrap();
    body.emit(opcodes::wide(opcodes::RET)).unwrap();

    // Insertion order: catch first, then finally, both over the same range
    body.add_catch(try_start, try_end, catch_start, catch_end, exception);
    body.add_finally(try_start, try_end, finally_start, finally_end);

    asm.method_body(run, &mut body).unwrap();

    let image = CilImage::from_mem(asm.finish().unwrap()).unwrap();
    let model = image.resolve().unwrap();

    let run_info = &model.types.iter().find(|ty| ty.name == "Guarded").unwrap().methods[0];
    let body_info = run_info.body.as_ref().unwrap();

    assert_eq!(body_info.exception_handlers.len(), 2);
    let catch = &body_info.exception_handlers[0];
    assert_eq!(catch.flags, ExceptionHandlerFlags::EXCEPTION);
    assert_eq!(catch.class_token, exception.value());
    let finally = &body_info.exception_handlers[1];
    assert_eq!(finally.flags, ExceptionHandlerFlags::FINALLY);
    assert_eq!((catch.try_offset, catch.try_length), (finally.try_offset, finally.try_length));

    // Offsets and order survive a full rebuild
    let mut rebuilt = CilAssembly::from_image(&image).unwrap();
    let image2 = CilImage::from_mem(rebuilt.finish().unwrap()).unwrap();
    let model2 = image2.resolve().unwrap();
    let guarded2 = model2.types.iter().find(|ty| ty.name == "Guarded").unwrap();
    let body2 = &guarded2.methods[0].body.as_ref().unwrap().exception_handlers;
    assert_eq!(body2.len(), 2);
    assert_eq!(body2[0].flags, ExceptionHandlerFlags::EXCEPTION);
    assert_eq!(body2[0].try_offset, catch.try_offset);
    assert_eq!(body2[0].handler_offset, catch.handler_offset);
    assert_eq!(body2[1].flags, ExceptionHandlerFlags::FINALLY);
    assert_eq!(body2[1].handler_offset, finally.handler_offset);
}

/// Seed scenario 5: nested types and their qualified names.
#[test]
fn nested_types() {
    let mut asm = CilAssembly::new("Nesting", (1, 0, 0, 0), "Nesting.dll");

    let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
    let object = asm.type_ref(mscorlib, "System", "Object").unwrap();

    let outer = asm.class("", "Outer", 0x0010_0001, object).unwrap();
    let inner1 = asm.class("", "Inner1", 0x0010_0002, object).unwrap();
    let inner2 = asm.class("", "Inner2", 0x0010_0002, object).unwrap();

    // Deliberately out of row order: the table sort must fix this
    asm.nested_class(inner2, outer).unwrap();
    asm.nested_class(inner1, outer).unwrap();

    let image = CilImage::from_mem(asm.finish().unwrap()).unwrap();

    // NestedClass rows come out sorted by nested type row number
    let rows = &image.tables().nested_class;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].nested_class < rows[1].nested_class);

    let model = image.resolve().unwrap();
    let outer_info = model.types.iter().find(|ty| ty.name == "Outer").unwrap();
    assert_eq!(outer_info.nested_types.len(), 2);

    assert_eq!(model.type_full_name(outer_info.token).unwrap(), "Outer");
    let inner1_token = model
        .types
        .iter()
        .find(|ty| ty.name == "Inner1")
        .unwrap()
        .token;
    assert_eq!(model.type_full_name(inner1_token).unwrap(), "Outer+Inner1");
}

/// Seed scenario 6: drive #Strings past 2^16 bytes and watch the index
/// width flip.
#[test]
fn large_string_heap() {
    let mut asm = CilAssembly::new("Wide", (1, 0, 0, 0), "Wide.dll");

    let mscorlib = asm.assembly_ref("mscorlib", (4, 0, 0, 0), &[]).unwrap();
    let object = asm.type_ref(mscorlib, "System", "Object").unwrap();

    // Distinct ~48 byte names push the heap past 64 KiB
    for index in 0..1500 {
        asm.class(
            "Wide.Generated",
            &format!("PayloadCarrier_{index:05}_abcdefghijklmnopqrstuvwxyz"),
            0x0010_0001,
            object,
        )
        .unwrap();
    }

    let image = CilImage::from_mem(asm.finish().unwrap()).unwrap();
    assert!(image.table_info().is_large_str());

    // Every class name still resolves through the wide indexes
    let model = image.resolve().unwrap();
    assert_eq!(model.types.len(), 1501); // <Module> + 1500
    assert!(model
        .types
        .iter()
        .any(|ty| ty.name == "PayloadCarrier_01499_abcdefghijklmnopqrstuvwxyz"));
}

/// Structurally equal models produce byte-identical output.
#[test]
fn deterministic_output() {
    let first = build_hello();
    let second = build_hello();
    assert_eq!(first, second);
}

/// Emitted images can be written to disk and loaded back through the
/// file path.
#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Hello.dll");
    std::fs::write(&path, build_hello()).unwrap();

    let image = CilImage::from_file(&path).unwrap();
    assert_eq!(image.tables().type_def.len(), 2);
    assert!(image.entry_point().is_some());
}

/// The entry point token is carried verbatim: it lives in the Cor20 header,
/// outside the table consistency the load enforces.
#[test]
fn entry_point_round_trips_verbatim() {
    let mut asm = CilAssembly::new("Broken", (1, 0, 0, 0), "Broken.dll");
    asm.set_entry_point(Token::from_parts(0x06, 42));
    let image = CilImage::from_mem(asm.finish().unwrap()).unwrap();
    assert_eq!(image.entry_point(), Some(Token::from_parts(0x06, 42)));
    assert!(image.tables().method_def.is_empty());
}
