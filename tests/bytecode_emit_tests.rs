// Bytecode backend: end-to-end classfile emission, checked structurally and
// through the reflective bridge.

use std::rc::Rc;

use classforge::access_flags::*;
use classforge::ast::BinaryOp;
use classforge::reflect::class_info_from_bytes;
use classforge::types::ResolutionContext;
use classforge::{generate_class_file, ClassGenerator, Config, Type};

fn emit(gen: &mut ClassGenerator) -> Vec<u8> {
    let context = Rc::new(ResolutionContext::new("bytecode-tests"));
    let config = Config { verify_bytecode: true, ..Config::default() };
    generate_class_file(gen, &context, &[], &config).expect("bytecode emission")
}

/// Position of the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

const BIPUSH: u8 = 0x10;
const IRETURN: u8 = 0xac;

#[test]
fn end_to_end_constant_return() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Answer", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("method");
    let body = gen.body(method).expect("body");
    let value = gen.const_int(42);
    gen.add_return(body, Some(value)).expect("return");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    // `m` loads the constant and returns it.
    assert!(find(&bytes, &[BIPUSH, 42, IRETURN]).is_some(), "bipush 42; ireturn");

    let info = class_info_from_bytes(&bytes).expect("reflect");
    assert_eq!(info.name, "demo.Answer");
    assert_eq!(info.super_class, Some(Type::object()));
    let m = info.method("m", &[]).expect("method m");
    assert_eq!(m.signature.return_type, Type::Int);
    assert!(m.access & ACC_PUBLIC != 0);
    // No constructor was declared, so a default one is synthesized.
    assert_eq!(info.constructors.len(), 1);
    assert!(info.constructors[0].signature.parameter_types.is_empty());
}

#[test]
fn switch_bodies_are_emitted_in_insertion_order() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Order", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "pick").expect("method");
    gen.add_argument(method, Type::Int, "x").expect("arg");
    let body = gen.body(method).expect("body");

    let selector = gen.local(body, "x").expect("selector");
    let switch = gen.add_switch(body, selector).expect("switch");
    for (value, result) in [(5, 50), (1, 10), (3, 30)] {
        let case_body = gen.add_case(switch, value).expect("case");
        let result = gen.const_int(result);
        gen.add_return(case_body, Some(result)).expect("case return");
    }
    let default_body = gen.add_default(switch).expect("default");
    let zero = gen.const_int(0);
    gen.add_return(default_body, Some(zero)).expect("default return");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    let fifty = find(&bytes, &[BIPUSH, 50, IRETURN]).expect("case 5 body");
    let ten = find(&bytes, &[BIPUSH, 10, IRETURN]).expect("case 1 body");
    let thirty = find(&bytes, &[BIPUSH, 30, IRETURN]).expect("case 3 body");
    assert!(fifty < ten && ten < thirty, "bodies follow insertion order 5, 1, 3");
}

#[test]
fn wide_constants_round_trip_through_the_pool() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Wide", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Long, "big").expect("method");
    let body = gen.body(method).expect("body");
    let value = gen.const_long(123_456_789_000);
    gen.add_return(body, Some(value)).expect("return");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    let info = class_info_from_bytes(&bytes).expect("reflect");
    let big = info.method("big", &[]).expect("method big");
    assert_eq!(big.signature.descriptor(), "()J");
    // CONSTANT_Long tag followed by the big-endian value.
    let mut expected = vec![5u8];
    expected.extend_from_slice(&123_456_789_000i64.to_be_bytes());
    assert!(find(&bytes, &expected).is_some(), "long constant in the pool");
}

#[test]
fn interface_classfiles_carry_interface_flags() {
    let mut gen =
        ClassGenerator::define_interface(ACC_PUBLIC, "demo.Shape", vec![]).expect("interface");
    let method = gen
        .start_method(ACC_PUBLIC | ACC_ABSTRACT, Type::Int, "area")
        .expect("method");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    let info = class_info_from_bytes(&bytes).expect("reflect");
    assert!(info.is_interface());
    assert!(info.access & ACC_ABSTRACT != 0);
    let area = info.method("area", &[]).expect("area");
    assert!(area.is_abstract());
    assert!(info.constructors.is_empty());
}

#[test]
fn declared_exceptions_survive_the_round_trip() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Risky", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "run").expect("method");
    gen.add_exception(method, Type::class("java.lang.Exception")).expect("throws");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    let info = class_info_from_bytes(&bytes).expect("reflect");
    let run = info.method("run", &[]).expect("run");
    assert_eq!(run.exceptions, vec![Type::class("java.lang.Exception")]);
}

#[test]
fn control_flow_compiles_to_branches() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Flow", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "classify").expect("method");
    gen.add_argument(method, Type::Int, "n").expect("arg");
    let body = gen.body(method).expect("body");

    let n = gen.local(body, "n").expect("n");
    let zero = gen.const_int(0);
    let negative = gen.binary(BinaryOp::Lt, n, zero).expect("cond");
    let (if_stmt, then_block) = gen.add_if(body, negative).expect("if");
    let minus_one = gen.const_int(-1);
    gen.add_return(then_block, Some(minus_one)).expect("then return");
    let else_block = gen.add_else(if_stmt).expect("else");
    let one = gen.const_int(1);
    gen.add_return(else_block, Some(one)).expect("else return");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    let info = class_info_from_bytes(&bytes).expect("reflect");
    assert!(info.method("classify", &[Type::Int]).is_some());
}

#[test]
fn try_catch_emits_an_exception_table() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Guard", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "guarded").expect("method");
    let body = gen.body(method).expect("body");

    let (try_stmt, try_body) = gen.add_try(body).expect("try");
    let message = gen.const_string("boom");
    let boom = gen
        .new_object(Type::class("java.lang.RuntimeException"), vec![message])
        .expect("new");
    gen.add_throw(try_body, boom).expect("throw");
    let catch_body = gen
        .add_catch(try_stmt, Type::class("java.lang.RuntimeException"), "e")
        .expect("catch");
    let one = gen.const_int(1);
    gen.add_return(catch_body, Some(one)).expect("catch return");
    let two = gen.const_int(2);
    gen.add_return(body, Some(two)).expect("tail return");
    gen.method_complete(method).expect("complete");

    let bytes = emit(&mut gen);
    // athrow appears in the try body, and the handler's catch type names
    // the exception class in internal form.
    assert!(find(&bytes, &[0xbf]).is_some(), "athrow emitted");
    assert!(find(&bytes, b"java/lang/RuntimeException").is_some());
}

#[test]
fn static_fields_and_initializer_compile() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Counter", None, vec![]).expect("class");
    gen.add_field(ACC_PRIVATE | ACC_STATIC, Type::Int, "count").expect("field");
    let init = gen.static_initializer().expect("static init");
    let count = gen.own_field("count").expect("count");
    let seven = gen.const_int(7);
    gen.add_assign(init, count, seven).expect("assign");

    let bytes = emit(&mut gen);
    let info = class_info_from_bytes(&bytes).expect("reflect");
    let count = info.field("count").expect("count field");
    assert!(count.access & ACC_STATIC != 0);
    // <clinit> holds the initializer but stays off the structural surface.
    assert!(info.method("<clinit>", &[]).is_none());
    assert!(find(&bytes, b"<clinit>").is_some());
}

#[test]
fn artifact_name_follows_the_qualified_class_name() {
    let dir = std::env::temp_dir().join(format!("classforge-test-{}", std::process::id()));
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.deep.Artifact", None, vec![]).expect("class");

    let context = Rc::new(ResolutionContext::new("bytecode-tests"));
    let config = Config { class_dir: Some(dir.clone()), ..Config::default() };
    generate_class_file(&mut gen, &context, &[], &config).expect("emission");

    let expected = dir.join("demo/deep/Artifact.class");
    assert!(expected.is_file(), "artifact at {}", expected.display());
    std::fs::remove_dir_all(&dir).ok();
}
