// Structural rules of the class/method/field builder surface.

use classforge::access_flags::*;
use classforge::ast::BinaryOp;
use classforge::{ClassGenerator, Type};

fn new_class(name: &str) -> ClassGenerator {
    ClassGenerator::define_class(ACC_PUBLIC, name, None, vec![]).expect("class")
}

#[test]
fn interfaces_reject_fields_constructors_and_initializers() {
    let mut gen =
        ClassGenerator::define_interface(ACC_PUBLIC, "p.Shape", vec![]).expect("interface");
    assert!(gen.add_field(ACC_PUBLIC, Type::Int, "area").is_err());
    assert!(gen.start_constructor(ACC_PUBLIC).is_err());
    assert!(gen.static_initializer().is_err());
}

#[test]
fn interface_methods_must_be_abstract() {
    let mut gen =
        ClassGenerator::define_interface(ACC_PUBLIC, "p.Shape", vec![]).expect("interface");
    assert!(gen.start_method(ACC_PUBLIC, Type::Int, "area").is_err());
    let method = gen
        .start_method(ACC_PUBLIC | ACC_ABSTRACT, Type::Int, "area")
        .expect("abstract method");
    // No body to add statements to.
    assert!(gen.body(method).is_err());
    gen.method_complete(method).expect("complete");
}

#[test]
fn abstract_and_final_class_is_rejected() {
    assert!(ClassGenerator::define_class(
        ACC_PUBLIC | ACC_ABSTRACT | ACC_FINAL,
        "p.Broken",
        None,
        vec![]
    )
    .is_err());
}

#[test]
fn duplicate_fields_are_rejected() {
    let mut gen = new_class("p.Fields");
    gen.add_field(ACC_PRIVATE, Type::Int, "count").expect("field");
    assert!(gen.add_field(ACC_PUBLIC, Type::Long, "count").is_err());
}

#[test]
fn scope_uniqueness_with_nested_shadowing() {
    let mut gen = new_class("p.Scopes");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");

    gen.add_definition(body, Type::Int, "x", None).expect("first definition");
    let duplicate = gen.add_definition(body, Type::Int, "x", None);
    assert!(duplicate.is_err(), "duplicate name in the same block must fail");

    let inner = gen.add_block(body).expect("nested block");
    gen.add_definition(inner, Type::Long, "x", None).expect("shadowing in a nested block");
}

#[test]
fn signature_identity_is_gated_on_completion() {
    let mut gen = new_class("p.Gate");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "sum").expect("method");
    gen.add_argument(method, Type::Int, "a").expect("arg a");

    // The identity is meaningless while the argument list is mutable.
    assert!(gen.method_info(method).is_err());
    assert!(gen.signature(method).is_err());

    gen.add_argument(method, Type::Int, "b").expect("arg b");
    gen.method_complete(method).expect("complete");
    let info = gen.method_info(method).expect("info after completion");
    assert_eq!(info.signature.parameter_types, vec![Type::Int, Type::Int]);

    // The list is locked now.
    assert!(gen.add_argument(method, Type::Int, "c").is_err());
    assert!(gen.method_complete(method).is_err());
}

#[test]
fn equal_method_identities_across_generators() {
    let build = || {
        let mut gen = new_class("p.Twin");
        let method = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("method");
        gen.add_argument(method, Type::Long, "v").expect("arg");
        gen.add_exception(method, Type::class("java.lang.Exception")).expect("throws");
        gen.method_complete(method).expect("complete");
        gen.method_info(method).expect("info")
    };
    assert_eq!(build(), build());
}

#[test]
fn duplicate_method_registration_is_rejected() {
    let mut gen = new_class("p.Dups");
    let first = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("first");
    gen.add_argument(first, Type::Int, "a").expect("arg");
    gen.method_complete(first).expect("complete first");

    let second = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("second");
    gen.add_argument(second, Type::Int, "b").expect("arg");
    assert!(gen.method_complete(second).is_err(), "same (name, signature, exceptions)");

    // A different parameter list is a legal overload.
    let third = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("third");
    gen.add_argument(third, Type::Long, "c").expect("arg");
    gen.method_complete(third).expect("complete third");
}

#[test]
fn statements_are_rejected_after_method_completion() {
    let mut gen = new_class("p.Closed");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.method_complete(method).expect("complete");

    assert!(gen.add_definition(body, Type::Int, "x", None).is_err());
    assert!(gen.add_break(body).is_err());
}

#[test]
fn switch_selector_category_is_enforced() {
    let mut gen = new_class("p.Switches");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");

    let boolean_selector = gen.const_boolean(true);
    assert!(gen.add_switch(body, boolean_selector).is_err());
    let long_selector = gen.const_long(1);
    assert!(gen.add_switch(body, long_selector).is_err());

    let selector = gen.const_int(1);
    let switch = gen.add_switch(body, selector).expect("switch");
    gen.add_case(switch, 5).expect("case 5");
    assert!(gen.add_case(switch, 5).is_err(), "duplicate case value");
    gen.add_default(switch).expect("default");
    assert!(gen.add_default(switch).is_err(), "second default");
}

#[test]
fn catch_clauses_reject_primitive_array_and_duplicate_types() {
    let mut gen = new_class("p.Catches");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    let (try_stmt, _try_body) = gen.add_try(body).expect("try");

    assert!(gen.add_catch(try_stmt, Type::Int, "e").is_err());
    assert!(gen
        .add_catch(try_stmt, Type::array_of(Type::class("java.lang.Exception")), "e")
        .is_err());

    gen.add_catch(try_stmt, Type::class("java.lang.Exception"), "e").expect("catch");
    assert!(gen.add_catch(try_stmt, Type::class("java.lang.Exception"), "e2").is_err());
    // A different exception type on the same try is fine; shadowing order
    // between clauses is not checked.
    gen.add_catch(try_stmt, Type::class("java.lang.RuntimeException"), "e3").expect("catch 2");
}

#[test]
fn assignment_targets_must_be_assignable() {
    let mut gen = new_class("p.Assigns");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.add_definition(body, Type::Int, "x", None).expect("definition");

    let not_a_target = gen.const_int(1);
    let value = gen.const_int(2);
    assert!(gen.add_assign(body, not_a_target, value).is_err());

    let x = gen.local(body, "x").expect("local");
    let value = gen.const_int(2);
    gen.add_assign(body, x, value).expect("assign to variable");
}

#[test]
fn expression_construction_computes_types() {
    let mut gen = new_class("p.Exprs");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.add_definition(body, Type::Short, "s", None).expect("s");
    gen.add_definition(body, Type::Long, "l", None).expect("l");

    let s = gen.local(body, "s").expect("s ref");
    let l = gen.local(body, "l").expect("l ref");
    let sum = gen.binary(BinaryOp::Add, s, l).expect("sum");
    // short + long promotes to long.
    let sum_stmt = gen.add_expression(body, sum).expect("stmt");
    let _ = sum_stmt;

    let a = gen.const_boolean(true);
    let b = gen.const_int(1);
    assert!(gen.binary(BinaryOp::Add, a, b).is_err(), "boolean + int has no type");

    let one = gen.const_int(1);
    assert!(gen.cast(Type::Boolean, one).is_err(), "int cannot cast to boolean");
    let narrow_source = gen.const_long(1);
    gen.cast(Type::Int, narrow_source).expect("long narrows to int");
}

#[test]
fn conditions_must_be_boolean() {
    let mut gen = new_class("p.Conds");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    let one = gen.const_int(1);
    assert!(gen.add_if(body, one).is_err());
    let one = gen.const_int(1);
    assert!(gen.add_while(body, one).is_err());
    let yes = gen.const_boolean(true);
    gen.add_if(body, yes).expect("boolean condition");
}

#[test]
fn class_info_reflects_only_completed_methods() {
    let mut gen = new_class("p.Snapshot");
    gen.add_field(ACC_PRIVATE, Type::Int, "n").expect("field");
    let done = gen.start_method(ACC_PUBLIC, Type::Int, "done").expect("done");
    gen.method_complete(done).expect("complete");
    let _open = gen.start_method(ACC_PUBLIC, Type::Int, "open").expect("open");

    let info = gen.class_info();
    assert_eq!(info.name, "p.Snapshot");
    assert_eq!(info.fields.len(), 1);
    assert!(info.method("done", &[]).is_some());
    assert!(info.method("open", &[]).is_none());
}
