// Behavior of the shared validation pass: diagnostics are collected per
// offending node, and missing classes surface as a distinct condition.

use std::rc::Rc;

use classforge::access_flags::*;
use classforge::types::ResolutionContext;
use classforge::{generate_source, ClassGenerator, Config, Error, Type};

fn context() -> Rc<ResolutionContext> {
    Rc::new(ResolutionContext::new("validation-tests"))
}

fn emit(gen: &mut ClassGenerator) -> Result<String, Error> {
    generate_source(gen, &context(), &[], &Config::default())
}

#[test]
fn assignment_type_mismatch_is_a_check_error() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Bad", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.add_definition(body, Type::Int, "x", None).expect("definition");
    let x = gen.local(body, "x").expect("local");
    let text = gen.const_string("oops");
    gen.add_assign(body, x, text).expect("assign builds");
    gen.method_complete(method).expect("complete");

    match emit(&mut gen) {
        Err(Error::Check(failure)) => {
            assert_eq!(failure.diagnostics.len(), 1);
            assert!(failure.diagnostics[0].message.contains("cannot assign"));
        }
        other => panic!("expected a check failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn multiple_diagnostics_are_collected_before_failing() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Bad2", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.add_definition(body, Type::Int, "x", None).expect("definition");

    let x = gen.local(body, "x").expect("local");
    let text = gen.const_string("oops");
    gen.add_assign(body, x, text).expect("bad assign");
    gen.add_return(body, None).expect("bad return for an int method");
    gen.method_complete(method).expect("complete");

    match emit(&mut gen) {
        Err(Error::Check(failure)) => {
            assert!(
                failure.diagnostics.len() >= 2,
                "both findings reported, got {}",
                failure.diagnostics.len()
            );
        }
        other => panic!("expected a check failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn missing_class_is_a_resolution_error() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Needs", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    let widget = gen.new_object(Type::class("com.missing.Widget"), vec![]).expect("new builds");
    gen.add_expression(body, widget).expect("stmt");
    gen.method_complete(method).expect("complete");

    match emit(&mut gen) {
        Err(Error::Resolve(_)) => {}
        other => panic!("expected a resolution error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Break", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    gen.add_break(body).expect("break builds");
    gen.method_complete(method).expect("complete");

    assert!(matches!(emit(&mut gen), Err(Error::Check(_))));
}

#[test]
fn return_type_consistency_is_enforced() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Ret", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");
    let value = gen.const_int(1);
    gen.add_return(body, Some(value)).expect("return builds");
    gen.method_complete(method).expect("complete");

    assert!(matches!(emit(&mut gen), Err(Error::Check(_))));
}

#[test]
fn widening_return_values_are_accepted() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Widen", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Long, "m").expect("method");
    let body = gen.body(method).expect("body");
    let value = gen.const_int(1);
    gen.add_return(body, Some(value)).expect("return");
    gen.method_complete(method).expect("complete");

    emit(&mut gen).expect("int widens to the declared long return type");
}

#[test]
fn unfinalized_methods_cannot_be_emitted() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Open", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let _ = method;
    assert!(matches!(emit(&mut gen), Err(Error::Emit(_))));
}

#[test]
fn calls_are_checked_against_the_resolved_class() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Calls", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Void, "m").expect("method");
    let body = gen.body(method).expect("body");

    // println(int) exists on java.io.PrintStream; the signature here claims
    // a bogus one on String.
    let receiver = gen.const_string("target");
    let bogus = classforge::MethodSignature::new(Type::Void, vec![Type::Int]);
    let arg = gen.const_int(1);
    let call = gen.call(receiver, "println", &bogus, vec![arg]).expect("call builds");
    gen.add_expression(body, call).expect("stmt");
    gen.method_complete(method).expect("complete");

    assert!(matches!(emit(&mut gen), Err(Error::Check(_))));
}

#[test]
fn valid_call_through_a_static_field_chain_passes() {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Hello", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC | ACC_STATIC, Type::Void, "say").expect("method");
    let body = gen.body(method).expect("body");

    let out = gen
        .static_field(
            Type::class("java.lang.System"),
            "out",
            Type::class("java.io.PrintStream"),
        )
        .expect("System.out");
    let println = classforge::MethodSignature::new(Type::Void, vec![Type::string()]);
    let message = gen.const_string("hello");
    let call = gen.call(out, "println", &println, vec![message]).expect("call");
    gen.add_expression(body, call).expect("stmt");
    gen.method_complete(method).expect("complete");

    emit(&mut gen).expect("well-typed call chain validates");
}
