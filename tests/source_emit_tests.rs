// Source backend: end-to-end rendering of generated classes.

use std::rc::Rc;

use classforge::access_flags::*;
use classforge::ast::BinaryOp;
use classforge::types::ResolutionContext;
use classforge::{generate_source, ClassGenerator, Config, Type};

fn emit(gen: &mut ClassGenerator, imports: &[String]) -> String {
    let context = Rc::new(ResolutionContext::new("source-tests"));
    generate_source(gen, &context, imports, &Config::default()).expect("source emission")
}

#[test]
fn end_to_end_constant_return() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Answer", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("method");
    let body = gen.body(method).expect("body");
    let value = gen.const_int(42);
    gen.add_return(body, Some(value)).expect("return");
    gen.method_complete(method).expect("complete");

    let text = emit(&mut gen, &[]);
    assert!(text.contains("package demo;"), "package header:\n{}", text);
    assert!(text.contains("public class Answer"), "class header:\n{}", text);
    assert!(text.contains("public int m()"), "method header:\n{}", text);
    assert!(text.contains("return 42;"), "return statement:\n{}", text);
}

#[test]
fn switch_cases_render_in_insertion_order() {
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

    let text = emit(&mut gen, &[]);
    let five = text.find("case 5:").expect("case 5");
    let one = text.find("case 1:").expect("case 1");
    let three = text.find("case 3:").expect("case 3");
    assert!(five < one && one < three, "insertion order 5, 1, 3:\n{}", text);
}

#[test]
fn binary_expressions_are_defensively_parenthesized() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Parens", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "calc").expect("method");
    let body = gen.body(method).expect("body");

    let one = gen.const_int(1);
    let two = gen.const_int(2);
    let sum = gen.binary(BinaryOp::Add, one, two).expect("sum");
    let three = gen.const_int(3);
    let product = gen.binary(BinaryOp::Mul, sum, three).expect("product");
    gen.add_return(body, Some(product)).expect("return");
    gen.method_complete(method).expect("complete");

    let text = emit(&mut gen, &[]);
    assert!(text.contains("return ((1 + 2) * 3);"), "nested parens:\n{}", text);
}

#[test]
fn imports_shorten_qualified_names() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Names", None, vec![]).expect("class");
    gen.add_field(ACC_PRIVATE, Type::string(), "label").expect("string field");
    gen.add_field(ACC_PRIVATE, Type::class("java.io.PrintStream"), "sink").expect("stream field");

    let text = emit(&mut gen, &["java.io.PrintStream".to_string()]);
    assert!(text.contains("import java.io.PrintStream;"), "import line:\n{}", text);
    assert!(text.contains("private String label;"), "java.lang shortened:\n{}", text);
    assert!(text.contains("private PrintStream sink;"), "import shortened:\n{}", text);
}

#[test]
fn control_flow_renders_structurally() {
    let mut gen =
        ClassGenerator::define_class(ACC_PUBLIC, "demo.Flow", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "loopy").expect("method");
    gen.add_argument(method, Type::Int, "n").expect("arg");
    let body = gen.body(method).expect("body");

    let zero = gen.const_int(0);
    gen.add_definition(body, Type::Int, "total", Some(zero)).expect("total");

    let n = gen.local(body, "n").expect("n");
    let limit = gen.const_int(0);
    let cond = gen.binary(BinaryOp::Gt, n, limit).expect("cond");
    let (_while_stmt, loop_body) = gen.add_while(body, cond).expect("while");

    let total = gen.local(loop_body, "total").expect("total ref");
    let total_read = gen.local(loop_body, "total").expect("total read");
    let n_read = gen.local(loop_body, "n").expect("n read");
    let next = gen.binary(BinaryOp::Add, total_read, n_read).expect("next");
    gen.add_assign(loop_body, total, next).expect("accumulate");
    gen.add_break(loop_body).expect("break");

    let result = gen.local(body, "total").expect("result");
    gen.add_return(body, Some(result)).expect("return");
    gen.method_complete(method).expect("complete");

    let text = emit(&mut gen, &[]);
    assert!(text.contains("while ((n > 0)) {") || text.contains("while (n > 0) {"), "{}", text);
    assert!(text.contains("total = (total + n);"), "{}", text);
    assert!(text.contains("break;"), "{}", text);
}

#[test]
fn interfaces_render_with_abstract_members() {
    let mut gen =
        ClassGenerator::define_interface(ACC_PUBLIC, "demo.Shape", vec![]).expect("interface");
    let method = gen
        .start_method(ACC_PUBLIC | ACC_ABSTRACT, Type::Int, "area")
        .expect("method");
    gen.method_complete(method).expect("complete");

    let text = emit(&mut gen, &[]);
    assert!(text.contains("public interface Shape"), "header:\n{}", text);
    assert!(text.contains("public abstract int area();"), "abstract member:\n{}", text);
}

#[test]
fn try_catch_and_throw_render() {
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

    let text = emit(&mut gen, &[]);
    assert!(text.contains("try {"), "{}", text);
    assert!(text.contains("throw new RuntimeException(\"boom\");"), "{}", text);
    assert!(text.contains("} catch (RuntimeException e) {"), "{}", text);
}
