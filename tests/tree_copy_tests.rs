// Copy-protocol and attribute-isolation behavior of the tree.

use classforge::access_flags::*;
use classforge::attr::{Attribute, SOURCE_LINE};
use classforge::{ClassGenerator, Type};

fn class_with_body() -> (ClassGenerator, classforge::NodeId) {
    let mut gen = ClassGenerator::define_class(ACC_PUBLIC, "p.Copies", None, vec![]).expect("class");
    let method = gen.start_method(ACC_PUBLIC, Type::Int, "m").expect("method");
    let body = gen.body(method).expect("body");
    (gen, body)
}

#[test]
fn copy_shares_the_parent_reference() {
    let (mut gen, body) = class_with_body();
    let value = gen.const_int(7);
    let ret = gen.add_return(body, Some(value)).expect("return");

    let copy = gen.copy_node(ret);
    assert_ne!(copy, ret);
    assert_eq!(gen.tree().parent(copy), gen.tree().parent(ret));
    assert_ne!(gen.tree().uid(copy), gen.tree().uid(ret));
}

#[test]
fn copy_under_rebinds_the_parent() {
    let (mut gen, body) = class_with_body();
    let value = gen.const_int(7);
    let ret = gen.add_return(body, Some(value)).expect("return");
    let other = gen.add_block(body).expect("block");

    let copy = gen.copy_node_under(ret, other);
    assert_eq!(gen.tree().parent(copy), Some(other));
    assert_eq!(gen.tree().parent(ret), Some(body));
}

#[test]
fn no_node_is_shared_between_original_and_copy() {
    let (mut gen, body) = class_with_body();
    let one = gen.const_int(1);
    let two = gen.const_int(2);
    let sum = gen.binary(classforge::ast::BinaryOp::Add, one, two).expect("sum");
    gen.add_definition(body, Type::Int, "x", Some(sum)).expect("definition");
    let x = gen.local(body, "x").expect("local");
    gen.add_return(body, Some(x)).expect("return");

    let copy = gen.copy_node(body);
    let original_nodes = gen.tree().reachable_from(body);
    let copied_nodes = gen.tree().reachable_from(copy);
    for node in &copied_nodes {
        assert!(
            !original_nodes.contains(node),
            "node {:?} is reachable from both the original and the copy",
            node
        );
    }
    assert_eq!(original_nodes.len(), copied_nodes.len());
}

#[test]
fn name_table_aliasing_survives_the_copy() {
    let (mut gen, body) = class_with_body();
    let init = gen.const_int(3);
    let definition = gen.add_definition(body, Type::Int, "x", Some(init)).expect("definition");
    let x = gen.local(body, "x").expect("local");
    gen.add_return(body, Some(x)).expect("return");

    let copy = gen.copy_node(body);
    let copied_nodes = gen.tree().reachable_from(copy);
    // The copied block's name table must point at the copied definition,
    // not the original one.
    if let classforge::ast::NodeKind::Stmt(classforge::ast::Stmt::Block(block)) =
        gen.tree().kind(copy)
    {
        let mapped = *block.names.get("x").expect("x in copied scope");
        assert_ne!(mapped, definition);
        assert!(copied_nodes.contains(&mapped));
    } else {
        panic!("copy of a block is not a block");
    }
}

#[test]
fn attribute_values_are_isolated_after_copy() {
    let (mut gen, body) = class_with_body();
    let value = gen.const_int(7);
    let ret = gen.add_return(body, Some(value)).expect("return");

    let marks: Attribute<i32> = Attribute::new("test.copy.marks", 0);
    marks.set(gen.tree_mut(), ret, 1);

    let copy = gen.copy_node(ret);
    // Both sides observe the value present at copy time.
    assert_eq!(marks.get(gen.tree_mut(), ret), 1);
    assert_eq!(marks.get(gen.tree_mut(), copy), 1);
    assert!(marks.is_set(gen.tree(), copy));

    // Writes after the copy stay on their own side.
    marks.set(gen.tree_mut(), ret, 2);
    assert_eq!(marks.get(gen.tree_mut(), copy), 1);
    marks.set(gen.tree_mut(), copy, 3);
    assert_eq!(marks.get(gen.tree_mut(), ret), 2);
    assert_eq!(marks.get(gen.tree_mut(), copy), 3);
}

#[test]
fn get_materializes_the_default_and_marks_it_set() {
    let (mut gen, body) = class_with_body();
    let lines: Attribute<u32> = Attribute::new("test.copy.lines", 17);
    assert!(!lines.is_set(gen.tree(), body));
    assert_eq!(lines.get(gen.tree_mut(), body), 17);
    assert!(lines.is_set(gen.tree(), body));
}

#[test]
fn initializer_attribute_runs_once_on_first_read() {
    let (mut gen, body) = class_with_body();
    let labels: Attribute<String> =
        Attribute::with_init("test.copy.labels", || "fresh".to_string());
    assert_eq!(labels.get(gen.tree_mut(), body), "fresh");
    labels.set(gen.tree_mut(), body, "named".to_string());
    assert_eq!(labels.get(gen.tree_mut(), body), "named");
}

#[test]
fn source_line_attribute_is_shared_engine_metadata() {
    let (mut gen, body) = class_with_body();
    let value = gen.const_int(7);
    let ret = gen.add_return(body, Some(value)).expect("return");
    SOURCE_LINE.set(gen.tree_mut(), ret, 42);
    assert_eq!(SOURCE_LINE.get_if_set(gen.tree(), ret), Some(42));
}

#[test]
fn attaching_a_parented_expression_copies_it() {
    let (mut gen, body) = class_with_body();
    let shared = gen.const_int(5);
    let first = gen.add_return(body, Some(shared)).expect("first return");
    // Reusing the same expression node must not alias it under two parents.
    let second = gen.add_return(body, Some(shared)).expect("second return");
    let first_children = gen.tree().kind(first).child_ids();
    let second_children = gen.tree().kind(second).child_ids();
    assert_eq!(first_children.len(), 1);
    assert_eq!(second_children.len(), 1);
    assert_ne!(first_children[0], second_children[0]);
}
