// Conversion lattice checks against the canonical promotion tables.

use classforge::access_flags::*;
use classforge::types::{ClassInfo, ResolutionContext};
use classforge::Type;

const PRIMITIVES: [Type; 8] = [
    Type::Boolean,
    Type::Byte,
    Type::Char,
    Type::Short,
    Type::Int,
    Type::Long,
    Type::Float,
    Type::Double,
];

fn widens(from: &Type, to: &Type) -> bool {
    use Type::*;
    let targets: &[Type] = match from {
        Byte => &[Short, Int, Long, Float, Double],
        Short => &[Int, Long, Float, Double],
        Char => &[Int, Long, Float, Double],
        Int => &[Long, Float, Double],
        Long => &[Float, Double],
        Float => &[Double],
        _ => &[],
    };
    targets.contains(to)
}

fn narrows(from: &Type, to: &Type) -> bool {
    use Type::*;
    let targets: &[Type] = match from {
        Short => &[Byte, Char],
        Char => &[Byte, Short],
        Int => &[Byte, Short, Char],
        Long => &[Byte, Short, Char, Int],
        Float => &[Byte, Short, Char, Int, Long],
        Double => &[Byte, Short, Char, Int, Long, Float],
        _ => &[],
    };
    targets.contains(to)
}

#[test]
fn primitive_lattice_matches_the_canonical_tables() {
    for from in &PRIMITIVES {
        for to in &PRIMITIVES {
            assert_eq!(
                to.has_primitive_widening_conversion_from(from),
                widens(from, to),
                "widening {} -> {}",
                from,
                to
            );
            assert_eq!(
                to.has_primitive_narrowing_conversion_from(from),
                narrows(from, to),
                "narrowing {} -> {}",
                from,
                to
            );
        }
    }
}

#[test]
fn widening_is_directional() {
    assert!(Type::Long.has_primitive_widening_conversion_from(&Type::Int));
    assert!(!Type::Int.has_primitive_widening_conversion_from(&Type::Long));
    assert!(Type::Int.has_primitive_narrowing_conversion_from(&Type::Long));
}

#[test]
fn reference_widening_follows_the_declared_hierarchy() {
    let context = ResolutionContext::new("test");
    let object = Type::object();
    let string = Type::string();
    let exception = Type::class("java.lang.Exception");
    let runtime = Type::class("java.lang.RuntimeException");

    assert!(object.has_reference_widening_conversion_from(&string, &context));
    assert!(!string.has_reference_widening_conversion_from(&object, &context));
    assert!(exception.has_reference_widening_conversion_from(&runtime, &context));
    assert!(!runtime.has_reference_widening_conversion_from(&exception, &context));

    assert!(string.has_reference_narrowing_conversion_from(&object, &context));
    assert!(!object.has_reference_narrowing_conversion_from(&string, &context));
}

#[test]
fn null_widens_to_every_reference_type() {
    let context = ResolutionContext::new("test");
    for target in [Type::object(), Type::string(), Type::array_of(Type::Int)] {
        assert!(target.has_reference_widening_conversion_from(&Type::Null, &context));
    }
    assert!(!Type::Int.has_reference_widening_conversion_from(&Type::Null, &context));
}

#[test]
fn array_covariance_applies_to_reference_elements_only() {
    let context = ResolutionContext::new("test");
    let object_array = Type::array_of(Type::object());
    let string_array = Type::array_of(Type::string());
    let int_array = Type::array_of(Type::Int);
    let long_array = Type::array_of(Type::Long);

    assert!(object_array.has_reference_widening_conversion_from(&string_array, &context));
    assert!(!string_array.has_reference_widening_conversion_from(&object_array, &context));
    assert!(!long_array.has_reference_widening_conversion_from(&int_array, &context));
    assert!(Type::object().has_reference_widening_conversion_from(&int_array, &context));
}

#[test]
fn registered_interfaces_participate_in_subtyping() {
    let mut context = ResolutionContext::new("test");
    context.register(ClassInfo {
        access: ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        name: "p.Drawable".to_string(),
        super_class: None,
        interfaces: vec![],
        fields: vec![],
        methods: vec![],
        constructors: vec![],
    });
    context.register(ClassInfo {
        access: ACC_PUBLIC,
        name: "p.Circle".to_string(),
        super_class: Some(Type::object()),
        interfaces: vec![Type::class("p.Drawable")],
        fields: vec![],
        methods: vec![],
        constructors: vec![],
    });

    let drawable = Type::class("p.Drawable");
    let circle = Type::class("p.Circle");
    assert!(drawable.has_reference_widening_conversion_from(&circle, &context));
    assert!(!circle.has_reference_widening_conversion_from(&drawable, &context));
    assert!(circle.has_reference_narrowing_conversion_from(&drawable, &context));
}

#[test]
fn boolean_never_converts() {
    for other in &PRIMITIVES {
        if *other == Type::Boolean {
            continue;
        }
        assert!(!other.has_primitive_widening_conversion_from(&Type::Boolean));
        assert!(!Type::Boolean.has_primitive_widening_conversion_from(other));
        assert!(!other.has_primitive_narrowing_conversion_from(&Type::Boolean));
        assert!(!Type::Boolean.has_primitive_narrowing_conversion_from(other));
    }
}
