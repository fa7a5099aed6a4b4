//! Integration tests for Value types
//!
//! Tests Value variants, truthiness, equality, display, and operator semantics.

use quill_foundation::operators::{
    add_values, bit_and, bit_or, div_values, equals, lt_values, pow_values, rem_values, sub_values,
};
use quill_foundation::{
    ArrayRef, Environment, ErrorKind, MAX_ARRAY_INDEX, ObjectRef, Type, Value, format_number,
};

// =============================================================================
// Truthiness
// =============================================================================

#[test]
fn only_undefined_null_and_false_are_falsy() {
    assert!(!Value::Undefined.is_truthy());
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Bool(false).is_truthy());

    assert!(Value::Bool(true).is_truthy());
    assert!(Value::Number(0.0).is_truthy());
    assert!(Value::Number(f64::NAN).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::array(vec![]).is_truthy());
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn value_types() {
    assert_eq!(Value::Undefined.value_type(), Type::Undefined);
    assert_eq!(Value::from(1).value_type(), Type::Number);
    assert_eq!(Value::from("s").value_type(), Type::String);
    assert_eq!(Value::array(vec![]).value_type(), Type::Array);
    assert_eq!(Value::error("e").value_type(), Type::Error);
    assert_eq!(Value::regex("a").unwrap().value_type(), Type::Regex);
    assert!(Type::Null.is_nullish());
    assert!(Type::Array.is_reference());
    assert!(!Type::String.is_reference());
}

// =============================================================================
// Equality
// =============================================================================

#[test]
fn primitives_compare_by_value() {
    assert_eq!(Value::from(1), Value::Number(1.0));
    assert_eq!(Value::from("a"), Value::from(String::from("a")));
    assert_ne!(Value::from(1), Value::from("1"));
    assert_ne!(Value::Null, Value::Undefined);
}

#[test]
fn references_compare_by_identity() {
    let a = Value::array(vec![Value::from(1)]);
    let b = Value::array(vec![Value::from(1)]);
    assert_ne!(a, b);
    assert_eq!(a, a.clone());

    let scope = Environment::new();
    let o1 = ObjectRef::new("Point", &scope);
    let o2 = ObjectRef::new("Point", &scope);
    assert!(!o1.ptr_eq(&o2));
    assert!(equals(&Value::Object(o1.clone()), &Value::Object(o1)));
}

#[test]
fn nan_is_not_equal_to_itself() {
    let nan = Value::Number(f64::NAN);
    assert!(!equals(&nan, &nan));
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn numbers_drop_integral_fractions() {
    assert_eq!(format_number(2.0), "2");
    assert_eq!(format_number(-3.0), "-3");
    assert_eq!(format_number(2.5), "2.5");
    assert_eq!(format_number(f64::INFINITY), "Infinity");
    assert_eq!(format_number(f64::NAN), "NaN");
}

#[test]
fn display_is_script_facing() {
    assert_eq!(Value::from("plain").to_string(), "plain");
    assert_eq!(Value::Undefined.to_string(), "undefined");
    assert_eq!(Value::error("bad").to_string(), "Error: bad");
    assert_eq!(
        Value::array(vec![Value::from(1), Value::Null, Value::from("x")]).to_string(),
        "1,,x"
    );
}

#[test]
fn thrown_message_strips_error_prefix() {
    assert_eq!(Value::error("bad").message(), "bad");
    assert_eq!(Value::from(42).message(), "42");
}

// =============================================================================
// Arrays
// =============================================================================

#[test]
fn array_set_extends_with_undefined() {
    let array = ArrayRef::default();
    array.set(2, Value::from("c")).unwrap();
    assert_eq!(array.len(), 3);
    assert_eq!(array.get(0), Some(Value::Undefined));
    assert_eq!(array.get(2), Some(Value::from("c")));
}

#[test]
fn array_set_past_the_limit_is_an_error() {
    let array = ArrayRef::default();
    let err = array.set(MAX_ARRAY_INDEX + 1, Value::Null).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IndexOutOfRange { .. }));
    assert_eq!(
        err.to_string(),
        format!("array index {} exceeds the maximum of {MAX_ARRAY_INDEX}", MAX_ARRAY_INDEX + 1)
    );
    assert!(array.is_empty());
}

#[test]
fn nested_self_reference_renders_empty() {
    let outer = ArrayRef::new(vec![Value::from("x")]);
    let inner = Value::array(vec![Value::from("y"), Value::Array(outer.clone())]);
    outer.push(inner);
    assert_eq!(Value::Array(outer.clone()).to_string(), "x,y,");
    assert_eq!(outer.join(" | "), "x | y,");
}

#[test]
fn array_clones_share_payload() {
    let array = ArrayRef::new(vec![]);
    let alias = array.clone();
    assert_eq!(alias.push(Value::from(1)), 1);
    assert_eq!(array.len(), 1);
    assert!(array.ptr_eq(&alias));
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn add_numbers_and_concatenate_strings() {
    assert_eq!(
        add_values(Value::from(1), Value::from(1)).unwrap(),
        Value::from(2)
    );
    assert_eq!(
        add_values(Value::from("test"), Value::from(1)).unwrap(),
        Value::from("test1")
    );
    assert_eq!(
        add_values(Value::from(1), Value::from("x")).unwrap(),
        Value::from("1x")
    );
}

#[test]
fn subtracting_a_string_is_a_type_mismatch() {
    let err = sub_values(Value::from(5), Value::from("a")).unwrap_err();
    match err.kind {
        ErrorKind::TypeMismatch {
            operation,
            left,
            right,
        } => {
            assert_eq!(operation, "-");
            assert_eq!(left, Type::Number);
            assert_eq!(right, Type::String);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn division_follows_ieee() {
    assert_eq!(
        div_values(Value::from(1), Value::from(0)).unwrap(),
        Value::Number(f64::INFINITY)
    );
    let nan = div_values(Value::from(0), Value::from(0)).unwrap();
    assert!(nan.as_number().unwrap().is_nan());
}

#[test]
fn remainder_power_and_bitwise() {
    assert_eq!(rem_values(Value::from(7), Value::from(3)).unwrap(), Value::from(1));
    assert_eq!(pow_values(Value::from(2), Value::from(10)).unwrap(), Value::from(1024));
    assert_eq!(bit_and(Value::from(6), Value::from(3)).unwrap(), Value::from(2));
    assert_eq!(bit_or(Value::from(4), Value::from(1)).unwrap(), Value::from(5));
}

#[test]
fn comparison_requires_numbers() {
    assert_eq!(
        lt_values(Value::from(1), Value::from(2)).unwrap(),
        Value::Bool(true)
    );
    assert!(lt_values(Value::from(1), Value::Null).is_err());
}
