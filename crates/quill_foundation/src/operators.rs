//! Binary operator semantics.
//!
//! `+` concatenates when either side is a string; every other arithmetic,
//! comparison and bitwise operator accepts numbers only. Type errors name the
//! operator and both operand types.

#![allow(clippy::needless_pass_by_value)]

use crate::error::{Error, Result};
use crate::value::Value;

fn mismatch(op: &'static str, a: &Value, b: &Value) -> Error {
    Error::type_mismatch(op, a.value_type(), b.value_type())
}

fn numbers(op: &'static str, a: &Value, b: &Value) -> Result<(f64, f64)> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok((*x, *y)),
        _ => Err(mismatch(op, a, b)),
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Adds two values.
///
/// # Errors
/// Returns a type mismatch unless both are numbers or one is a string.
pub fn add_values(a: Value, b: Value) -> Result<Value> {
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::from(format!("{a}{b}")))
        }
        _ => Err(mismatch("+", &a, &b)),
    }
}

/// Subtracts two values.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn sub_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("-", &a, &b)?;
    Ok(Value::Number(x - y))
}

/// Multiplies two values.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn mul_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("*", &a, &b)?;
    Ok(Value::Number(x * y))
}

/// Divides two values. Division by zero yields an infinity or `NaN`.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn div_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("/", &a, &b)?;
    Ok(Value::Number(x / y))
}

/// Remainder with the sign of the dividend.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn rem_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("%", &a, &b)?;
    Ok(Value::Number(x % y))
}

/// Raises `a` to the power `b`.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn pow_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("**", &a, &b)?;
    Ok(Value::Number(x.powf(y)))
}

// =============================================================================
// Bitwise
// =============================================================================

const TWO_POW_32: f64 = 4_294_967_296.0;

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
fn to_i32(n: f64) -> i32 {
    if n.is_finite() {
        // Wrap modulo 2^32 like other dynamic languages do.
        (n.trunc().rem_euclid(TWO_POW_32) as u32) as i32
    } else {
        0
    }
}

/// Bitwise AND over operands truncated to 32-bit integers.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn bit_and(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("&", &a, &b)?;
    Ok(Value::Number(f64::from(to_i32(x) & to_i32(y))))
}

/// Bitwise OR over operands truncated to 32-bit integers.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn bit_or(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("|", &a, &b)?;
    Ok(Value::Number(f64::from(to_i32(x) | to_i32(y))))
}

// =============================================================================
// Comparison
// =============================================================================

/// Less than.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn lt_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("<", &a, &b)?;
    Ok(Value::Bool(x < y))
}

/// Less than or equal.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn le_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers("<=", &a, &b)?;
    Ok(Value::Bool(x <= y))
}

/// Greater than.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn gt_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers(">", &a, &b)?;
    Ok(Value::Bool(x > y))
}

/// Greater than or equal.
///
/// # Errors
/// Returns a type mismatch unless both are numbers.
pub fn ge_values(a: Value, b: Value) -> Result<Value> {
    let (x, y) = numbers(">=", &a, &b)?;
    Ok(Value::Bool(x >= y))
}

/// Script `==`.
#[must_use]
pub fn equals(a: &Value, b: &Value) -> bool {
    a == b
}
