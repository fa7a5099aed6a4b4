//! Integration tests for the VM
//!
//! Tests evaluation of compiled Quill scripts through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use quill_foundation::{Arity, Error, ErrorKind, Value};
use quill_language::ast::{BinaryOp, Expr, FunctionDecl, LogicalOp, Script, Stmt, UpdateOp};
use quill_language::{Vm, VmState, compile};

fn num(n: f64) -> Expr {
    Expr::number(n)
}

fn text(s: &str) -> Expr {
    Expr::string(s)
}

fn id(name: &str) -> Expr {
    Expr::ident(name)
}

fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::binary(op, left, right)
}

fn set(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(id(name), value))
}

fn load(body: Vec<Stmt>) -> Vm {
    Vm::new(compile(&Script::new(body)).unwrap())
}

/// Runs a script and returns the global `result`.
fn eval(mut body: Vec<Stmt>, result: Expr) -> Value {
    body.push(Stmt::var("result", Some(result)));
    let mut vm = load(body);
    assert_eq!(vm.run().unwrap(), VmState::Done);
    assert_eq!(vm.stack_depth(), 0);
    vm.get_global("result").unwrap()
}

fn eval_err(body: Vec<Stmt>) -> Error {
    load(body).run().unwrap_err()
}

// =============================================================================
// Literals and Operators
// =============================================================================

#[test]
fn eval_literals() {
    assert_eq!(eval(vec![], Expr::undefined()), Value::Undefined);
    assert_eq!(eval(vec![], Expr::null()), Value::Null);
    assert_eq!(eval(vec![], Expr::bool(true)), Value::Bool(true));
    assert_eq!(eval(vec![], num(1.5)), Value::Number(1.5));
    assert_eq!(eval(vec![], text("hello")), Value::from("hello"));
}

#[test]
fn eval_nested_arithmetic() {
    // (2 + 3) * 4 - 10 / 4
    let expr = bin(
        BinaryOp::Sub,
        bin(BinaryOp::Mul, bin(BinaryOp::Add, num(2.0), num(3.0)), num(4.0)),
        bin(BinaryOp::Div, num(10.0), num(4.0)),
    );
    assert_eq!(eval(vec![], expr), Value::Number(17.5));
}

#[test]
fn eval_power_remainder_and_bitwise() {
    assert_eq!(eval(vec![], bin(BinaryOp::Pow, num(2.0), num(8.0))), Value::from(256));
    assert_eq!(eval(vec![], bin(BinaryOp::Rem, num(-7.0), num(3.0))), Value::from(-1));
    assert_eq!(eval(vec![], bin(BinaryOp::BitOr, num(8.0), num(3.0))), Value::from(11));
}

#[test]
fn eval_comparisons() {
    assert_eq!(eval(vec![], bin(BinaryOp::Le, num(2.0), num(2.0))), Value::Bool(true));
    assert_eq!(eval(vec![], bin(BinaryOp::Gt, num(1.0), num(2.0))), Value::Bool(false));
    assert_eq!(eval(vec![], bin(BinaryOp::Eq, text("a"), text("a"))), Value::Bool(true));
    assert_eq!(eval(vec![], bin(BinaryOp::Ne, num(1.0), text("1"))), Value::Bool(true));
}

#[test]
fn eval_not_and_negate() {
    assert_eq!(eval(vec![], Expr::not(num(0.0))), Value::Bool(false));
    assert_eq!(eval(vec![], Expr::not(Expr::null())), Value::Bool(true));
    assert_eq!(eval(vec![], Expr::neg(num(4.0))), Value::from(-4));
}

#[test]
fn logical_operators_short_circuit() {
    // A short-circuit yields the boolean that decided it, otherwise the right operand.
    assert_eq!(
        eval(vec![], Expr::logical(LogicalOp::Or, text("a"), text("b"))),
        Value::Bool(true)
    );
    assert_eq!(
        eval(vec![], Expr::logical(LogicalOp::Or, Expr::null(), text("x"))),
        Value::from("x")
    );
    assert_eq!(
        eval(vec![], Expr::logical(LogicalOp::And, num(0.0), text("y"))),
        Value::from("y")
    );
    assert_eq!(
        eval(vec![], Expr::logical(LogicalOp::And, Expr::undefined(), text("y"))),
        Value::Bool(false)
    );
}

#[test]
fn comparing_strings_is_a_type_error() {
    let err = eval_err(vec![Stmt::expr(bin(BinaryOp::Lt, text("a"), text("b")))]);
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { operation: "<", .. }), "{err}");
    assert!(err.context.is_some());
}

// =============================================================================
// Control Flow
// =============================================================================

#[test]
fn if_else_chain() {
    let classify = |n: f64| {
        eval(
            vec![
                Stmt::var("n", Some(num(n))),
                Stmt::var("label", None),
                Stmt::if_else(
                    bin(BinaryOp::Lt, id("n"), num(0.0)),
                    set("label", text("negative")),
                    Some(Stmt::if_else(
                        bin(BinaryOp::Eq, id("n"), num(0.0)),
                        set("label", text("zero")),
                        Some(set("label", text("positive"))),
                    )),
                ),
            ],
            id("label"),
        )
    };
    assert_eq!(classify(-2.0), Value::from("negative"));
    assert_eq!(classify(0.0), Value::from("zero"));
    assert_eq!(classify(9.0), Value::from("positive"));
}

#[test]
fn for_loop_skips_odd_numbers() {
    // for (var i = 0; i < 10; i++) { if (i % 2 == 1) continue; evens.push(i); }
    let result = eval(
        vec![
            Stmt::var("evens", Some(Expr::array(vec![]))),
            Stmt::for_loop(
                Some(Stmt::var("i", Some(num(0.0)))),
                Some(bin(BinaryOp::Lt, id("i"), num(10.0))),
                Some(Expr::update(UpdateOp::Increment, false, id("i"))),
                Stmt::block(vec![
                    Stmt::if_else(
                        bin(BinaryOp::Eq, bin(BinaryOp::Rem, id("i"), num(2.0)), num(1.0)),
                        Stmt::continue_loop(),
                        None,
                    ),
                    Stmt::expr(Expr::method_call(id("evens"), "push", vec![id("i")])),
                ]),
            ),
        ],
        Expr::method_call(id("evens"), "join", vec![text(" ")]),
    );
    assert_eq!(result, Value::from("0 2 4 6 8"));
}

#[test]
fn break_only_leaves_the_inner_loop() {
    // Counts pairs (i, j) with j < i for i in 0..4.
    let result = eval(
        vec![
            Stmt::var("pairs", Some(num(0.0))),
            Stmt::for_loop(
                Some(Stmt::var("i", Some(num(0.0)))),
                Some(bin(BinaryOp::Lt, id("i"), num(4.0))),
                Some(Expr::update(UpdateOp::Increment, false, id("i"))),
                Stmt::for_loop(
                    Some(Stmt::var("j", Some(num(0.0)))),
                    None,
                    Some(Expr::update(UpdateOp::Increment, false, id("j"))),
                    Stmt::block(vec![
                        Stmt::if_else(
                            bin(BinaryOp::Ge, id("j"), id("i")),
                            Stmt::break_loop(),
                            None,
                        ),
                        Stmt::expr(Expr::compound_assign(BinaryOp::Add, id("pairs"), num(1.0))),
                    ]),
                ),
            ),
        ],
        id("pairs"),
    );
    assert_eq!(result, Value::from(6));
}

#[test]
fn loop_variables_do_not_leak() {
    let mut vm = load(vec![Stmt::for_loop(
        Some(Stmt::var("i", Some(num(0.0)))),
        Some(bin(BinaryOp::Lt, id("i"), num(3.0))),
        Some(Expr::update(UpdateOp::Increment, false, id("i"))),
        Stmt::block(vec![Stmt::var("inner", Some(id("i")))]),
    )]);
    vm.run().unwrap();
    assert!(vm.get_global("i").is_none());
    assert!(vm.get_global("inner").is_none());
}

#[test]
fn conditional_expression() {
    let result = eval(
        vec![Stmt::var("x", Some(num(5.0)))],
        Expr::conditional(bin(BinaryOp::Gt, id("x"), num(3.0)), text("big"), text("small")),
    );
    assert_eq!(result, Value::from("big"));
}

// =============================================================================
// Functions
// =============================================================================

fn factorial() -> Stmt {
    Stmt::function(
        "factorial",
        &["n"],
        vec![
            Stmt::if_else(
                bin(BinaryOp::Le, id("n"), num(1.0)),
                Stmt::returns(Some(num(1.0))),
                None,
            ),
            Stmt::returns(Some(bin(
                BinaryOp::Mul,
                id("n"),
                Expr::call(id("factorial"), vec![bin(BinaryOp::Sub, id("n"), num(1.0))]),
            ))),
        ],
    )
}

#[test]
fn recursive_function_from_script() {
    let result = eval(
        vec![factorial()],
        Expr::call(id("factorial"), vec![num(5.0)]),
    );
    assert_eq!(result, Value::from(120));
}

#[test]
fn host_calls_a_script_function() {
    let mut vm = load(vec![factorial()]);
    vm.run().unwrap();
    assert_eq!(vm.call("factorial", vec![Value::from(6)]).unwrap(), Value::from(720));
    assert_eq!(vm.stack_depth(), 0);
    assert_eq!(vm.state(), VmState::Done);
}

#[test]
fn functions_read_and_write_globals() {
    let mut vm = load(vec![
        Stmt::var("total", Some(num(0.0))),
        Stmt::function(
            "addToTotal",
            &["n"],
            vec![Stmt::expr(Expr::compound_assign(BinaryOp::Add, id("total"), id("n")))],
        ),
    ]);
    vm.run().unwrap();
    vm.call("addToTotal", vec![Value::from(3)]).unwrap();
    vm.call("addToTotal", vec![Value::from(4)]).unwrap();
    assert_eq!(vm.get_global("total"), Some(Value::from(7)));
}

#[test]
fn functions_are_first_class() {
    // var twice = function(f, x) { return f(f(x)); }; var inc = function(n) { return n + 1; };
    let result = eval(
        vec![
            Stmt::var(
                "twice",
                Some(Expr::function(
                    &["f", "x"],
                    vec![Stmt::returns(Some(Expr::call(
                        id("f"),
                        vec![Expr::call(id("f"), vec![id("x")])],
                    )))],
                )),
            ),
            Stmt::var(
                "inc",
                Some(Expr::function(
                    &["n"],
                    vec![Stmt::returns(Some(bin(BinaryOp::Add, id("n"), num(1.0))))],
                )),
            ),
        ],
        Expr::call(id("twice"), vec![id("inc"), num(40.0)]),
    );
    assert_eq!(result, Value::from(42));
}

#[test]
fn function_without_return_yields_undefined() {
    let result = eval(
        vec![Stmt::function("nothing", &[], vec![])],
        Expr::call(id("nothing"), vec![]),
    );
    assert_eq!(result, Value::Undefined);
}

// =============================================================================
// Classes, Records and Builtins
// =============================================================================

fn account_class() -> Stmt {
    let balance = || Expr::member(Expr::this(), "balance");
    Stmt::class(
        "Account",
        vec![
            FunctionDecl::new(
                "constructor",
                &["opening"],
                vec![Stmt::expr(Expr::assign(balance(), id("opening")))],
            ),
            FunctionDecl::new(
                "withdraw",
                &["amount"],
                vec![
                    Stmt::if_else(
                        bin(BinaryOp::Gt, id("amount"), balance()),
                        Stmt::throw(Expr::call(id("Error"), vec![text("insufficient funds")])),
                        None,
                    ),
                    Stmt::expr(Expr::assign(balance(), bin(BinaryOp::Sub, balance(), id("amount")))),
                    Stmt::returns(Some(balance())),
                ],
            ),
        ],
    )
}

#[test]
fn methods_mutate_their_instance() {
    let result = eval(
        vec![
            account_class(),
            Stmt::var("acct", Some(Expr::new_object("Account", vec![num(100.0)]))),
            Stmt::expr(Expr::method_call(id("acct"), "withdraw", vec![num(30.0)])),
        ],
        Expr::member(id("acct"), "balance"),
    );
    assert_eq!(result, Value::from(70));
}

#[test]
fn method_errors_are_catchable_by_the_caller() {
    let result = eval(
        vec![
            account_class(),
            Stmt::var("acct", Some(Expr::new_object("Account", vec![num(10.0)]))),
            Stmt::var("message", None),
            Stmt::try_catch(
                vec![Stmt::expr(Expr::method_call(id("acct"), "withdraw", vec![num(50.0)]))],
                Some((Some("e"), vec![set("message", Expr::member(id("e"), "message"))])),
                None,
            ),
        ],
        bin(BinaryOp::Add, id("message"), Expr::member(id("acct"), "balance")),
    );
    assert_eq!(result, Value::from("insufficient funds10"));
}

#[test]
fn chained_call_on_a_new_instance() {
    // class Plain { me() { return this; } }  var r = new Plain().me();
    let result = eval(
        vec![Stmt::class(
            "Plain",
            vec![FunctionDecl::new("me", &[], vec![Stmt::returns(Some(Expr::this()))])],
        )],
        Expr::method_call(Expr::new_object("Plain", vec![]), "me", vec![]),
    );
    assert!(matches!(result, Value::Object(ref o) if o.class_name() == "Plain"));
}

#[test]
fn compound_targets_run_side_effects_once() {
    // function tick() { calls += 1; return 0; }  a[tick()] += 2; a[tick()]++;
    let tick = Stmt::function(
        "tick",
        &[],
        vec![
            Stmt::expr(Expr::compound_assign(BinaryOp::Add, id("calls"), num(1.0))),
            Stmt::returns(Some(num(0.0))),
        ],
    );
    let target = || Expr::index(id("a"), Expr::call(id("tick"), vec![]));
    let result = eval(
        vec![
            Stmt::var("calls", Some(num(0.0))),
            Stmt::var("a", Some(Expr::array(vec![num(1.0)]))),
            tick,
            Stmt::expr(Expr::compound_assign(BinaryOp::Add, target(), num(2.0))),
            Stmt::expr(Expr::update(UpdateOp::Increment, false, target())),
        ],
        Expr::array(vec![id("calls"), Expr::index(id("a"), num(0.0))]),
    );
    assert_eq!(result.to_string(), "2,4");
}

#[test]
fn huge_array_index_is_a_runtime_error() {
    let err = eval_err(vec![
        Stmt::var("arr", Some(Expr::array(vec![]))),
        Stmt::expr(Expr::assign(Expr::index(id("arr"), num(1e20)), num(1.0))),
    ]);
    assert!(matches!(err.kind, ErrorKind::IndexOutOfRange { .. }), "{err}");
    assert!(err.is_catchable());
}

#[test]
fn printing_a_self_containing_array_terminates() {
    let result = eval(
        vec![
            Stmt::var("a", Some(Expr::array(vec![num(1.0), num(2.0)]))),
            Stmt::expr(Expr::method_call(id("a"), "push", vec![id("a")])),
        ],
        bin(BinaryOp::Add, text("a="), id("a")),
    );
    assert_eq!(result, Value::from("a=1,2,"));
}

#[test]
fn records_expose_fields() {
    let point = || {
        Stmt::var(
            "p",
            Some(Expr::record(vec![("x", num(3.0)), ("y", num(4.0))])),
        )
    };
    assert_eq!(
        eval(
            vec![point()],
            bin(BinaryOp::Add, Expr::member(id("p"), "x"), Expr::member(id("p"), "y"))
        ),
        Value::from(7)
    );
    assert_eq!(eval(vec![point()], Expr::member(id("p"), "z")), Value::Undefined);
}

#[test]
fn array_indexing_and_length() {
    let result = eval(
        vec![
            Stmt::var("a", Some(Expr::array(vec![num(1.0), num(2.0)]))),
            Stmt::expr(Expr::assign(Expr::index(id("a"), num(3.0)), num(4.0))),
        ],
        Expr::array(vec![
            Expr::member(id("a"), "length"),
            Expr::index(id("a"), num(2.0)),
            Expr::index(id("a"), num(3.0)),
        ]),
    );
    assert_eq!(result.to_string(), "4,,4");
}

#[test]
fn string_methods_chain() {
    let result = eval(
        vec![Stmt::var("s", Some(text("quill script")))],
        Expr::method_call(
            Expr::method_call(id("s"), "substring", vec![num(0.0), num(5.0)]),
            "toUpperCase",
            vec![],
        ),
    );
    assert_eq!(result, Value::from("QUILL"));
}

#[test]
fn regex_test_and_match() {
    let result = eval(
        vec![Stmt::var("re", Some(Expr::regex("[0-9]+")))],
        Expr::array(vec![
            Expr::method_call(id("re"), "test", vec![text("abc123")]),
            Expr::method_call(id("re"), "match", vec![text("abc123def")]),
        ]),
    );
    assert_eq!(result.to_string(), "true,123");
}

// =============================================================================
// Host Interop
// =============================================================================

#[test]
fn native_functions_receive_arguments() {
    let mut vm = load(vec![Stmt::var(
        "result",
        Some(Expr::call(id("hypot"), vec![num(3.0), num(4.0)])),
    )]);
    vm.register_native_function("hypot", Arity::Exact(2), |_, args| {
        let a = args[0].as_number().unwrap_or(f64::NAN);
        let b = args[1].as_number().unwrap_or(f64::NAN);
        Ok(Value::Number(a.hypot(b)))
    })
    .unwrap();
    vm.run().unwrap();
    assert_eq!(vm.get_global("result"), Some(Value::from(5)));
}

#[test]
fn native_arity_is_checked() {
    let mut vm = load(vec![Stmt::expr(Expr::call(id("one"), vec![]))]);
    vm.register_native_function("one", Arity::Exact(1), |_, _| Ok(Value::Null))
        .unwrap();
    let err = vm.run().unwrap_err();
    assert!(err.to_string().contains("expects 1"), "{err}");
}

#[test]
fn print_goes_to_the_log_sink() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let mut vm = load(vec![Stmt::expr(Expr::call(
        id("print"),
        vec![text("sum:"), bin(BinaryOp::Add, num(1.0), num(2.0))],
    ))]);
    vm.set_log_sink(move |line| sink.borrow_mut().push(line.to_string()));
    vm.run().unwrap();
    assert_eq!(*lines.borrow(), ["sum: 3"]);
}

#[test]
fn globals_defined_by_the_host() {
    let mut vm = load(vec![Stmt::var(
        "result",
        Some(bin(BinaryOp::Mul, id("scale"), num(2.0))),
    )]);
    vm.define_global("scale", Value::from(21));
    vm.run().unwrap();
    assert_eq!(vm.get_global("result"), Some(Value::from(42)));
}

#[test]
fn errors_halt_until_reset() {
    let mut vm = load(vec![Stmt::throw(text("stop"))]);
    let err = vm.run().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UncaughtException { .. }));
    assert_eq!(vm.state(), VmState::Error);
    assert_eq!(vm.last_exception(), Some(&Value::from("stop")));

    assert!(matches!(vm.run().unwrap_err().kind, ErrorKind::Halted));
    vm.reset();
    assert!(vm.run().is_err());
}
