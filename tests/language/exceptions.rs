//! Integration tests for exception handling
//!
//! Tests throw, try/catch/finally and unwinding across loops and calls.

use quill_foundation::{ErrorKind, Value};
use quill_language::ast::{BinaryOp, Expr, Script, Stmt, UpdateOp};
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

fn set(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(id(name), value))
}

fn log(entry: Expr) -> Stmt {
    Stmt::expr(Expr::method_call(id("log"), "push", vec![entry]))
}

fn incr(name: &str) -> Stmt {
    Stmt::expr(Expr::update(UpdateOp::Increment, false, id(name)))
}

/// Runs a script that starts with `var log = [];` and returns the joined log.
fn run_logged(mut body: Vec<Stmt>) -> (Vm, String) {
    body.insert(0, Stmt::var("log", Some(Expr::array(vec![]))));
    let mut vm = Vm::new(compile(&Script::new(body)).unwrap());
    assert_eq!(vm.run().unwrap(), VmState::Done);
    assert_eq!(vm.stack_depth(), 0, "stack not balanced");
    let log = vm.get_global("log").unwrap().to_string();
    (vm, log)
}

// =============================================================================
// Try / Catch / Finally
// =============================================================================

#[test]
fn finally_runs_without_an_exception() {
    let (_, log) = run_logged(vec![Stmt::try_catch(
        vec![log(text("body"))],
        Some((Some("e"), vec![log(text("catch"))])),
        Some(vec![log(text("finally"))]),
    )]);
    assert_eq!(log, "body,finally");
}

#[test]
fn try_finally_without_catch_propagates() {
    let (_, log) = run_logged(vec![Stmt::try_catch(
        vec![Stmt::try_catch(
            vec![Stmt::throw(text("boom")), log(text("unreachable"))],
            None,
            Some(vec![log(text("cleanup"))]),
        )],
        Some((Some("e"), vec![log(Expr::binary(BinaryOp::Add, text("caught "), id("e")))])),
        None,
    )]);
    assert_eq!(log, "cleanup,caught boom");
}

#[test]
fn throwing_from_finally_replaces_the_exception() {
    let (_, log) = run_logged(vec![Stmt::try_catch(
        vec![Stmt::try_catch(
            vec![Stmt::throw(text("first"))],
            None,
            Some(vec![Stmt::throw(text("second"))]),
        )],
        Some((Some("e"), vec![log(id("e"))])),
        None,
    )]);
    assert_eq!(log, "second");
}

#[test]
fn catch_can_rethrow_to_an_outer_handler() {
    let (_, log) = run_logged(vec![Stmt::try_catch(
        vec![Stmt::try_catch(
            vec![Stmt::throw(num(1.0))],
            Some((
                Some("e"),
                vec![
                    log(text("inner")),
                    Stmt::throw(Expr::binary(BinaryOp::Add, id("e"), num(1.0))),
                ],
            )),
            None,
        )],
        Some((Some("e"), vec![log(id("e"))])),
        None,
    )]);
    assert_eq!(log, "inner,2");
}

#[test]
fn runtime_errors_carry_their_description() {
    let (vm, _) = run_logged(vec![
        Stmt::var("message", None),
        Stmt::try_catch(
            vec![Stmt::expr(id("ghost"))],
            Some((Some("e"), vec![set("message", Expr::member(id("e"), "message"))])),
            None,
        ),
    ]);
    assert_eq!(
        vm.get_global("message"),
        Some(Value::from("undefined variable: ghost"))
    );
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn break_inside_try_runs_finally() {
    let (vm, log) = run_logged(vec![
        Stmt::var("i", Some(num(0.0))),
        Stmt::while_loop(
            Expr::bool(true),
            Stmt::try_catch(
                vec![
                    incr("i"),
                    Stmt::if_else(
                        Expr::binary(BinaryOp::Eq, id("i"), num(3.0)),
                        Stmt::break_loop(),
                        None,
                    ),
                ],
                None,
                Some(vec![log(id("i"))]),
            ),
        ),
    ]);
    assert_eq!(log, "1,2,3");
    assert_eq!(vm.get_global("i"), Some(Value::from(3)));
}

#[test]
fn continue_inside_try_runs_finally() {
    let (_, log) = run_logged(vec![Stmt::for_loop(
        Some(Stmt::var("i", Some(num(0.0)))),
        Some(Expr::binary(BinaryOp::Lt, id("i"), num(3.0))),
        Some(Expr::update(UpdateOp::Increment, false, id("i"))),
        Stmt::try_catch(
            vec![Stmt::continue_loop(), log(text("unreachable"))],
            None,
            Some(vec![log(id("i"))]),
        ),
    )]);
    assert_eq!(log, "0,1,2");
}

#[test]
fn throwing_every_iteration_keeps_the_stack_balanced() {
    let (vm, _) = run_logged(vec![
        Stmt::var("caught", Some(num(0.0))),
        Stmt::for_loop(
            Some(Stmt::var("i", Some(num(0.0)))),
            Some(Expr::binary(BinaryOp::Lt, id("i"), num(50.0))),
            Some(Expr::update(UpdateOp::Increment, false, id("i"))),
            Stmt::try_catch(
                vec![Stmt::throw(id("i"))],
                Some((None, vec![incr("caught")])),
                None,
            ),
        ),
    ]);
    assert_eq!(vm.get_global("caught"), Some(Value::from(50)));
}

// =============================================================================
// Functions
// =============================================================================

fn thrower_chain() -> Vec<Stmt> {
    vec![
        Stmt::function(
            "inner",
            &["value"],
            vec![Stmt::throw(id("value")).at(2, 5)],
        ),
        Stmt::function(
            "outer",
            &["value"],
            vec![Stmt::returns(Some(Expr::call(id("inner"), vec![id("value")])))],
        ),
    ]
}

#[test]
fn exceptions_unwind_through_nested_calls() {
    let mut body = thrower_chain();
    body.push(Stmt::var("result", None));
    body.push(Stmt::try_catch(
        vec![Stmt::expr(Expr::call(id("outer"), vec![text("deep")]))],
        Some((Some("e"), vec![set("result", id("e"))])),
        None,
    ));
    let (vm, _) = run_logged(body);
    assert_eq!(vm.get_global("result"), Some(Value::from("deep")));
}

#[test]
fn return_inside_try_keeps_the_value_and_runs_finally() {
    let (mut vm, _) = run_logged(vec![Stmt::function(
        "guarded",
        &[],
        vec![Stmt::try_catch(
            vec![Stmt::returns(Some(text("value")))],
            None,
            Some(vec![log(text("finally"))]),
        )],
    )]);
    assert_eq!(vm.call("guarded", vec![]).unwrap(), Value::from("value"));
    assert_eq!(vm.get_global("log").unwrap().to_string(), "finally");
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn uncaught_exceptions_report_the_unwound_frames() {
    let mut body = thrower_chain();
    body.push(Stmt::expr(Expr::call(id("outer"), vec![text("escaped")])));
    let mut vm = Vm::new(compile(&Script::new(body)).unwrap());

    let err = vm.run().unwrap_err();
    match &err.kind {
        ErrorKind::UncaughtException { message } => assert_eq!(message, "escaped"),
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
    let context = err.context.unwrap();
    assert_eq!(context.source.as_deref(), Some("inner"));
    assert_eq!((context.line, context.column), (Some(2), Some(5)));
    assert_eq!(context.stack, ["inner", "outer"]);
    assert_eq!(vm.state(), VmState::Error);
}

#[test]
fn host_calls_surface_exceptions_without_halting() {
    let mut vm = Vm::new(compile(&Script::new(thrower_chain())).unwrap());
    vm.run().unwrap();

    let err = vm.call("outer", vec![Value::from("nope")]).unwrap_err();
    assert!(err.is_uncaught());
    assert_eq!(vm.state(), VmState::Done);
    assert_eq!(vm.stack_depth(), 0);
    assert_eq!(vm.last_exception(), Some(&Value::from("nope")));
}
