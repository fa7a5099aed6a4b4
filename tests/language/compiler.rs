//! Integration tests for the compiler
//!
//! Tests program layout, listings and rejected scripts.

use quill_foundation::{Diagnostic, ErrorKind};
use quill_language::ast::{BinaryOp, Expr, FunctionDecl, Script, Stmt};
use quill_language::{Compiler, Opcode, Program, compile};

fn counting_function(name: &str) -> Stmt {
    Stmt::function(
        name,
        &["n"],
        vec![
            Stmt::var("i", Some(Expr::number(0.0))),
            Stmt::while_loop(
                Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::ident("n")),
                Stmt::expr(Expr::compound_assign(
                    BinaryOp::Add,
                    Expr::ident("i"),
                    Expr::number(1.0),
                )),
            ),
            Stmt::returns(Some(Expr::ident("i"))),
        ],
    )
}

fn sample() -> Script {
    Script::new(vec![
        counting_function("countA"),
        counting_function("countB"),
        Stmt::class(
            "Shape",
            vec![
                FunctionDecl::new("constructor", &["size"], vec![]),
                FunctionDecl::new("area", &[], vec![Stmt::returns(Some(Expr::number(0.0)))]),
            ],
        ),
        Stmt::var("x", Some(Expr::call(Expr::ident("countA"), vec![Expr::number(3.0)]))),
    ])
}

fn compile_errors(script: &Script) -> Vec<Diagnostic> {
    match compile(script).map(|_| ()).unwrap_err().kind {
        ErrorKind::Compile(diagnostics) => diagnostics,
        other => panic!("expected a compile error, got {other:?}"),
    }
}

// =============================================================================
// Program Layout
// =============================================================================

#[test]
fn one_section_per_body() {
    let program = compile(&sample()).unwrap();
    let names: Vec<_> = program.sections().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        ["<script>", "countA", "countB", "@Shape.constructor", "@Shape.area"]
    );

    let functions: Vec<_> = program.functions().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(functions, &names[1..]);
    assert_eq!(program.function("countB").unwrap().params, ["n"]);
}

#[test]
fn sections_end_with_return_or_eof() {
    let program = compile(&sample()).unwrap();
    for (idx, section) in program.sections().iter().enumerate() {
        let expected = if idx == 0 { Opcode::Eof } else { Opcode::Return };
        assert_eq!(section.last_op(), Some(&expected), "{}", section.name);
    }
}

#[test]
fn labels_are_unique_and_resolved() {
    let program = compile(&sample()).unwrap();
    let mut seen = std::collections::HashSet::new();
    for section in program.sections() {
        for (pc, instr) in section.code.iter().enumerate() {
            if let Opcode::Label(label) = instr.op {
                assert!(seen.insert(label), "label L{label} reused");
                assert_eq!(program.jump_target(label), Some(pc));
            }
        }
    }
    assert!(seen.len() >= 4);
}

#[test]
fn compiler_and_helper_agree() {
    let a = Compiler::new().compile(&sample()).unwrap();
    let b: Program = compile(&sample()).unwrap();
    assert_eq!(a.disassemble(), b.disassemble());
}

#[test]
fn disassembly_marks_statement_starts() {
    let program = compile(&Script::new(vec![Stmt::var("x", Some(Expr::number(7.0)))])).unwrap();
    let listing = program.disassemble();
    assert!(listing.starts_with("constants:\n"), "{listing}");
    assert!(listing.contains("<script>:\n    0 * "), "{listing}");
    assert!(listing.contains("EOF"), "{listing}");
    assert_eq!(program.constants().len(), 1);
}

// =============================================================================
// Rejected Scripts
// =============================================================================

#[test]
fn break_does_not_cross_a_function_boundary() {
    let script = Script::new(vec![Stmt::while_loop(
        Expr::bool(true),
        Stmt::function("escape", &[], vec![Stmt::break_loop().at(2, 9)]),
    )]);
    let diagnostics = compile_errors(&script);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].to_string(), "2:9: `break` outside of a loop");
}

#[test]
fn top_level_return_is_rejected() {
    let diagnostics = compile_errors(&Script::new(vec![Stmt::returns(None).at(3, 1)]));
    assert_eq!(diagnostics[0].to_string(), "3:1: `return` outside of a function");
}

#[test]
fn invalid_targets_are_reported() {
    let diagnostics = compile_errors(&Script::new(vec![
        Stmt::expr(Expr::assign(Expr::string("a"), Expr::number(1.0))),
        Stmt::expr(Expr::update(
            quill_language::ast::UpdateOp::Increment,
            true,
            Expr::number(1.0),
        )),
    ]));
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[1].message.contains("increment"));
}

#[test]
fn parser_and_compiler_diagnostics_are_combined() {
    let script = Script::new(vec![Stmt::continue_loop().at(4, 2)])
        .with_diagnostics(vec![Diagnostic::new("missing `;`", 1, 10)]);
    let diagnostics = compile_errors(&script);
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].message, "missing `;`");
    assert_eq!((diagnostics[1].line, diagnostics[1].column), (4, 2));
}
