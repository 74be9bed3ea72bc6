//! End-to-end pipeline scenarios: each input either compiles to a verified
//! module with the expected shape, or is rejected at the expected stage with
//! the expected message.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use aurora_compiler_core::driver::{self, CompileError};
use aurora_compiler_core::ir;
use aurora_compiler_core::lexer;
use aurora_compiler_core::parser;

fn compile(source: &str) -> ir::Module {
    driver::compile("test.aur", source).expect("pipeline").module
}

fn compile_err(source: &str) -> CompileError {
    driver::compile("test.aur", source).unwrap_err()
}

fn function_text(module: &ir::Module, name: &str) -> String {
    module
        .functions
        .iter()
        .find(|function| function.name == name)
        .unwrap_or_else(|| panic!("no function {name}"))
        .to_string()
}

#[test]
fn arithmetic_precedence_compiles_multiplication_first() {
    let module = compile("fn main() -> i64 { return 1 + 2 * 3; }");
    module.verify().expect("verified");
    let text = function_text(&module, "main");
    // 2 * 3 is computed first, then added to 1.
    assert!(text.contains("mul i64 2, 3"), "{text}");
    assert!(text.contains("add i64 1,"), "{text}");
}

#[test]
fn while_loop_with_break_and_continue() {
    let module = compile(
        "fn main() -> i64 {\n\
         let s = 0;\n\
         let i = 0;\n\
         while (i < 10) {\n\
         i = i + 1;\n\
         if (i == 5) { continue; }\n\
         if (i == 8) { break; }\n\
         s = s + i;\n\
         }\n\
         return s;\n\
         }",
    );
    module.verify().expect("verified");
    let text = function_text(&module, "main");
    assert!(text.contains("while.cond"));
    assert!(text.contains("while.body"));
    assert!(text.contains("while.end"));
    // continue branches to the condition block, break to the end block.
    assert!(text.contains("br label %while.cond1"), "{text}");
    assert!(text.contains("br label %while.end3"), "{text}");
    assert!(text.contains("after.continue"));
    assert!(text.contains("after.break"));
}

#[test]
fn array_indexing_through_two_index_geps() {
    let module = compile(
        "fn main() -> i64 { let a: i64[3] = [10, 20, 30]; a[1] = 99; return a[0] + a[1] + a[2]; }",
    );
    module.verify().expect("verified");
    let text = function_text(&module, "main");
    assert!(text.contains("alloca [3 x i64]"));
    assert!(text.contains("getelementptr inbounds [3 x i64], ptr %v0, i32 0, i32"));
    assert!(text.contains("store i64 99, ptr"));
    assert!(text.contains(", align 8"));
}

#[test]
fn unique_binding_frees_exactly_once_before_ret() {
    let module =
        compile("fn main() -> i64 { let unique<i64> p = malloc(8); p[0] = 42; return p[0]; }");
    module.verify().expect("verified");
    let text = function_text(&module, "main");
    assert_eq!(text.matches("call void @free(ptr").count(), 1);
    let free_at = text.find("call void @free").unwrap();
    let ret_at = text.find("ret i64").unwrap();
    assert!(free_at < ret_at, "free runs before the return:\n{text}");
}

#[test]
fn annotated_let_type_mismatch_is_rejected() {
    let err = compile_err("fn main() -> i64 { let x: bool = 1; return 0; }");
    assert!(matches!(err, CompileError::Sema(_)));
    let message = err.to_string();
    assert!(message.contains("type mismatch"), "{message}");
    assert!(message.contains("bool"), "{message}");
    assert!(message.contains("i64"), "{message}");
}

#[test]
fn break_outside_loop_is_rejected() {
    let err = compile_err("fn main() -> i64 { break; return 0; }");
    assert!(matches!(err, CompileError::Sema(_)));
    assert!(err.to_string().contains("break statement outside of loop"));
}

#[test]
fn lexer_terminates_every_input_with_one_eof() {
    for source in [
        "",
        "fn main() -> i64 { return 0; }",
        "// nothing but comments\n/* even blocks */",
        "1 2 3 + - *",
    ] {
        let tokens = lexer::tokenize(source).expect("lex");
        assert_eq!(tokens.iter().filter(|token| token.is_eof()).count(), 1);
        assert!(tokens.last().unwrap().is_eof());
    }
}

#[test]
fn printing_and_reparsing_is_stable() {
    let source = "fn helper(n: i64, flag: bool) -> i64 {\n\
                  let a: i64[2] = [n, n * 2];\n\
                  if (flag && n > 0) { a[0] = a[1] % 3; } else { a[0] = -n; }\n\
                  defer print_i64(a[0]);\n\
                  return a[0];\n\
                  }\n\
                  fn main() -> i64 {\n\
                  let unique<i64> p = malloc(8);\n\
                  p[0] = helper(7, true);\n\
                  let n = p[0];\n\
                  while (n > 0) { n -= 1; }\n\
                  return 0;\n\
                  }";
    let tokens = lexer::tokenize(source).expect("lex");
    let program = parser::parse_program(tokens).expect("parse");

    let printed = program.to_string();
    let tokens = lexer::tokenize(&printed).expect("re-lex");
    let reparsed = parser::parse_program(tokens).expect("re-parse");

    assert_eq!(printed, reparsed.to_string());
}

#[test]
fn every_emitted_block_has_exactly_one_terminator() {
    let module = compile(
        "fn busy(n: i64) -> i64 {\n\
         let total = 0;\n\
         while (n > 0) {\n\
         if (n % 2 == 0) { total += n; } else { total -= 1; }\n\
         if (total > 100) { break; }\n\
         n -= 1;\n\
         }\n\
         return total;\n\
         }",
    );
    for function in &module.functions {
        function.verify().expect("structurally valid");
        for block in &function.blocks {
            assert!(
                block.terminator.is_some(),
                "block {} of {} lacks a terminator",
                block.label,
                function.name
            );
        }
    }
}

#[test]
fn return_types_match_declared_signatures() {
    let module = compile(
        "fn flag() -> bool { return true; }\n\
         fn narrow(x: i32) -> i32 { return x; }\n\
         fn nothing() -> void { return; }",
    );
    module.verify().expect("verified");
    assert!(function_text(&module, "flag").contains("ret i1"));
    assert!(function_text(&module, "narrow").contains("ret i32"));
    assert!(function_text(&module, "nothing").contains("ret void"));
}

#[test]
fn demo_programs_compile_and_verify() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let mut seen = 0;
    for entry in fs::read_dir(&demos).expect("demos directory") {
        let path = entry.expect("entry").path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("aur") {
            continue;
        }
        let source = fs::read_to_string(&path).expect("demo source");
        let name = path.display().to_string();
        let compiled = driver::compile(&name, &source)
            .unwrap_or_else(|err| panic!("{name} failed: {err}"));
        compiled.module.verify().expect("verified demo");
        seen += 1;
    }
    assert!(seen >= 4, "expected the demo programs, found {seen}");
}

#[test]
fn compiled_module_round_trips_through_the_filesystem() {
    let module = compile("fn main() -> i64 { return 0; }");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.ll");
    fs::write(&path, module.to_string()).expect("write");
    let text = fs::read_to_string(&path).expect("read");
    assert!(text.starts_with("; ModuleID = 'aurora_module'"));
    assert!(text.contains("define i64 @main()"));
}
