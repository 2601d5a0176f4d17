use wpp_diag::{Category, Diagnostic};
use wpp_eval::{EvalConfig, Evaluator};

fn eval(source: &str) -> String {
    let output = eval_bytes(source);
    String::from_utf8(output).expect("test programs emit UTF-8")
}

fn eval_bytes(source: &str) -> Vec<u8> {
    let mut evaluator = Evaluator::new(EvalConfig::default());
    evaluator
        .eval_source("<test>", source.as_bytes())
        .expect("evaluation should succeed")
}

fn eval_err(source: &str) -> Diagnostic {
    let mut evaluator = Evaluator::new(EvalConfig::default());
    evaluator
        .eval_source("<test>", source.as_bytes())
        .expect_err("evaluation should fail")
}

// -- Core evaluation --

#[test]
fn function_call_concatenates() {
    assert_eq!(
        eval(r#"let greet(x) "hello " .. x greet("world")"#),
        "hello world"
    );
}

#[test]
fn document_output_is_the_concatenation_of_statements() {
    assert_eq!(eval(r#""a" "b" let f "ignored" "c""#), "abc");
}

#[test]
fn variables_are_eager_and_functions_are_lazy() {
    // `var` captures `dep` at definition time; the function body sees the
    // redefinition because it evaluates at call time.
    assert_eq!(
        eval(
            r#"
            let dep "old"
            var snapshot dep
            let lazy dep
            let dep "new"
            snapshot .. " " .. lazy
            "#
        ),
        "old new"
    );
}

#[test]
fn arguments_evaluate_in_the_callers_environment() {
    assert_eq!(
        eval(r#"let x "caller" let f(a) a f({ let x "inner" x .. x })"#),
        "innerinner"
    );
}

#[test]
fn one_name_supports_several_arities() {
    assert_eq!(
        eval(r#"let f "zero" let f(a) "one" f .. f("x")"#),
        "zeroone"
    );
}

#[test]
fn shadowing_and_drop_restore_older_definitions() {
    assert_eq!(eval(r#"let f(x) "a" let f(x) "b" f("z")"#), "b");
    assert_eq!(
        eval(r#"let f(x) "a" let f(x) "b" drop f(x) f("z")"#),
        "a"
    );
}

#[test]
fn drop_inside_a_block_unshadows_for_the_rest_of_the_document() {
    assert_eq!(
        eval(r#"let x "A" let x "B" x .. " " .. { drop x() x }"#),
        "B A"
    );
}

#[test]
fn drop_of_a_missing_definition_fails() {
    let diag = eval_err(r#"drop nope()"#);
    assert_eq!(diag.category, Category::Eval);
    assert!(diag.message.contains("cannot drop"));
}

#[test]
fn drop_of_an_intrinsic_fails() {
    let diag = eval_err(r#"drop length("x")"#);
    assert!(diag.message.contains("cannot drop intrinsic"));
}

#[test]
fn block_definitions_are_local() {
    assert_eq!(eval(r#"let x "outer" { let x "inner" x } .. x"#), "innerouter");

    let diag = eval_err(r#"{ let y "local" y } .. y"#);
    assert!(diag.message.contains("`y` is not defined"));
}

#[test]
fn undefined_names_are_runtime_errors() {
    let diag = eval_err("nope");
    assert_eq!(diag.category, Category::Eval);
    assert_eq!(diag.code.as_deref(), Some("E0003"));

    let diag = eval_err(r#"let f(a) a f("x", "y")"#);
    assert!(diag.message.contains("arity 2"));
}

// -- Prefixes --

#[test]
fn prefix_qualifies_definitions() {
    assert_eq!(eval(r#"prefix "a/" { let f(x) x } a/f("ok")"#), "ok");
}

#[test]
fn prefix_definition_equals_qualified_definition() {
    assert_eq!(eval(r#"prefix "p/" { let i "val" } p/i"#), "val");
    assert_eq!(eval(r#"let p/i "val" p/i"#), "val");
}

#[test]
fn prefixes_nest_by_concatenation() {
    assert_eq!(eval(r#"prefix "a/" { prefix "b/" { let f "x" } } a/b/f"#), "x");
}

#[test]
fn lookup_walks_prefix_suffixes_deepest_first() {
    // Inside the prefix, `f` resolves to `a/f` before the bare `f`.
    assert_eq!(
        eval(r#"let f "bare" prefix "a/" { let f "qualified" var r f } a/r"#),
        "qualified"
    );
    // Without a qualified match the bare name is the fallback.
    assert_eq!(
        eval(r#"let g "bare" prefix "a/" { var r g } a/r"#),
        "bare"
    );
}

#[test]
fn prefix_names_are_evaluated_values() {
    assert_eq!(
        eval(r#"let ns "n/" prefix ns { let f "x" } n/f"#),
        "x"
    );
}

#[test]
fn prefix_blocks_emit_their_expression_statements() {
    assert_eq!(eval(r#"prefix "a/" { let f "x" f }"#), "x");
}

// -- Strings --

#[test]
fn escape_sequences_decode_to_bytes() {
    assert_eq!(eval(r#""\x48\x69""#), "Hi");
    assert_eq!(eval(r#""line\nbreak""#), "line\nbreak");
}

#[test]
fn hex_and_bin_literals_evaluate_to_their_bytes() {
    assert_eq!(eval("0x48_69"), "Hi");
    assert_eq!(eval("0b01001000"), "H");
}

#[test]
fn code_strings_dedent() {
    assert_eq!(
        eval("c#\"   int x = 1;\n   int y = 2;\n\"#"),
        "int x = 1;\nint y = 2;"
    );
}

#[test]
fn paragraph_strings_flow_whitespace() {
    assert_eq!(eval("p#\" alpha\n  beta \"#"), "alpha beta");
}

#[test]
fn raw_strings_do_not_interpret_escapes() {
    assert_eq!(eval(r##"r#"a\nb"#"##), "a\\nb");
}

#[test]
fn stringify_names_evaluate_to_themselves() {
    assert_eq!(eval("!foo"), "foo");
}

// -- Map --

#[test]
fn map_takes_the_first_matching_arm() {
    assert_eq!(eval(r#"map "b" { "a" -> "1" "b" -> "2" * -> "3" }"#), "2");
    assert_eq!(eval(r#"map "z" { "a" -> "1" "b" -> "2" * -> "3" }"#), "3");
    assert_eq!(eval(r#"map "z" { "a" -> "1" }"#), "");
}

#[test]
fn map_does_not_evaluate_unchosen_arms() {
    // The error arm after the match must never run.
    assert_eq!(
        eval(r#"map "a" { "a" -> "hit" "b" -> error("never evaluated") }"#),
        "hit"
    );
}

#[test]
fn map_patterns_see_the_environment() {
    assert_eq!(
        eval(r#"let key "k" map "k" { key -> "matched" * -> "missed" }"#),
        "matched"
    );
}

// -- Meta-evaluation --

#[test]
fn source_definitions_persist() {
    assert_eq!(eval(r#"source("let f(x) x .. x") .. f("a")"#), "aa");
}

#[test]
fn eval_is_an_alias_of_source() {
    assert_eq!(eval(r#"eval("\"generated\"")"#), "generated");
}

#[test]
fn codeify_reparses_the_value() {
    assert_eq!(eval(r#"var c "\"X\" .. \"Y\"" =c"#), "XY");
}

#[test]
fn codeify_sees_the_current_environment() {
    assert_eq!(eval(r#"let f(x) x =!f .. "(\"ok\")""#), "ok");
}

#[test]
fn errors_inside_meta_evaluated_fragments_propagate() {
    let diag = eval_err(r#"source("missing")"#);
    assert_eq!(diag.category, Category::Eval);

    let diag = eval_err(r#"source("let broken")"#);
    assert_eq!(diag.category, Category::Parse);
}

// -- Intrinsics --

#[test]
fn length_counts_bytes() {
    assert_eq!(eval(r#"length("hello")"#), "5");
    assert_eq!(eval(r#"length("")"#), "0");
    assert_eq!(eval(r#"length("\x00\x01")"#), "2");
}

#[test]
fn slice_takes_byte_ranges() {
    assert_eq!(eval(r#"slice("hello", "1", "3")"#), "ell");
    assert_eq!(eval(r#"slice("hello", "-4", "3")"#), "ell");
    assert_eq!(eval(r#"slice("hello", "0", "0")"#), "");
}

#[test]
fn slice_out_of_range_fails() {
    let diag = eval_err(r#"slice("hello", "3", "9")"#);
    assert!(diag.message.contains("slice out of range"));

    let diag = eval_err(r#"slice("hello", "x", "1")"#);
    assert!(diag.message.contains("decimal integer"));
}

#[test]
fn find_reports_a_decimal_index_or_minus_one() {
    assert_eq!(eval(r#"find("hello", "llo")"#), "2");
    assert_eq!(eval(r#"find("hello", "zzz")"#), "-1");
    assert_eq!(eval(r#"find("hello", "")"#), "0");
}

#[test]
fn assert_passes_on_equal_bytes_and_fails_otherwise() {
    assert_eq!(eval(r#"assert("a", "a") "after""#), "after");

    let diag = eval_err(r#"assert("a", "b")"#);
    assert!(diag.message.contains("assertion failed"));
}

#[test]
fn error_raises_with_the_given_message() {
    let diag = eval_err(r#"error("boom")"#);
    assert_eq!(diag.category, Category::Eval);
    assert!(diag.message.contains("boom"));
}

#[test]
fn escape_renders_non_printables() {
    assert_eq!(eval(r#"escape("a\nb")"#), "a\\nb");
    assert_eq!(eval(r#"escape("\x00")"#), "\\x00");
}

#[test]
fn log_yields_empty_bytes() {
    assert_eq!(eval(r#"log("diagnostic") "output""#), "output");
}

#[test]
fn intrinsic_arity_mismatch_fails() {
    let diag = eval_err(r#"length("a", "b")"#);
    assert!(diag.message.contains("expects 1 argument"));
}

#[test]
fn file_reads_relative_to_the_search_root() {
    let dir = std::env::temp_dir().join(format!("wpp-file-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    std::fs::write(dir.join("fragment.txt"), b"from disk").expect("temp write should succeed");

    let mut evaluator = Evaluator::new(EvalConfig {
        enable_exec: true,
        search_root: dir.clone(),
    });
    let output = evaluator
        .eval_source("<test>", br#"file("fragment.txt")"#)
        .expect("evaluation should succeed");
    assert_eq!(output, b"from disk");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn file_not_found_fails() {
    let diag = eval_err(r#"file("definitely-missing-file.txt")"#);
    assert!(diag.message.contains("failed to read"));
}

#[cfg(unix)]
#[test]
fn run_captures_stdout() {
    assert_eq!(eval(r#"run("echo hi")"#), "hi\n");
}

#[cfg(unix)]
#[test]
fn pipe_feeds_stdin() {
    assert_eq!(eval(r#"pipe("cat", "data")"#), "data");
}

#[cfg(unix)]
#[test]
fn run_nonzero_exit_fails() {
    let diag = eval_err(r#"run("exit 3")"#);
    assert!(diag.message.contains("exited with"));
}

#[test]
fn run_can_be_disabled() {
    let mut evaluator = Evaluator::new(EvalConfig {
        enable_exec: false,
        search_root: std::env::temp_dir(),
    });
    let diag = evaluator
        .eval_source("<test>", br#"run("echo hi")"#)
        .expect_err("run should be rejected");
    assert!(diag.message.contains("disabled"));
}

// -- REPL support --

#[test]
fn snapshot_and_restore_roll_back_definitions() {
    let mut evaluator = Evaluator::new(EvalConfig::default());
    evaluator
        .eval_source("<repl:1>", br#"let kept "k""#)
        .expect("evaluation should succeed");

    let snapshot = evaluator.snapshot();
    evaluator
        .eval_source("<repl:2>", br#"let discarded "d""#)
        .expect("evaluation should succeed");
    evaluator.restore(snapshot);

    assert_eq!(
        evaluator
            .eval_source("<repl:3>", b"kept")
            .expect("evaluation should succeed"),
        b"k"
    );
    assert!(evaluator.eval_source("<repl:4>", b"discarded").is_err());
}

#[test]
fn length_matches_evaluated_byte_count() {
    for source in [r#""hello""#, "0x48_69", "p#\" a  b \"#", r#""\b01001000""#] {
        let value = eval_bytes(source);
        let counted = eval(&format!("length({source})"));
        assert_eq!(counted, value.len().to_string(), "for source {source}");
    }
}
