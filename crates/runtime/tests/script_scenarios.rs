//! End-to-end scenarios through the public `Script` API.

use asteria_runtime::{ErrorKind, Script, Value};

fn run(source: &str) -> Value {
    let mut script = Script::default();
    script.load_string("scenario.ast", 1, source.as_bytes()).unwrap();
    script.execute(Vec::new()).unwrap()
}

fn run_with_args(source: &str, args: Vec<Value>) -> Value {
    let mut script = Script::default();
    script.load_string("scenario.ast", 1, source.as_bytes()).unwrap();
    script.execute(args).unwrap()
}

#[test]
fn auto_growing_assignment() {
    let result = run("var a = []; a[2] = \"x\"; return a;");
    assert_eq!(
        result,
        Value::Array(vec![Value::Null, Value::Null, Value::string("x")])
    );
}

#[test]
fn variadic_count() {
    let result = run("func f(a, ...) { return __varg(); } return f(1, 2, 3, 4);");
    assert_eq!(result, Value::Integer(3));
}

#[test]
fn variadic_elements() {
    let result = run(
        "func f(a, ...) { return [__varg(0), __varg(2), __varg(3)]; } return f(1, 2, 3, 4);",
    );
    assert_eq!(
        result,
        Value::Array(vec![Value::Integer(2), Value::Integer(4), Value::Null])
    );
}

#[test]
fn switch_fallthrough() {
    let source = r#"
        var r = "";
        switch (2) {
        case 1: r += "a";
        case 2: r += "b";
        case 3: r += "c"; break;
        case 4: r += "d";
        }
        return r;
    "#;
    assert_eq!(run(source), Value::string("bc"));
}

#[test]
fn throw_catch_with_backtrace() {
    let source = r#"
        func g() { throw { code: 7 }; }
        try { g(); } catch (e) { return [e.value.code, e.backtrace]; }
    "#;
    let result = run(source);
    let parts = result.as_array().unwrap();
    assert_eq!(parts[0], Value::Integer(7));

    let backtrace = parts[1].as_array().unwrap();
    assert!(!backtrace.is_empty(), "backtrace must not be empty");
    // The innermost frames: the throw site, then the enclosing function.
    let first = backtrace[0].as_object().unwrap();
    assert_eq!(first["function"], Value::string("<throw>"));
    let second = backtrace[1].as_object().unwrap();
    assert_eq!(second["function"], Value::string("g"));
    assert_eq!(second["file"], Value::string("scenario.ast"));
}

#[test]
fn ternary_with_assignment_and_short_circuit() {
    let source = r#"
        var d = 1.5;
        var i = 3;
        var a = [];
        a[1] = !null ? (d++ + 0.25) : (i * "x");
        return [d, a[1]];
    "#;
    assert_eq!(
        run(source),
        Value::Array(vec![Value::Real(2.5), Value::Real(1.75)])
    );
}

#[test]
fn ini_round_trip() {
    let source = r#"return std.ini.parse(std.ini.format({ top: "1", sec: { k: "v" } }));"#;
    let result = run(source);
    let members = result.as_object().unwrap();
    assert_eq!(members["top"], Value::string("1"));
    let sec = members["sec"].as_object().unwrap();
    assert_eq!(sec["k"], Value::string("v"));
}

// ----- boundary behaviours -----------------------------------------------

#[test]
fn write_before_the_front_of_an_empty_array() {
    let result = run("var a = []; a[-1] = 5; return a;");
    assert_eq!(result, Value::Array(vec![Value::Integer(5)]));
}

#[test]
fn write_past_the_back_extends_with_nulls() {
    let result = run("var a = [1, 2]; a[5] = 9; return a;");
    assert_eq!(
        result,
        Value::Array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Integer(9),
        ])
    );
}

#[test]
fn missing_member_reads_null_and_writes_create() {
    let result = run(
        "var o = {}; var before = o.missing; o.missing = 1; return [before, o.missing];",
    );
    assert_eq!(
        result,
        Value::Array(vec![Value::Null, Value::Integer(1)])
    );
}

#[test]
fn integer_division_overflow_fails_arithmetic() {
    let mut script = Script::default();
    script
        .load_string(
            "scenario.ast",
            1,
            b"var min = -9223372036854775807 - 1; return min / -1;",
        )
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
}

#[test]
fn utc_format_extremes_via_script() {
    let source = r#"
        var min = -9223372036854775807 - 1;
        var max = 9223372036854775807;
        return [
            std.chrono.utc_format(min),
            std.chrono.utc_format(min, true),
            std.chrono.utc_format(max),
            std.chrono.utc_format(max, true),
        ];
    "#;
    assert_eq!(
        run(source),
        Value::Array(vec![
            Value::string("1601-01-01 00:00:00"),
            Value::string("1601-01-01 00:00:00.000"),
            Value::string("9999-01-01 00:00:00"),
            Value::string("9999-01-01 00:00:00.000"),
        ])
    );
}

// ----- rendering ----------------------------------------------------------

#[test]
fn rendered_scalars_parse_back_to_equal_values() {
    let scalars = vec![
        Value::Null,
        Value::Boolean(true),
        Value::Boolean(false),
        Value::Integer(0),
        Value::Integer(-42),
        Value::Integer(i64::MAX),
        Value::Real(1.5),
        Value::Real(-0.25),
        Value::Real(2.0),
        Value::Real(1e100),
        Value::string("plain"),
        Value::string("quote \" backslash \\ tab \t"),
        Value::string(b"raw \xFF byte"),
    ];
    for value in scalars {
        let rendered = value.print(true);
        let source = format!("return {};", rendered);
        let reparsed = run(&source);
        assert_eq!(reparsed, value, "round-trip via '{}'", rendered);
        // The re-parse also preserves the type tag, not just equality.
        assert_eq!(reparsed.type_name(), value.type_name());
    }
}

// ----- determinism --------------------------------------------------------

#[test]
fn equal_programs_in_fresh_globals_produce_equal_results() {
    let source = r#"
        var trace = [];
        var o = { a: 1 };
        for (var i = 0; i < 5; ++i) { trace[i] = i * i; }
        o.sum = trace[3] + trace[4];
        return [trace, o];
    "#;
    let first = run(source);
    let second = run(source);
    assert_eq!(first, second);
}

// ----- language odds and ends ---------------------------------------------

#[test]
fn scripts_see_their_arguments_as_the_variadic_tail() {
    let result = run_with_args(
        "return [__varg(), __varg(0), __varg(1)];",
        vec![Value::string("one"), Value::Integer(2)],
    );
    assert_eq!(
        result,
        Value::Array(vec![
            Value::Integer(2),
            Value::string("one"),
            Value::Integer(2),
        ])
    );
}

#[test]
fn closures_capture_variables_not_values() {
    let source = r#"
        func make_counter() {
            var n = 0;
            return func () { n += 1; return n; };
        }
        var c = make_counter();
        c();
        c();
        return c();
    "#;
    assert_eq!(run(source), Value::Integer(3));
}

#[test]
fn two_closures_share_one_captured_variable() {
    let source = r#"
        func make_pair() {
            var n = 0;
            var bump = func () { n += 1; return n; };
            var read = func () { return n; };
            return [bump, read];
        }
        var pair = make_pair();
        pair[0]();
        pair[0]();
        return pair[1]();
    "#;
    assert_eq!(run(source), Value::Integer(2));
}

#[test]
fn stray_break_escaping_a_function_is_fatal() {
    let mut script = Script::default();
    script
        .load_string("scenario.ast", 1, b"func f() { break; } return f();")
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StrayControl);
}

#[test]
fn frozen_variables_reject_assignment() {
    let mut script = Script::default();
    script
        .load_string("scenario.ast", 1, b"const k = 1; k = 2;")
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableAssign);
}

#[test]
fn undeclared_identifier_surfaces_as_unset_member() {
    let mut script = Script::default();
    script
        .load_string("scenario.ast", 1, b"return not_declared_anywhere;")
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsetMember);
}

#[test]
fn uncaught_failures_carry_ordered_frames() {
    let source = r#"
        func inner() { throw "boom"; }
        func outer() { return inner(); }
        return outer();
    "#;
    let mut script = Script::default();
    script.load_string("scenario.ast", 1, source.as_bytes()).unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);

    let functions: Vec<&str> = err.frames().iter().map(|f| f.function.as_str()).collect();
    assert_eq!(functions, vec!["<throw>", "inner", "outer", "<top level>"]);
}

#[test]
fn cyclic_captures_are_reclaimed_by_the_collector() {
    let source = r#"
        func leak_one_cycle() {
            var f = func () { return f; };
            return null;
        }
        leak_one_cycle();
        return null;
    "#;
    let mut script = Script::default();
    script.load_string("scenario.ast", 1, source.as_bytes()).unwrap();
    script.execute(Vec::new()).unwrap();
    // The self-capturing closure is unreachable now; one pass wipes it.
    assert!(script.global().collect_garbage() >= 1);
    // A second pass finds nothing new.
    assert_eq!(script.global().collect_garbage(), 0);
}

#[test]
fn method_calls_bind_the_receiver() {
    let source = r#"
        var account = { balance: 100 };
        account.deposit = func (amount) { __this.balance += amount; return __this.balance; };
        account.deposit(50);
        return account.balance;
    "#;
    assert_eq!(run(source), Value::Integer(150));
}
