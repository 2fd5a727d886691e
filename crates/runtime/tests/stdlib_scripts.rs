//! The `std` library exercised from script code.

use asteria_runtime::{ErrorKind, Script, Value};

fn run_with_args(source: &str, args: Vec<Value>) -> Value {
    let mut script = Script::default();
    script.load_string("stdlib.ast", 1, source.as_bytes()).unwrap();
    script.execute(args).unwrap()
}

fn run(source: &str) -> Value {
    run_with_args(source, Vec::new())
}

#[test]
fn chrono_format_parse_round_trip() {
    let source = r#"
        var t = __varg(0);
        return std.chrono.utc_parse(std.chrono.utc_format(t, true)) == t;
    "#;
    for t in [-11_644_473_600_000i64, -1, 0, 86_400_000, 1_136_073_600_123] {
        assert_eq!(
            run_with_args(source, vec![Value::Integer(t)]),
            Value::Boolean(true),
            "round-trip of {}",
            t
        );
    }
}

#[test]
fn chrono_parse_failure_is_null() {
    assert_eq!(
        run(r#"return std.chrono.utc_parse("not a time");"#),
        Value::Null
    );
}

#[test]
fn chrono_clocks_are_numbers() {
    let result = run(
        "return [std.chrono.utc_now(), std.chrono.local_now(), \
         std.chrono.steady_now(), std.chrono.hires_now()];",
    );
    let values = result.as_array().unwrap();
    assert!(matches!(values[0], Value::Integer(_)));
    assert!(matches!(values[1], Value::Integer(_)));
    assert!(matches!(values[2], Value::Integer(_)));
    assert!(matches!(values[3], Value::Real(_)));
}

#[test]
fn chrono_local_conversions_invert() {
    let source = r#"
        var t = 1136073600000;
        return std.chrono.utc_from_local(std.chrono.local_from_utc(t)) == t;
    "#;
    assert_eq!(run(source), Value::Boolean(true));
}

#[test]
fn chrono_wrong_arguments_mismatch() {
    let mut script = Script::default();
    script
        .load_string("stdlib.ast", 1, br#"return std.chrono.utc_format("nope");"#)
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArgumentMismatch);
    assert!(err.message().contains("std.chrono.utc_format"));
}

#[test]
fn ini_format_skips_arrays_and_functions() {
    let source = r#"
        var o = { keep: 1, drop: [1, 2], f: func () { return 0; }, sec: { a: "b" } };
        return std.ini.format(o);
    "#;
    assert_eq!(
        run(source),
        Value::string("keep=1\r\n\r\n[sec]\r\na=b\r\n")
    );
}

#[test]
fn ini_parse_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.ini");
    std::fs::write(&path, "x = 1\n[s]\ny = 2\n").unwrap();

    let source = r#"
        var o = std.ini.parse_file(__varg(0));
        return [o.x, o.s.y];
    "#;
    let result = run_with_args(
        source,
        vec![Value::string(path.to_string_lossy().as_bytes())],
    );
    assert_eq!(
        result,
        Value::Array(vec![Value::string("1"), Value::string("2")])
    );
}

#[test]
fn filesystem_write_read_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.bin");

    let source = r#"
        var path = __varg(0);
        std.filesystem.file_write(path, "payload");
        var info = std.filesystem.get_information(path);
        return [std.filesystem.file_read(path), info.n_size, info.b_dir];
    "#;
    let result = run_with_args(
        source,
        vec![Value::string(path.to_string_lossy().as_bytes())],
    );
    assert_eq!(
        result,
        Value::Array(vec![
            Value::string("payload"),
            Value::Integer(7),
            Value::Boolean(false),
        ])
    );
}

#[test]
fn filesystem_stream_invokes_the_callback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.bin");
    std::fs::write(&path, b"abcdef").unwrap();

    let source = r#"
        var chunks = [];
        var count = 0;
        var streamed = std.filesystem.file_stream(__varg(0), func (offset, data) {
            chunks[count] = [offset, data];
            count += 1;
        }, 2);
        return [streamed, chunks[0]];
    "#;
    let result = run_with_args(
        source,
        vec![Value::string(path.to_string_lossy().as_bytes())],
    );
    let parts = result.as_array().unwrap();
    assert_eq!(parts[0], Value::Integer(4));
    assert_eq!(
        parts[1],
        Value::Array(vec![Value::Integer(2), Value::string("cdef")])
    );
}

#[test]
fn filesystem_negative_offset_is_an_argument_failure() {
    let mut script = Script::default();
    script
        .load_string(
            "stdlib.ast",
            1,
            br#"return std.filesystem.file_read("whatever", -3);"#,
        )
        .unwrap();
    let err = script.execute(Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn filesystem_dir_operations() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("nested");

    let source = r#"
        var path = __varg(0);
        var created = std.filesystem.dir_create(path);
        var again = std.filesystem.dir_create(path);
        var removed = std.filesystem.dir_remove(path);
        return [created, again, removed];
    "#;
    let result = run_with_args(
        source,
        vec![Value::string(sub.to_string_lossy().as_bytes())],
    );
    assert_eq!(
        result,
        Value::Array(vec![Value::Integer(1), Value::Integer(0), Value::Integer(1)])
    );
}

#[test]
fn std_members_can_be_replaced_by_the_host() {
    let mut script = Script::default();
    script
        .global()
        .set_std_member("filesystem", Value::Null)
        .unwrap();
    script
        .load_string("stdlib.ast", 1, b"return std.filesystem;")
        .unwrap();
    assert_eq!(script.execute(Vec::new()).unwrap(), Value::Null);
}
