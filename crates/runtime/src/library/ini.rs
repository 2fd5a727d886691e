//! `std.ini`: the INI object notation
//!
//! Grammar: `key = value` property lines, optionally grouped under
//! `[section]` headers. Comments start at `;` or `#` and run to end of
//! line. Input lines end with LF; a preceding CR is stripped. Emission
//! uses CRLF, writes top-level scalar properties before sections, and
//! rejects keys or values containing `[ ] = ; #` or edge whitespace.
//! Parsed property values are always strings.

use crate::bindings::ArgumentReader;
use crate::library::add_binding;
use crate::reference::Reference;
use crate::value::{Object, Value};
use asteria_core::{Error, ErrorKind, Result};
use std::path::Path;

const REJECT: &[u8] = b"[]=;#";
const COMMENT: &[u8] = b";#";
const SPACE: &[u8] = b" \t";

fn is_space(b: u8) -> bool {
    SPACE.contains(&b)
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = match bytes.iter().position(|b| !is_space(*b)) {
        Some(p) => p,
        None => return &[],
    };
    let end = bytes.iter().rposition(|b| !is_space(*b)).map_or(0, |p| p + 1);
    &bytes[start..end]
}

/// Keys and emitted string values share the same constraints.
fn check_text(what: &str, text: &[u8]) -> Result<()> {
    if what == "key" && text.is_empty() {
        return Err(Error::new(ErrorKind::Argument, "empty key is not allowed"));
    }
    if text.iter().any(|b| REJECT.contains(b)) {
        return Err(Error::new(
            ErrorKind::Argument,
            format!(
                "{} contains invalid characters: {}",
                what,
                String::from_utf8_lossy(text)
            ),
        ));
    }
    if text.first().copied().map_or(false, is_space)
        || text.last().copied().map_or(false, is_space)
    {
        return Err(Error::new(
            ErrorKind::Argument,
            format!(
                "{} shall not begin or end with a space: {}",
                what,
                String::from_utf8_lossy(text)
            ),
        ));
    }
    Ok(())
}

/// Is this value writable as a property? Strings get their content
/// checked; containers, functions and opaques are skipped silently.
fn check_scalar(value: &Value) -> Result<bool> {
    match value {
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Real(_) => Ok(true),
        Value::String(s) => {
            if !s.is_empty() {
                check_text("value", s)?;
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn put_property(out: &mut Vec<u8>, key: &str, value: &Value) -> Result<()> {
    check_text("key", key.as_bytes())?;
    out.extend_from_slice(key.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.print(false).as_bytes());
    out.extend_from_slice(b"\r\n");
    Ok(())
}

/// Render an object as INI text. Top-level scalar properties come first,
/// then one section per object-valued member.
pub fn format(value: Option<&Object>) -> Result<Vec<u8>> {
    let Some(members) = value else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let mut nlines = 0usize;

    for (key, member) in members {
        if !check_scalar(member)? {
            continue;
        }
        put_property(&mut out, key, member)?;
        nlines += 1;
    }

    for (key, member) in members {
        let Some(section) = member.as_object() else {
            continue;
        };
        if nlines != 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.push(b'[');
        check_text("key", key.as_bytes())?;
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"]\r\n");
        nlines += 1;

        for (prop_key, prop_value) in section {
            if !check_scalar(prop_value)? {
                continue;
            }
            put_property(&mut out, prop_key, prop_value)?;
            nlines += 1;
        }
    }
    Ok(out)
}

/// Parse INI text into an object of strings and section objects.
pub fn parse(text: &[u8]) -> Result<Object> {
    let mut root = Object::new();
    // Section being filled; None while at top level.
    let mut sink: Option<String> = None;

    for (line_number, raw_line) in text.split(|b| *b == b'\n').enumerate() {
        let mut line = raw_line;
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        if let Some(comment) = line.iter().position(|b| COMMENT.contains(b)) {
            line = &line[..comment];
        }
        let line = trim(line);
        if line.is_empty() {
            continue;
        }

        if line[0] == b'[' {
            if line.last() != Some(&b']') {
                return Err(Error::new(
                    ErrorKind::Argument,
                    format!("invalid section name on line {}", line_number + 1),
                ));
            }
            let name = trim(&line[1..line.len() - 1]);
            if name.is_empty() {
                return Err(Error::new(
                    ErrorKind::Argument,
                    format!("empty section name on line {}", line_number + 1),
                ));
            }
            let name = String::from_utf8_lossy(name).into_owned();
            // Reopening a section keeps what it already holds.
            if !matches!(root.get(name.as_str()), Some(Value::Object(_))) {
                root.insert(name.clone(), Value::Object(Object::new()));
            }
            sink = Some(name);
            continue;
        }

        let (key, value) = match line.iter().position(|b| *b == b'=') {
            Some(eq) => {
                let key = trim(&line[..eq]);
                if key.is_empty() {
                    return Err(Error::new(
                        ErrorKind::Argument,
                        format!("empty property name on line {}", line_number + 1),
                    ));
                }
                (key, trim(&line[eq + 1..]))
            }
            // A bare word is a key with an empty value.
            None => (line, &line[0..0]),
        };
        let key = String::from_utf8_lossy(key).into_owned();
        let value = Value::string(value);

        match &sink {
            None => {
                root.insert(key, value);
            }
            Some(section) => {
                if let Some(Value::Object(members)) = root.get_mut(section.as_str()) {
                    members.insert(key, value);
                }
            }
        }
    }
    Ok(root)
}

pub fn parse_file(path: &Path) -> Result<Object> {
    let text = std::fs::read(path).map_err(|e| {
        Error::new(
            ErrorKind::Resource,
            format!("could not open file '{}': {}", path.display(), e),
        )
    })?;
    parse(&text)
}

// ----- bindings -----------------------------------------------------------

pub fn create_bindings(members: &mut Object, _api_version: u32) {
    add_binding(
        members,
        "format",
        "std.ini.format",
        "`std.ini.format([object])`\n\
         \n\
         * Renders an object as INI text: scalar members become top-level\n\
           properties, object members become sections. Other values are\n\
           skipped.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.ini.format", &args)?;
            let mut object: Option<Object> = None;
            reader.start_overload();
            reader.optional(&mut object);
            if reader.end_overload() {
                let text = format(object.as_ref())?;
                return Ok(Reference::temporary(Value::string(text)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "parse",
        "std.ini.parse",
        "`std.ini.parse(text)`\n\
         \n\
         * Parses INI text into an object. Property values are strings.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.ini.parse", &args)?;
            let mut text = Vec::new();
            reader.start_overload();
            reader.required(&mut text);
            if reader.end_overload() {
                return Ok(Reference::temporary(Value::Object(parse(&text)?)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "parse_file",
        "std.ini.parse_file",
        "`std.ini.parse_file(path)`\n\
         \n\
         * Reads and parses an INI file.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.ini.parse_file", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let object = parse_file(&crate::library::filesystem::bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Object(object)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Object {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_format_properties_then_sections() {
        let members = obj(&[
            ("sec", Value::Object(obj(&[("k", Value::string("v"))]))),
            ("top", Value::string("1")),
            ("n", Value::Integer(7)),
        ]);
        let text = format(Some(&members)).unwrap();
        assert_eq!(
            text,
            b"top=1\r\nn=7\r\n\r\n[sec]\r\nk=v\r\n".to_vec()
        );
    }

    #[test]
    fn test_format_none_is_empty() {
        assert_eq!(format(None).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_format_skips_non_scalars_inside_sections() {
        let members = obj(&[(
            "sec",
            Value::Object(obj(&[
                ("list", Value::Array(vec![Value::Integer(1)])),
                ("ok", Value::Boolean(true)),
            ])),
        )]);
        let text = format(Some(&members)).unwrap();
        assert_eq!(text, b"[sec]\r\nok=true\r\n".to_vec());
    }

    #[test]
    fn test_format_rejects_bad_keys_and_values() {
        let bad_key = obj(&[("a=b", Value::string("v"))]);
        assert_eq!(
            format(Some(&bad_key)).unwrap_err().kind(),
            ErrorKind::Argument
        );
        let bad_value = obj(&[("k", Value::string("x;y"))]);
        assert_eq!(
            format(Some(&bad_value)).unwrap_err().kind(),
            ErrorKind::Argument
        );
        let edge_space = obj(&[("k", Value::string(" v"))]);
        assert_eq!(
            format(Some(&edge_space)).unwrap_err().kind(),
            ErrorKind::Argument
        );
        let empty_key = obj(&[("", Value::string("v"))]);
        assert_eq!(
            format(Some(&empty_key)).unwrap_err().kind(),
            ErrorKind::Argument
        );
    }

    #[test]
    fn test_parse_sections_comments_and_crlf() {
        let text = b"top = 1 ; trailing comment\r\n\
                     # full comment line\n\
                     [ sec ]\n\
                     k = v\n\
                     bare\n";
        let root = parse(text).unwrap();
        assert_eq!(root["top"], Value::string("1"));
        let sec = root["sec"].as_object().unwrap();
        assert_eq!(sec["k"], Value::string("v"));
        assert_eq!(sec["bare"], Value::string(""));
    }

    #[test]
    fn test_parse_empty_sections_are_permitted() {
        let root = parse(b"[empty]\n[also]\n").unwrap();
        assert!(root["empty"].as_object().unwrap().is_empty());
        assert!(root["also"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_sections() {
        assert_eq!(parse(b"[oops\n").unwrap_err().kind(), ErrorKind::Argument);
        assert_eq!(parse(b"[ ]\n").unwrap_err().kind(), ErrorKind::Argument);
        assert_eq!(parse(b" = v\n").unwrap_err().kind(), ErrorKind::Argument);
    }

    #[test]
    fn test_round_trip() {
        let members = obj(&[
            ("top", Value::string("1")),
            ("sec", Value::Object(obj(&[("k", Value::string("v"))]))),
        ]);
        let text = format(Some(&members)).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(Value::Object(parsed), Value::Object(members));
    }

    #[test]
    fn test_parse_file_missing_is_a_resource_failure() {
        let err = parse_file(Path::new("/definitely/not/here.ini")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
