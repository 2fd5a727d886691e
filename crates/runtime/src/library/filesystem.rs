//! `std.filesystem`: paths, directories, and whole-file I/O
//!
//! Paths are byte strings, passed to the OS untranslated on Unix. Removal
//! and creation report how many items they affected, returning 0 when the
//! goal already held. OS failures surface as `resource` failures carrying
//! the underlying error text; violated preconditions (such as a negative
//! offset) are `argument` failures.

use crate::bindings::ArgumentReader;
use crate::function::Callable;
use crate::global::GlobalContext;
use crate::library::add_binding;
use crate::reference::Reference;
use crate::value::{Object, Value};
use asteria_core::{Error, ErrorKind, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Streaming and whole-file reads grow their batch up to this size.
const BATCH_LIMIT: usize = 0x100000; // 1 MiB
const BATCH_INITIAL: usize = 0x1000;

#[cfg(unix)]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).into()
}

#[cfg(not(unix))]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    String::from_utf8_lossy(bytes).into_owned().into()
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

fn io_failure(action: &str, path: &Path, err: io::Error) -> Error {
    Error::new(
        ErrorKind::Resource,
        format!("could not {} '{}': {}", action, path.display(), err),
    )
}

fn negative_offset(offset: i64) -> Error {
    Error::new(
        ErrorKind::Argument,
        format!("negative file offset (offset `{}`)", offset),
    )
}

// ----- operations ---------------------------------------------------------

pub fn get_working_directory() -> Result<Vec<u8>> {
    let cwd = std::env::current_dir()
        .map_err(|e| Error::new(ErrorKind::Resource, format!("could not get working directory: {}", e)))?;
    Ok(path_to_bytes(&cwd))
}

pub fn get_real_path(path: &Path) -> Result<Vec<u8>> {
    let resolved = fs::canonicalize(path).map_err(|e| io_failure("resolve path", path, e))?;
    Ok(path_to_bytes(&resolved))
}

/// Information about a path without following symlinks, or None when the
/// path does not exist.
pub fn get_information(path: &Path) -> Option<Object> {
    let meta = fs::symlink_metadata(path).ok()?;
    let mut stat = Object::new();

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        stat.insert("i_dev".to_string(), Value::Integer(meta.dev() as i64));
        stat.insert("i_file".to_string(), Value::Integer(meta.ino() as i64));
        stat.insert("n_ref".to_string(), Value::Integer(meta.nlink() as i64));
    }
    #[cfg(not(unix))]
    {
        stat.insert("i_dev".to_string(), Value::Integer(0));
        stat.insert("i_file".to_string(), Value::Integer(0));
        stat.insert("n_ref".to_string(), Value::Integer(1));
    }

    stat.insert("b_dir".to_string(), Value::Boolean(meta.is_dir()));
    stat.insert(
        "b_sym".to_string(),
        Value::Boolean(meta.file_type().is_symlink()),
    );
    stat.insert("n_size".to_string(), Value::Integer(meta.len() as i64));

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        stat.insert("n_ocup".to_string(), Value::Integer(meta.blocks() as i64 * 512));
        stat.insert(
            "t_accs".to_string(),
            Value::Integer(meta.atime() * 1000 + meta.atime_nsec() / 1_000_000),
        );
        stat.insert(
            "t_mod".to_string(),
            Value::Integer(meta.mtime() * 1000 + meta.mtime_nsec() / 1_000_000),
        );
    }
    #[cfg(not(unix))]
    {
        stat.insert("n_ocup".to_string(), Value::Integer(meta.len() as i64));
        stat.insert("t_accs".to_string(), Value::Integer(0));
        stat.insert("t_mod".to_string(), Value::Integer(0));
    }

    Some(stat)
}

pub fn move_from(path_new: &Path, path_old: &Path) -> Result<()> {
    fs::rename(path_old, path_new).map_err(|e| io_failure("move file", path_old, e))
}

/// Remove a file or a directory tree. Returns the number of filesystem
/// entries removed; a missing path removes nothing and is not a failure.
pub fn remove_recursive(path: &Path) -> Result<i64> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(io_failure("inspect", path, e)),
    };
    if !meta.is_dir() {
        fs::remove_file(path).map_err(|e| io_failure("remove file", path, e))?;
        return Ok(1);
    }
    let mut count = 0;
    let entries = fs::read_dir(path).map_err(|e| io_failure("open directory", path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_failure("list directory", path, e))?;
        count += remove_recursive(&entry.path())?;
    }
    fs::remove_dir(path).map_err(|e| io_failure("remove directory", path, e))?;
    Ok(count + 1)
}

/// List a directory as an object of `{ b_dir, b_sym }` entries keyed by
/// file name.
pub fn dir_list(path: &Path) -> Result<Object> {
    let entries = fs::read_dir(path).map_err(|e| io_failure("open directory", path, e))?;
    let mut listing = Object::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_failure("list directory", path, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| io_failure("inspect entry of", path, e))?;
        let mut member = Object::new();
        member.insert("b_dir".to_string(), Value::Boolean(file_type.is_dir()));
        member.insert("b_sym".to_string(), Value::Boolean(file_type.is_symlink()));
        let name = String::from_utf8_lossy(&path_to_bytes(Path::new(&entry.file_name()))).into_owned();
        listing.insert(name, Value::Object(member));
    }
    Ok(listing)
}

/// Create a directory; 1 when created, 0 when one already existed.
pub fn dir_create(path: &Path) -> Result<i64> {
    match fs::create_dir(path) {
        Ok(()) => Ok(1),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let meta = fs::metadata(path).map_err(|e| io_failure("inspect", path, e))?;
            if meta.is_dir() {
                Ok(0)
            } else {
                Err(io_failure("create directory", path, e))
            }
        }
        Err(e) => Err(io_failure("create directory", path, e)),
    }
}

/// Remove an empty directory; 1 when removed, 0 when already gone.
pub fn dir_remove(path: &Path) -> Result<i64> {
    match fs::remove_dir(path) {
        Ok(()) => Ok(1),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_failure("remove directory", path, e)),
    }
}

/// Read a file, optionally from an offset and up to a limit. Batches grow
/// geometrically so small files stay cheap.
pub fn file_read(path: &Path, offset: Option<i64>, limit: Option<i64>) -> Result<Vec<u8>> {
    if let Some(offset) = offset {
        if offset < 0 {
            return Err(negative_offset(offset));
        }
    }
    let mut file = File::open(path).map_err(|e| io_failure("open file", path, e))?;
    if let Some(offset) = offset {
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(|e| io_failure("seek in file", path, e))?;
    }

    let mut remaining = limit.unwrap_or(i64::MAX).max(0) as usize;
    let mut batch = BATCH_INITIAL;
    let mut data = Vec::new();
    let mut chunk = vec![0u8; 0];
    while remaining != 0 {
        batch = (batch * 2).min(BATCH_LIMIT).min(remaining);
        chunk.resize(batch, 0);
        let n = file
            .read(&mut chunk)
            .map_err(|e| io_failure("read file", path, e))?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }
    Ok(data)
}

/// Stream a file through a callback invoked as `(offset, chunk)`; its
/// return value is ignored. Returns the number of bytes streamed.
pub fn file_stream(
    global: &GlobalContext,
    path: &Path,
    callback: &Rc<dyn Callable>,
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<i64> {
    if let Some(offset) = offset {
        if offset < 0 {
            return Err(negative_offset(offset));
        }
    }
    let mut file = File::open(path).map_err(|e| io_failure("open file", path, e))?;
    let mut position = offset.unwrap_or(0);
    if offset.is_some() {
        file.seek(SeekFrom::Start(position as u64))
            .map_err(|e| io_failure("seek in file", path, e))?;
    }

    let mut remaining = limit.unwrap_or(i64::MAX).max(0) as usize;
    let mut batch = BATCH_INITIAL;
    let mut streamed = 0i64;
    let mut chunk = vec![0u8; 0];
    while remaining != 0 {
        batch = (batch * 2).min(BATCH_LIMIT).min(remaining);
        chunk.resize(batch, 0);
        let n = file
            .read(&mut chunk)
            .map_err(|e| io_failure("read file", path, e))?;
        if n == 0 {
            break;
        }
        callback.invoke(
            global,
            Reference::null_constant(),
            vec![
                Reference::temporary(Value::Integer(position)),
                Reference::temporary(Value::string(&chunk[..n])),
            ],
        )?;
        position += n as i64;
        streamed += n as i64;
        remaining -= n;
    }
    Ok(streamed)
}

/// Write a file. With an offset the file is truncated to that length
/// first and the data lands there; without one the file is replaced.
pub fn file_write(path: &Path, offset: Option<i64>, data: &[u8]) -> Result<()> {
    if let Some(offset) = offset {
        if offset < 0 {
            return Err(negative_offset(offset));
        }
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_failure("open file", path, e))?;
    file.set_len(offset.unwrap_or(0) as u64)
        .map_err(|e| io_failure("truncate file", path, e))?;
    let mut file = file;
    file.write_all(data)
        .map_err(|e| io_failure("write file", path, e))
}

/// Append to a file, creating it if needed. With `exclusive` the file must
/// not exist yet.
pub fn file_append(path: &Path, data: &[u8], exclusive: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).append(true);
    if exclusive {
        options.create_new(true);
    } else {
        options.create(true);
    }
    let mut file = options
        .open(path)
        .map_err(|e| io_failure("open file", path, e))?;
    file.write_all(data)
        .map_err(|e| io_failure("append to file", path, e))
}

/// Copy a file's contents and permission bits.
pub fn file_copy_from(path_new: &Path, path_old: &Path) -> Result<()> {
    fs::copy(path_old, path_new)
        .map(|_| ())
        .map_err(|e| io_failure("copy file", path_old, e))
}

/// Remove a file; 1 when removed, 0 when already gone.
pub fn file_remove(path: &Path) -> Result<i64> {
    match fs::remove_file(path) {
        Ok(()) => Ok(1),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_failure("remove file", path, e)),
    }
}

// ----- bindings -----------------------------------------------------------

pub fn create_bindings(members: &mut Object, _api_version: u32) {
    add_binding(
        members,
        "get_working_directory",
        "std.filesystem.get_working_directory",
        "`std.filesystem.get_working_directory()`\n\
         \n\
         * Returns the absolute path of the current working directory.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.get_working_directory", &args)?;
            reader.start_overload();
            if reader.end_overload() {
                return Ok(Reference::temporary(Value::string(get_working_directory()?)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "get_real_path",
        "std.filesystem.get_real_path",
        "`std.filesystem.get_real_path(path)`\n\
         \n\
         * Resolves `path` to an absolute path without symlinks.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.get_real_path", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let resolved = get_real_path(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::string(resolved)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "get_information",
        "std.filesystem.get_information",
        "`std.filesystem.get_information(path)`\n\
         \n\
         * Returns an object describing `path` (identity, kind, size and\n\
           timestamps), or `null` when it does not exist.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.get_information", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                return Ok(match get_information(&bytes_to_path(&path)) {
                    Some(stat) => Reference::temporary(Value::Object(stat)),
                    None => Reference::null_constant(),
                });
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "move_from",
        "std.filesystem.move_from",
        "`std.filesystem.move_from(path_new, path_old)`\n\
         \n\
         * Moves (renames) `path_old` to `path_new`.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.move_from", &args)?;
            let mut path_new = Vec::new();
            let mut path_old = Vec::new();
            reader.start_overload();
            reader.required(&mut path_new).required(&mut path_old);
            if reader.end_overload() {
                move_from(&bytes_to_path(&path_new), &bytes_to_path(&path_old))?;
                return Ok(Reference::null_constant());
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "remove_recursive",
        "std.filesystem.remove_recursive",
        "`std.filesystem.remove_recursive(path)`\n\
         \n\
         * Removes a file or a whole directory tree. Returns the number of\n\
           entries removed.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.remove_recursive", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let count = remove_recursive(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Integer(count)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "dir_list",
        "std.filesystem.dir_list",
        "`std.filesystem.dir_list(path)`\n\
         \n\
         * Returns an object keyed by entry name, each member holding\n\
           `{ b_dir, b_sym }`.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.dir_list", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let listing = dir_list(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Object(listing)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "dir_create",
        "std.filesystem.dir_create",
        "`std.filesystem.dir_create(path)`\n\
         \n\
         * Creates a directory. Returns 1 when created, 0 when a directory\n\
           was already there.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.dir_create", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let count = dir_create(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Integer(count)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "dir_remove",
        "std.filesystem.dir_remove",
        "`std.filesystem.dir_remove(path)`\n\
         \n\
         * Removes an empty directory. Returns 1 when removed, 0 when the\n\
           path was already gone.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.dir_remove", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let count = dir_remove(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Integer(count)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_read",
        "std.filesystem.file_read",
        "`std.filesystem.file_read(path, [offset], [limit])`\n\
         \n\
         * Reads up to `limit` bytes from `path` starting at `offset`, as a\n\
           byte string.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_read", &args)?;
            let mut path = Vec::new();
            let mut offset: Option<i64> = None;
            let mut limit: Option<i64> = None;
            reader.start_overload();
            reader
                .required(&mut path)
                .optional(&mut offset)
                .optional(&mut limit);
            if reader.end_overload() {
                let data = file_read(&bytes_to_path(&path), offset, limit)?;
                return Ok(Reference::temporary(Value::string(data)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_stream",
        "std.filesystem.file_stream",
        "`std.filesystem.file_stream(path, callback, [offset], [limit])`\n\
         \n\
         * Reads `path` in batches, invoking `callback(offset, chunk)` for\n\
           each and discarding its result. Returns the number of bytes\n\
           streamed.",
        |_opaque, global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_stream", &args)?;
            let mut path = Vec::new();
            let mut callback: Rc<dyn Callable> = NULL_CALLBACK.with(Rc::clone);
            let mut offset: Option<i64> = None;
            let mut limit: Option<i64> = None;
            reader.start_overload();
            reader
                .required(&mut path)
                .required(&mut callback)
                .optional(&mut offset)
                .optional(&mut limit);
            if reader.end_overload() {
                let streamed =
                    file_stream(global, &bytes_to_path(&path), &callback, offset, limit)?;
                return Ok(Reference::temporary(Value::Integer(streamed)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_write",
        "std.filesystem.file_write",
        "`std.filesystem.file_write(path, [offset], data)`\n\
         \n\
         * Writes `data` to `path`, truncating at `offset` (or replacing\n\
           the whole file).",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_write", &args)?;
            // Two overloads: (path, data) and (path, offset, data).
            let mut path = Vec::new();
            let mut data = Vec::new();
            reader.start_overload();
            reader.required(&mut path).required(&mut data);
            if reader.end_overload() {
                file_write(&bytes_to_path(&path), None, &data)?;
                return Ok(Reference::null_constant());
            }
            let mut offset = 0i64;
            reader.start_overload();
            reader
                .required(&mut path)
                .required(&mut offset)
                .required(&mut data);
            if reader.end_overload() {
                file_write(&bytes_to_path(&path), Some(offset), &data)?;
                return Ok(Reference::null_constant());
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_append",
        "std.filesystem.file_append",
        "`std.filesystem.file_append(path, data, [exclusive])`\n\
         \n\
         * Appends `data` to `path`, creating it if needed. With\n\
           `exclusive`, fails if the file already exists.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_append", &args)?;
            let mut path = Vec::new();
            let mut data = Vec::new();
            let mut exclusive: Option<bool> = None;
            reader.start_overload();
            reader
                .required(&mut path)
                .required(&mut data)
                .optional(&mut exclusive);
            if reader.end_overload() {
                file_append(&bytes_to_path(&path), &data, exclusive.unwrap_or(false))?;
                return Ok(Reference::null_constant());
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_copy_from",
        "std.filesystem.file_copy_from",
        "`std.filesystem.file_copy_from(path_new, path_old)`\n\
         \n\
         * Copies `path_old` to `path_new`, preserving the permission\n\
           bits.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_copy_from", &args)?;
            let mut path_new = Vec::new();
            let mut path_old = Vec::new();
            reader.start_overload();
            reader.required(&mut path_new).required(&mut path_old);
            if reader.end_overload() {
                file_copy_from(&bytes_to_path(&path_new), &bytes_to_path(&path_old))?;
                return Ok(Reference::null_constant());
            }
            Err(reader.throw_no_matching_function_call())
        },
    );

    add_binding(
        members,
        "file_remove",
        "std.filesystem.file_remove",
        "`std.filesystem.file_remove(path)`\n\
         \n\
         * Removes a file. Returns 1 when removed, 0 when the path was\n\
           already gone.",
        |_opaque, _global, _this, args| {
            let mut reader = ArgumentReader::new("std.filesystem.file_remove", &args)?;
            let mut path = Vec::new();
            reader.start_overload();
            reader.required(&mut path);
            if reader.end_overload() {
                let count = file_remove(&bytes_to_path(&path))?;
                return Ok(Reference::temporary(Value::Integer(count)));
            }
            Err(reader.throw_no_matching_function_call())
        },
    );
}

thread_local! {
    /// Placeholder initial value for required function slots; never
    /// invoked, only overwritten by the reader.
    static NULL_CALLBACK: Rc<dyn Callable> = Rc::new(NullCallback {
        location: asteria_core::SourceLocation::new("<native>", 0),
    });
}

#[derive(Debug)]
struct NullCallback {
    location: asteria_core::SourceLocation,
}

impl Callable for NullCallback {
    fn name(&self) -> &str {
        "<unset>"
    }

    fn location(&self) -> &asteria_core::SourceLocation {
        &self.location
    }

    fn invoke(
        &self,
        _global: &GlobalContext,
        _this: Reference,
        _args: Vec<Reference>,
    ) -> Result<Reference> {
        Err(Error::new(
            ErrorKind::Argument,
            "callback slot was never filled",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_file_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        file_write(&path, None, b"hello world").unwrap();
        assert_eq!(file_read(&path, None, None).unwrap(), b"hello world");
        assert_eq!(file_read(&path, Some(6), None).unwrap(), b"world");
        assert_eq!(file_read(&path, Some(0), Some(5)).unwrap(), b"hello");
    }

    #[test]
    fn test_file_write_at_offset_truncates_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        file_write(&path, None, b"0123456789").unwrap();
        file_write(&path, Some(4), b"xy").unwrap();
        assert_eq!(file_read(&path, None, None).unwrap(), b"0123xy");
    }

    #[test]
    fn test_negative_offset_is_an_argument_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        assert_eq!(
            file_read(&path, Some(-1), None).unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            file_write(&path, Some(-5), b"x").unwrap_err().kind(),
            ErrorKind::Argument
        );
    }

    #[test]
    fn test_file_append_and_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        file_append(&path, b"a", false).unwrap();
        file_append(&path, b"b", false).unwrap();
        assert_eq!(file_read(&path, None, None).unwrap(), b"ab");

        let err = file_append(&path, b"c", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_remove_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        file_write(&path, None, b"x").unwrap();
        assert_eq!(file_remove(&path).unwrap(), 1);
        assert_eq!(file_remove(&path).unwrap(), 0);

        let sub = dir.path().join("sub");
        assert_eq!(dir_create(&sub).unwrap(), 1);
        assert_eq!(dir_create(&sub).unwrap(), 0);
        assert_eq!(dir_remove(&sub).unwrap(), 1);
        assert_eq!(dir_remove(&sub).unwrap(), 0);
    }

    #[test]
    fn test_remove_recursive_counts_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir(&root).unwrap();
        fs::create_dir(root.join("a")).unwrap();
        file_write(&root.join("a/f1"), None, b"1").unwrap();
        file_write(&root.join("f2"), None, b"2").unwrap();

        assert_eq!(remove_recursive(&root).unwrap(), 4);
        assert_eq!(remove_recursive(&root).unwrap(), 0);
    }

    #[test]
    fn test_dir_list_and_information() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        file_write(&dir.path().join("file"), None, b"abc").unwrap();

        let listing = dir_list(dir.path()).unwrap();
        assert_eq!(listing.len(), 2);
        let sub = listing["sub"].as_object().unwrap();
        assert_eq!(sub["b_dir"], Value::Boolean(true));
        let file = listing["file"].as_object().unwrap();
        assert_eq!(file["b_dir"], Value::Boolean(false));

        let stat = get_information(&dir.path().join("file")).unwrap();
        assert_eq!(stat["n_size"], Value::Integer(3));
        assert_eq!(stat["b_dir"], Value::Boolean(false));
        assert_eq!(stat["b_sym"], Value::Boolean(false));
        assert!(get_information(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_move_and_copy() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");

        file_write(&a, None, b"payload").unwrap();
        move_from(&b, &a).unwrap();
        assert_eq!(file_read(&b, None, None).unwrap(), b"payload");
        assert!(get_information(&a).is_none());

        file_copy_from(&c, &b).unwrap();
        assert_eq!(file_read(&c, None, None).unwrap(), b"payload");
        assert_eq!(file_read(&b, None, None).unwrap(), b"payload");
    }

    #[test]
    #[serial]
    fn test_get_working_directory_is_absolute() {
        let cwd = get_working_directory().unwrap();
        let path = bytes_to_path(&cwd);
        assert!(path.is_absolute());
    }

    #[test]
    fn test_get_real_path_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x");
        file_write(&path, None, b"").unwrap();
        let real = get_real_path(&path).unwrap();
        assert!(bytes_to_path(&real).is_absolute());
        assert_eq!(
            get_real_path(&dir.path().join("missing")).unwrap_err().kind(),
            ErrorKind::Resource
        );
    }
}
