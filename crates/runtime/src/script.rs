//! The embedding API
//!
//! A [`Script`] owns one global environment and at most one loaded
//! program. Loading parses and compiles the source as the body of a
//! variadic top-level function, so invocation arguments surface to the
//! script through `__varg`. Executing returns the script's result value or
//! the failure that escaped every `try`.
//!
//! ```no_run
//! use asteria_runtime::{Script, Value};
//!
//! let mut script = Script::default();
//! script.load_string("demo", 1, b"return __varg();").unwrap();
//! let count = script.execute(vec![Value::Integer(1), Value::Null]).unwrap();
//! assert_eq!(count, Value::Integer(2));
//! ```

use crate::executor::Block;
use crate::function::{Callable, ScriptFunction};
use crate::global::{GlobalContext, API_VERSION_LATEST};
use crate::reference::Reference;
use crate::value::Value;
use asteria_compiler::Parser;
use asteria_core::{Error, ErrorKind, Result, SourceLocation};
use std::path::Path;
use std::rc::Rc;

/// The name under which the program body runs; `__func` inside a script
/// shows it.
const TOP_LEVEL_NAME: &str = "<top level>";

#[derive(Debug)]
pub struct Script {
    global: GlobalContext,
    main: Option<Rc<ScriptFunction>>,
}

impl Script {
    pub fn new(api_version: u32) -> Script {
        Script {
            global: GlobalContext::new(api_version),
            main: None,
        }
    }

    pub fn global(&self) -> &GlobalContext {
        &self.global
    }

    pub fn is_loaded(&self) -> bool {
        self.main.is_some()
    }

    /// Drop the loaded program, keeping the global environment.
    pub fn reset(&mut self) -> &mut Self {
        self.main = None;
        self
    }

    /// Load a program from a byte buffer. `name` is the display name used
    /// in locations and backtraces; `start_line` numbers the first line.
    pub fn load_string(&mut self, name: &str, start_line: u32, code: &[u8]) -> Result<&mut Self> {
        let tree = Parser::new(code, start_line)?.parse()?;
        let compiled = Block::compile(&tree, name);
        let function = ScriptFunction::instantiate(
            &self.global,
            self.global.root_scope(),
            SourceLocation::new(name, start_line),
            TOP_LEVEL_NAME,
            vec!["...".to_string()],
            &compiled,
        );
        self.main = Some(function);
        Ok(self)
    }

    /// Load a program from a file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let code = std::fs::read(path).map_err(|e| {
            Error::new(
                ErrorKind::Resource,
                format!("could not read script '{}': {}", path.display(), e),
            )
        })?;
        self.load_string(&path.to_string_lossy(), 1, &code)
    }

    /// Run the loaded program with an argument list.
    pub fn execute(&self, args: Vec<Value>) -> Result<Value> {
        let main = self.main.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Argument, "no script has been loaded")
        })?;
        let args = args.into_iter().map(Reference::temporary).collect();
        main.invoke(&self.global, Reference::null_constant(), args)?
            .read()
    }
}

impl Default for Script {
    fn default() -> Self {
        Script::new(API_VERSION_LATEST)
    }
}
