//! Asteria interpreter CLI
//!
//! Runs a script file (or an inline expression) and prints the result.
//! Exit codes: 0 on success, 1 on a parse or runtime failure, 2 on a
//! usage error.

use asteria_runtime::{Script, Value};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asteria")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Asteria interpreter - run .ast scripts", long_about = None)]
struct Cli {
    /// Script file to run
    file: Option<PathBuf>,

    /// Run this code instead of a file
    #[arg(short = 'e', long = "expr", value_name = "CODE", conflicts_with = "file")]
    expr: Option<String>,

    /// Print the result in the structural dump form
    #[arg(long)]
    dump: bool,

    /// Arguments passed to the script (the variadic tail of the top level)
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Clap exits with code 2 on usage errors by itself.
    let cli = Cli::parse();

    let mut script = Script::default();
    let loaded = match (&cli.file, &cli.expr) {
        (Some(path), None) => script.load_file(path).map(|_| ()),
        (None, Some(code)) => script.load_string("<expr>", 1, code.as_bytes()).map(|_| ()),
        _ => {
            eprintln!("asteria: either a script file or --expr is required");
            process::exit(2);
        }
    };
    if let Err(err) = loaded {
        eprintln!("asteria: {}", err);
        process::exit(1);
    }

    let args: Vec<Value> = cli.args.iter().map(Value::string).collect();
    match script.execute(args) {
        Ok(result) => {
            if cli.dump {
                println!("{}", result.dump());
            } else {
                println!("{}", result.print(true));
            }
        }
        Err(err) => {
            eprintln!("asteria: {}", err);
            for frame in err.frames() {
                eprintln!("  {}", frame);
            }
            process::exit(1);
        }
    }
}
