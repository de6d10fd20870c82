//! Reference CLI for `unum` (spec.md §6's "CLI surface (reference)"):
//! `unum [script.unm [args...]]` — with a path, runs the file and exits with
//! its last numeric value (0 on a clean non-numeric exit, nonzero on error);
//! with no path, enters a line-at-a-time REPL reading from stdin. Grounded
//! on `examples/original_source/src/main.c`'s `run_script`/`prompt` pair and
//! on `ouros-cli`'s argv-handling/exit-code shape.
//!
//! This binary is a demo harness, not part of the library's public surface —
//! an embedder links against `unum` directly and builds its own driver.

use std::io::{self, IsTerminal, Write as _};
use std::process::ExitCode;
use std::{env, fs};

use unum::{EvalDisposition, Runtime, Value};

const ERR_COL: &str = "\x1B[31m";
const CLEAR_COL: &str = "\x1B[0m";
const THEME_COL: &str = "\x1B[35m";

fn main() -> ExitCode {
    tracing_subscriber_init();

    let args: Vec<String> = env::args().collect();
    let mut rt = Runtime::default();

    if let Some(bootstrap_path) = env::var_os("UNUM_BOOTSTRAP") {
        if let Err(code) = run_bootstrap(&mut rt, &bootstrap_path, &args[1..]) {
            return code;
        }
    }

    match args.get(1) {
        None => {
            repl(&mut rt);
            ExitCode::SUCCESS
        }
        Some(path) => run_file(&mut rt, path, &args[2..]),
    }
}

/// `UNUM_BOOTSTRAP`: a script that runs before argument processing, with the
/// argv tail bound to `argv` (spec.md §6, closing paragraph).
fn run_bootstrap(rt: &mut Runtime, path: &std::ffi::OsStr, argv_tail: &[String]) -> Result<(), ExitCode> {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("unable to load bootstrap script {}: {err}", path.to_string_lossy());
            return Err(ExitCode::FAILURE);
        }
    };
    bind_argv(rt, argv_tail);
    let res = rt.eval(&src, EvalDisposition::Print);
    if res.is_error() {
        res.release(&mut rt.heap);
        return Err(ExitCode::FAILURE);
    }
    res.release(&mut rt.heap);
    Ok(())
}

fn bind_argv(rt: &mut Runtime, tail: &[String]) {
    let items: Vec<Value> = tail.iter().map(|s| rt.new_string(s)).collect();
    let argv = rt.new_array(items);
    rt.set_var("argv", argv, true);
}

/// Runs a single script file (spec.md §6: "Exit code = integer returned by
/// the script's last value when numeric, else 0 on clean exit, nonzero on
/// error"). Grounded on `run_script` in `examples/original_source/src/main.c`.
fn run_file(rt: &mut Runtime, path: &str, argv_tail: &[String]) -> ExitCode {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(err) => {
            eprintln!("unable to load script {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    bind_argv(rt, argv_tail);
    let script_path = rt.new_string(path);
    rt.set_var("script-path", script_path, true);

    let res = rt.eval(&src, EvalDisposition::Print);
    let code = match &res {
        Value::Err(_) => ExitCode::FAILURE,
        Value::Number(n) if n.trunc() == *n && (i32::MIN as f64..=i32::MAX as f64).contains(n) => {
            ExitCode::from(*n as i32 as u8)
        }
        _ => ExitCode::SUCCESS,
    };
    res.release(&mut rt.heap);
    code
}

/// Reads lines from stdin until EOF or `quit`, evaluating each against a
/// persistent `Runtime` so bindings survive across lines. `load <path>`
/// loads and evaluates a file in place, matching the original's REPL
/// command. Grounded on `prompt()` in `examples/original_source/src/main.c`.
fn repl(rt: &mut Runtime) {
    let color = io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none();

    println!("{}unum interpreter{}", theme(color), clear(color));
    println!("type 'quit' to exit");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!(">");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                eprintln!("unable to read from stdin: {err}");
                break;
            }
        }
        let trimmed = line.trim_end_matches('\n');
        if trimmed == "quit" {
            break;
        }

        let res = if let Some(path) = trimmed.strip_prefix("load ") {
            match fs::read_to_string(path.trim()) {
                Ok(src) => rt.eval(&src, EvalDisposition::Print),
                Err(err) => {
                    eprintln!("unable to load script {}: {err}", path.trim());
                    continue;
                }
            }
        } else {
            rt.eval(trimmed, EvalDisposition::Print)
        };

        if !res.is_null() {
            if res.is_error() {
                eprintln!("{}{}{}", err_col(color), res.display(&rt.heap), clear(color));
            } else {
                println!("{}", res.display(&rt.heap));
            }
        }
        res.release(&mut rt.heap);
    }
}

fn theme(color: bool) -> &'static str {
    if color {
        THEME_COL
    } else {
        ""
    }
}
fn err_col(color: bool) -> &'static str {
    if color {
        ERR_COL
    } else {
        ""
    }
}
fn clear(color: bool) -> &'static str {
    if color {
        CLEAR_COL
    } else {
        ""
    }
}

fn tracing_subscriber_init() {
    // Host opt-in only: `RUST_LOG=unum=trace unum script.unm` turns on the
    // structured lex/eval/call logging the library emits via `tracing`.
    if env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt::try_init();
    }
}
