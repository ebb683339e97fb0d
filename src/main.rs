// ABOUTME: Driver: CLI parsing, stream evaluation, and the interactive REPL

use cellisp::builtins::register_builtins;
use cellisp::config::{HISTORY_FILE, PROMPT, VERSION, WELCOME_MESSAGE};
use cellisp::env::Environment;
use cellisp::error::LispError;
use cellisp::eval::{eval, eval_source, expand};
use cellisp::reader::read_form;
use cellisp::repl::LispHelper;
use cellisp::value::Value;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

/// A small Lisp interpreter with closures, macros, and mutable places
#[derive(Parser, Debug)]
#[command(name = "cellisp")]
#[command(version = VERSION)]
#[command(about = "A small Lisp interpreter with closures, macros, and mutable places")]
struct CliArgs {
    /// Script file to execute (reads stdin, or starts a REPL on a terminal,
    /// when omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Skip loading the bundled prelude
    #[arg(long = "no-lib")]
    no_lib: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let env = Environment::new();
    register_builtins(&env);

    if !args.no_lib {
        if let Err(e) = eval_source(include_str!("lib.lisp"), &env) {
            eprintln!("error loading prelude: {}", e);
            process::exit(1);
        }
    }

    match args.script {
        Some(path) => {
            let src = std::fs::read_to_string(&path)
                .map_err(|e| format!("can't read {}: {}", path.display(), e))?;
            run_stream(&src, &env);
        }
        None => {
            if std::io::stdin().is_terminal() {
                run_repl(&env)?;
            } else {
                let mut src = String::new();
                std::io::stdin().read_to_string(&mut src)?;
                run_stream(&src, &env);
            }
        }
    }

    Ok(())
}

/// Pull one form at a time from the source: expand, eval, print. The first
/// error is fatal to the process.
fn run_stream(src: &str, env: &Rc<Environment>) {
    let mut rest = src;
    loop {
        match next_result(&mut rest, env) {
            Ok(Some(result)) => println!("{}", result),
            Ok(None) => return,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    }
}

fn next_result(rest: &mut &str, env: &Rc<Environment>) -> Result<Option<Value>, LispError> {
    match read_form(*rest)? {
        None => Ok(None),
        Some((form, remaining)) => {
            *rest = remaining;
            let expanded = expand(&form, env)?;
            Ok(Some(eval(&expanded, env)?))
        }
    }
}

/// Interactive loop: multi-line input while a form is open, history across
/// sessions. Errors abort the current form and return to the prompt.
fn run_repl(env: &Rc<Environment>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<LispHelper, DefaultHistory> =
        Editor::with_config(config).map_err(|e| format!("can't initialize REPL: {}", e))?;
    rl.set_helper(Some(LispHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let mut rest = line.as_str();
                loop {
                    match next_result(&mut rest, env) {
                        Ok(Some(result)) => println!("{}", result),
                        Ok(None) => break,
                        Err(e) => {
                            eprintln!("error: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}
