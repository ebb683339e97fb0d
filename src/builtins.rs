// ABOUTME: Native primitives and the startup global bindings

use crate::env::Environment;
use crate::error::LispError;
use crate::eval::eval_source;
use crate::symbol::intern;
use crate::value::{is_eq, is_eqv, is_equal, Builtin, BuiltinFn, Value};
use std::io::Write;
use std::rc::Rc;

/// Registration table: Lisp name to native function.
const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("car", car),
    ("cdr", cdr),
    ("cons", cons),
    ("length", length),
    ("nil?", is_nil_p),
    ("symbol?", is_symbol_p),
    ("string?", is_string_p),
    ("integer?", is_integer_p),
    ("pair?", is_pair_p),
    ("function?", is_function_p),
    ("builtin?", is_builtin_p),
    ("procedure?", is_procedure_p),
    ("eq?", eq_p),
    ("eqv?", eqv_p),
    ("equal?", equal_p),
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("<", lt),
    ("<=", le),
    (">", gt),
    (">=", ge),
    ("=", num_eq),
    ("print", print),
    ("load", load),
];

/// Bind every primitive plus the startup globals `t` and `nil`.
pub fn register_builtins(env: &Rc<Environment>) {
    for &(name, func) in BUILTINS {
        env.define(intern(name), Value::Builtin(Rc::new(Builtin { name, func })));
    }
    env.define(intern("t"), Value::Symbol(intern("t")));
    env.define(intern("nil"), Value::Nil);
}

fn expect(name: &'static str, n: usize, args: &[Value]) -> Result<(), LispError> {
    if args.len() != n {
        return Err(LispError::arity(name, n.to_string(), args.len()));
    }
    Ok(())
}

fn truth(b: bool) -> Value {
    if b {
        Value::Symbol(intern("t"))
    } else {
        Value::Nil
    }
}

// ============================================================================
// Pairs and lists
// ============================================================================

// car and cdr of anything that isn't a pair are nil, not errors.

fn car(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("car", 1, args)?;
    Ok(args[0].car())
}

fn cdr(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("cdr", 1, args)?;
    Ok(args[0].cdr())
}

fn cons(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("cons", 2, args)?;
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn length(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("length", 1, args)?;
    match &args[0] {
        Value::Nil => Ok(Value::Int(0)),
        Value::Pair(_) => Ok(Value::Int(args[0].iter().count() as i64)),
        _ => Ok(Value::Nil),
    }
}

// ============================================================================
// Predicates
// ============================================================================

fn is_nil_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("nil?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Nil)))
}

fn is_symbol_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("symbol?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Symbol(_))))
}

fn is_string_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("string?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Str(_))))
}

fn is_integer_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("integer?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Int(_))))
}

fn is_pair_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("pair?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Pair(_))))
}

fn is_function_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("function?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Function(_))))
}

fn is_builtin_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("builtin?", 1, args)?;
    Ok(truth(matches!(args[0], Value::Builtin(_))))
}

fn is_procedure_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("procedure?", 1, args)?;
    Ok(truth(matches!(
        args[0],
        Value::Function(_) | Value::Builtin(_)
    )))
}

fn eq_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("eq?", 2, args)?;
    Ok(truth(is_eq(&args[0], &args[1])))
}

fn eqv_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("eqv?", 2, args)?;
    Ok(truth(is_eqv(&args[0], &args[1])))
}

fn equal_p(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("equal?", 2, args)?;
    Ok(truth(is_equal(&args[0], &args[1])))
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Variadic left fold. With no arguments the operator is applied to the
/// initial value against itself; with one, the initial value is the left
/// operand. A non-integer operand anywhere makes the result nil.
fn arith(
    args: &[Value],
    init: i64,
    op: impl Fn(i64, i64) -> Result<i64, LispError>,
) -> Result<Value, LispError> {
    let mut ints = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Int(n) => ints.push(*n),
            _ => return Ok(Value::Nil),
        }
    }
    let (mut acc, rest) = match ints.split_first() {
        None => return Ok(Value::Int(op(init, init)?)),
        Some((&first, [])) => return Ok(Value::Int(op(init, first)?)),
        Some((&first, rest)) => (first, rest),
    };
    for &n in rest {
        acc = op(acc, n)?;
    }
    Ok(Value::Int(acc))
}

fn add(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    arith(args, 0, |a, b| Ok(a.wrapping_add(b)))
}

fn sub(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    arith(args, 0, |a, b| Ok(a.wrapping_sub(b)))
}

fn mul(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    arith(args, 1, |a, b| Ok(a.wrapping_mul(b)))
}

fn div(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    arith(args, 1, |a, b| {
        if b == 0 {
            Err(LispError::DivisionByZero)
        } else {
            Ok(a.wrapping_div(b))
        }
    })
}

// ============================================================================
// Comparison
// ============================================================================

/// Chained predicate: true when every adjacent pair satisfies the relation.
/// Zero or one arguments are trivially true; a non-integer anywhere is nil.
fn compare(args: &[Value], rel: fn(i64, i64) -> bool) -> Result<Value, LispError> {
    let mut ints = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Int(n) => ints.push(*n),
            _ => return Ok(Value::Nil),
        }
    }
    for pair in ints.windows(2) {
        if !rel(pair[0], pair[1]) {
            return Ok(Value::Nil);
        }
    }
    Ok(truth(true))
}

fn lt(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    compare(args, |a, b| a < b)
}

fn le(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    compare(args, |a, b| a <= b)
}

fn gt(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    compare(args, |a, b| a > b)
}

fn ge(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    compare(args, |a, b| a >= b)
}

fn num_eq(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    compare(args, |a, b| a == b)
}

// ============================================================================
// I/O
// ============================================================================

/// Prints its arguments concatenated, with no separators and no newline;
/// only the top-level driver appends a newline.
fn print(args: &[Value], _env: &Rc<Environment>) -> Result<Value, LispError> {
    let mut out = std::io::stdout();
    for arg in args {
        let _ = write!(out, "{}", arg);
    }
    let _ = out.flush();
    Ok(Value::Nil)
}

/// Reads, expands, and evaluates every top-level form of a file in the
/// global environment.
fn load(args: &[Value], env: &Rc<Environment>) -> Result<Value, LispError> {
    expect("load", 1, args)?;
    let Value::Str(path) = &args[0] else {
        return Err(LispError::Load {
            path: args[0].to_string(),
            message: "path must be a string".to_string(),
        });
    };
    let src = std::fs::read_to_string(&**path).map_err(|e| LispError::Load {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let globals = Environment::globals(env);
    eval_source(&src, &globals)?;
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval_source;

    fn setup() -> Rc<Environment> {
        let env = Environment::new();
        register_builtins(&env);
        env
    }

    fn run(src: &str) -> Result<Value, LispError> {
        let env = setup();
        eval_source(src, &env)
    }

    fn shows(src: &str) -> String {
        format!("{}", run(src).unwrap())
    }

    #[test]
    fn test_add() {
        assert_eq!(shows("(+ 1 2 3)"), "6");
        assert_eq!(shows("(+ 10)"), "10");
        assert_eq!(shows("(+)"), "0");
    }

    #[test]
    fn test_sub() {
        assert_eq!(shows("(- 10 3 2)"), "5");
        assert_eq!(shows("(- 5)"), "-5");
        assert_eq!(shows("(-)"), "0");
    }

    #[test]
    fn test_mul() {
        assert_eq!(shows("(* 2 3 4)"), "24");
        assert_eq!(shows("(* 5)"), "5");
        assert_eq!(shows("(*)"), "1");
    }

    #[test]
    fn test_div() {
        assert_eq!(shows("(/ 20 4)"), "5");
        assert_eq!(shows("(/ 100 2 5)"), "10");
        assert_eq!(shows("(/ 7 2)"), "3");
        // one argument divides the multiplicative identity
        assert_eq!(shows("(/ 5)"), "0");
        assert_eq!(shows("(/)"), "1");
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        assert!(matches!(run("(/ 1 0)"), Err(LispError::DivisionByZero)));
        assert!(matches!(run("(/ 10 2 0)"), Err(LispError::DivisionByZero)));
        assert!(matches!(run("(/ 0)"), Err(LispError::DivisionByZero)));
        // zero as a left operand is fine
        assert_eq!(shows("(/ 0 5)"), "0");
    }

    #[test]
    fn test_arithmetic_on_non_integer_is_nil() {
        assert_eq!(shows("(+ 1 \"two\")"), "nil");
        assert_eq!(shows("(* 1 'a 2)"), "nil");
        assert_eq!(shows("(- nil)"), "nil");
    }

    #[test]
    fn test_comparison_chains() {
        assert_eq!(shows("(< 1 2 3)"), "t");
        assert_eq!(shows("(< 1 3 2)"), "nil");
        assert_eq!(shows("(<= 1 1 2)"), "t");
        assert_eq!(shows("(> 3 2 1)"), "t");
        assert_eq!(shows("(>= 3 3 1)"), "t");
        assert_eq!(shows("(= 2 2 2)"), "t");
        assert_eq!(shows("(= 2 3)"), "nil");
    }

    #[test]
    fn test_comparison_with_few_arguments_is_true() {
        assert_eq!(shows("(<)"), "t");
        assert_eq!(shows("(< 1)"), "t");
    }

    #[test]
    fn test_comparison_on_non_integer_is_nil() {
        assert_eq!(shows("(< 1 \"two\")"), "nil");
        assert_eq!(shows("(= 'a 'a)"), "nil");
    }

    #[test]
    fn test_car_cdr() {
        assert_eq!(shows("(car (cons 1 2))"), "1");
        assert_eq!(shows("(cdr (cons 1 2))"), "2");
        // of anything else: nil, silently
        assert_eq!(shows("(car nil)"), "nil");
        assert_eq!(shows("(cdr nil)"), "nil");
        assert_eq!(shows("(car 5)"), "nil");
        assert_eq!(shows("(cdr \"s\")"), "nil");
    }

    #[test]
    fn test_length() {
        assert_eq!(shows("(length nil)"), "0");
        assert_eq!(shows("(length (cons 1 (cons 2 (cons 3 nil))))"), "3");
        assert_eq!(shows("(length 5)"), "nil");
    }

    #[test]
    fn test_type_predicates() {
        assert_eq!(shows("(nil? nil)"), "t");
        assert_eq!(shows("(nil? 1)"), "nil");
        assert_eq!(shows("(symbol? 'a)"), "t");
        assert_eq!(shows("(string? \"s\")"), "t");
        assert_eq!(shows("(integer? 3)"), "t");
        assert_eq!(shows("(pair? (cons 1 2))"), "t");
        assert_eq!(shows("(pair? nil)"), "nil");
        assert_eq!(shows("(function? (fn (x) x))"), "t");
        assert_eq!(shows("(function? car)"), "nil");
        assert_eq!(shows("(builtin? car)"), "t");
        assert_eq!(shows("(procedure? car)"), "t");
        assert_eq!(shows("(procedure? (fn (x) x))"), "t");
        assert_eq!(shows("(procedure? 'a)"), "nil");
    }

    #[test]
    fn test_equality_builtins() {
        assert_eq!(shows("(eq? 'a 'a)"), "t");
        assert_eq!(shows("(eq? 'a 'b)"), "nil");
        assert_eq!(shows("(eq? nil nil)"), "t");
        assert_eq!(shows("(eqv? 3 3)"), "t");
        assert_eq!(shows("(equal? (cons 1 2) (cons 1 2))"), "t");
        assert_eq!(shows("(eq? (cons 1 2) (cons 1 2))"), "nil");
        // the same cell is eq? to itself
        assert_eq!(shows("((fn (p) (eq? p p)) (cons 1 2))"), "t");
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(matches!(run("(car)"), Err(LispError::ArityError { .. })));
        assert!(matches!(
            run("(cons 1)"),
            Err(LispError::ArityError { .. })
        ));
        assert!(matches!(
            run("(eq? 1)"),
            Err(LispError::ArityError { .. })
        ));
    }

    #[test]
    fn test_load_runs_file_in_globals() {
        let env = setup();
        let path = std::env::temp_dir().join("cellisp-load-test.lisp");
        std::fs::write(&path, "(def loaded-value (+ 20 22))").unwrap();
        let src = format!("(load \"{}\")", path.display());
        eval_source(&src, &env).unwrap();
        assert!(matches!(
            eval_source("loaded-value", &env),
            Ok(Value::Int(42))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        assert!(matches!(
            run("(load \"/nonexistent/nowhere.lisp\")"),
            Err(LispError::Load { .. })
        ));
    }
}
