// ABOUTME: Macro expander, evaluator, special forms, and place resolution

use crate::env::{BindingCell, Environment};
use crate::error::LispError;
use crate::reader::read_form;
use crate::symbol::intern;
use crate::value::{Closure, Pair, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Read, expand, and evaluate every top-level form in `src`, returning the
/// last result. Used by `load`, the prelude, and tests; the stream driver
/// has its own loop so it can print each result.
pub fn eval_source(src: &str, env: &Rc<Environment>) -> Result<Value, LispError> {
    let mut rest = src;
    let mut result = Value::Nil;
    while let Some((form, remaining)) = read_form(rest)? {
        let expanded = expand(&form, env)?;
        result = eval(&expanded, env)?;
        rest = remaining;
    }
    Ok(result)
}

// ============================================================================
// Expansion
// ============================================================================

/// Bottom-up, fixed-point macro expansion. Sublists are expanded first; if
/// the head of the rebuilt form is a symbol bound to a macro, the macro is
/// applied to its unevaluated arguments (each wrapped in `quote` and passed
/// through ordinary evaluation) and the result is expanded again.
pub fn expand(form: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    if !matches!(form, Value::Pair(_)) {
        return Ok(form.clone());
    }
    let expanded = expand_elements(form, env)?;
    let Value::Pair(p) = &expanded else {
        return Ok(expanded);
    };
    let head = p.car.borrow().clone();
    if let Value::Symbol(s) = &head {
        if let Some(Value::Macro(mac)) = env.get(s) {
            let rest = p.cdr.borrow().clone();
            let mut args = Vec::new();
            for raw in rest.iter() {
                let quoted = Value::list(vec![Value::Symbol(intern("quote")), raw]);
                args.push(eval(&quoted, env)?);
            }
            let result = apply(&mac, args)?;
            return expand(&result, env);
        }
    }
    Ok(expanded)
}

fn expand_elements(list: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    match list {
        Value::Pair(p) => {
            let car = p.car.borrow().clone();
            let cdr = p.cdr.borrow().clone();
            let car = expand(&car, env)?;
            let cdr = expand_elements(&cdr, env)?;
            Ok(Value::cons(car, cdr))
        }
        other => Ok(other.clone()),
    }
}

// ============================================================================
// Evaluation
// ============================================================================

pub fn eval(form: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    match form {
        Value::Symbol(s) => env
            .get(s)
            .ok_or_else(|| LispError::UndefinedSymbol(s.to_string())),
        Value::Pair(p) => {
            let head = p.car.borrow().clone();
            let rest = p.cdr.borrow().clone();
            if let Value::Symbol(s) = &head {
                match s.as_str() {
                    "quote" => return eval_quote(&rest),
                    "quasiquote" => {
                        let args: Vec<Value> = rest.iter().collect();
                        if args.len() != 1 {
                            return Err(LispError::form("quasiquote", "expected 1 argument"));
                        }
                        return eval_quasiquote(&args[0], env);
                    }
                    "if" => return eval_if(&rest, env),
                    "fn" => return make_closure(&rest, env, false),
                    "macro" => return make_closure(&rest, env, true),
                    "def" => return eval_def(&rest, env),
                    "set" => return eval_set(&rest, env),
                    _ => {}
                }
            }
            eval_call(&head, &rest, env)
        }
        // everything else is self-evaluating
        _ => Ok(form.clone()),
    }
}

fn eval_quote(rest: &Value) -> Result<Value, LispError> {
    let args: Vec<Value> = rest.iter().collect();
    if args.len() != 1 {
        return Err(LispError::form("quote", "expected 1 argument"));
    }
    Ok(args[0].clone())
}

/// Cascading `if`: `(if test1 then1 test2 then2 ... [else])`. The first
/// truthy test selects its `then`; an odd trailing form is the else.
fn eval_if(clauses: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let mut clauses = clauses.clone();
    loop {
        match clauses {
            Value::Pair(p) => {
                let test = p.car.borrow().clone();
                let tail = p.cdr.borrow().clone();
                match tail {
                    Value::Pair(q) => {
                        let then = q.car.borrow().clone();
                        let next = q.cdr.borrow().clone();
                        if eval(&test, env)?.is_truthy() {
                            return eval(&then, env);
                        }
                        clauses = next;
                    }
                    _ => return eval(&test, env),
                }
            }
            _ => return Ok(Value::Nil),
        }
    }
}

fn make_closure(
    rest: &Value,
    env: &Rc<Environment>,
    is_macro: bool,
) -> Result<Value, LispError> {
    let form = if is_macro { "macro" } else { "fn" };
    let Value::Pair(p) = rest else {
        return Err(LispError::form(form, "expected a parameter list"));
    };
    let params = p.car.borrow().clone();
    if !matches!(params, Value::Nil | Value::Symbol(_) | Value::Pair(_)) {
        return Err(LispError::form(form, "parameter list must be a list or a symbol"));
    }
    let body = p.cdr.borrow().clone();
    let closure = Rc::new(Closure {
        name: RefCell::new(None),
        params,
        body,
        env: env.clone(),
    });
    Ok(if is_macro {
        Value::Macro(closure)
    } else {
        Value::Function(closure)
    })
}

/// `(def name value)` binds globally; the name must not already be bound in
/// the global frame. `(def name params body...)` is shorthand for
/// `(def name (fn params body...))`.
fn eval_def(rest: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let Value::Pair(p) = rest else {
        return Err(LispError::form("def", "expected a name and a value"));
    };
    let name_form = p.car.borrow().clone();
    let rest_forms = p.cdr.borrow().clone();
    let Value::Pair(r) = &rest_forms else {
        return Err(LispError::form("def", "expected a value"));
    };
    let value_form = if matches!(&*r.cdr.borrow(), Value::Nil) {
        r.car.borrow().clone()
    } else {
        Value::cons(Value::Symbol(intern("fn")), rest_forms.clone())
    };
    let Value::Symbol(name) = name_form else {
        return Err(LispError::form("def", "name must be a symbol"));
    };
    let globals = Environment::globals(env);
    if globals.is_defined_here(&name) {
        return Err(LispError::Redefined(name.to_string()));
    }
    let value = eval(&value_form, env)?;
    globals.define(name, value.clone());
    Ok(value)
}

fn eval_set(rest: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let args: Vec<Value> = rest.iter().collect();
    if args.len() != 2 {
        return Err(LispError::form("set", "expected a place and a value"));
    }
    let value = eval(&args[1], env)?;
    let place = resolve_place(&args[0], env)?;
    place.store(value.clone());
    Ok(value)
}

fn eval_call(head: &Value, args_form: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let callee = eval(head, env)?;
    let mut args = Vec::new();
    for form in args_form.iter() {
        args.push(eval(&form, env)?);
    }
    match callee {
        Value::Function(f) => apply(&f, args),
        Value::Builtin(b) => (b.func)(&args, env),
        Value::Macro(m) => Err(LispError::MacroAtRuntime(display_name(&m, "macro"))),
        other => Err(LispError::NotCallable(other.to_string())),
    }
}

/// Apply a closure to already-evaluated arguments. Also used by the
/// expander, which is the only caller allowed to apply macros.
pub(crate) fn apply(f: &Rc<Closure>, args: Vec<Value>) -> Result<Value, LispError> {
    let frame = Environment::with_parent(f.env.clone());
    bind_params(f, args, &frame)?;
    eval_body(&f.body, &frame)
}

fn eval_body(body: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    let mut result = Value::Nil;
    for form in body.iter() {
        result = eval(&form, env)?;
    }
    Ok(result)
}

fn display_name(f: &Rc<Closure>, fallback: &str) -> String {
    f.name
        .borrow()
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Count the named parameter slots; the bool is true when a rest symbol
/// collects extra arguments (improper tail or a lone symbol).
fn param_counts(params: &Value) -> (usize, bool) {
    let mut n = 0;
    let mut cur = params.clone();
    loop {
        match cur {
            Value::Pair(p) => {
                n += 1;
                let next = p.cdr.borrow().clone();
                cur = next;
            }
            Value::Nil => return (n, false),
            _ => return (n, true),
        }
    }
}

fn bind_params(
    f: &Rc<Closure>,
    args: Vec<Value>,
    frame: &Rc<Environment>,
) -> Result<(), LispError> {
    let total = args.len();
    let (required, has_rest) = param_counts(&f.params);
    if total < required || (!has_rest && total > required) {
        let expected = if has_rest {
            format!("at least {}", required)
        } else {
            required.to_string()
        };
        return Err(LispError::arity(display_name(f, "fn"), expected, total));
    }

    let mut supplied = args.into_iter();
    let mut params = f.params.clone();
    loop {
        match params {
            Value::Nil => return Ok(()),
            Value::Symbol(rest_name) => {
                frame.define(rest_name, Value::list(supplied.collect()));
                return Ok(());
            }
            Value::Pair(p) => {
                let Value::Symbol(name) = p.car.borrow().clone() else {
                    return Err(LispError::form("fn", "parameter must be a symbol"));
                };
                match supplied.next() {
                    Some(arg) => frame.define(name, arg),
                    None => {
                        return Err(LispError::arity(
                            display_name(f, "fn"),
                            required.to_string(),
                            total,
                        ))
                    }
                }
                let next = p.cdr.borrow().clone();
                params = next;
            }
            _ => return Err(LispError::form("fn", "parameter must be a symbol")),
        }
    }
}

// ============================================================================
// Quasiquotation
// ============================================================================

/// Walk a quasiquote template, copying structure. `(unquote E)` evaluates E
/// and substitutes the value; `(unquote-splicing E)` is only legal as a list
/// element and splices the elements of E (a proper list or nil) into the
/// surrounding list.
fn eval_quasiquote(template: &Value, env: &Rc<Environment>) -> Result<Value, LispError> {
    match template {
        Value::Pair(p) => {
            let head = p.car.borrow().clone();
            if let Value::Symbol(s) = &head {
                match s.as_str() {
                    "unquote" => {
                        let cdr = p.cdr.borrow().clone();
                        let args: Vec<Value> = cdr.iter().collect();
                        if args.len() != 1 {
                            return Err(LispError::form("unquote", "expected 1 argument"));
                        }
                        return eval(&args[0], env);
                    }
                    "unquote-splicing" => {
                        return Err(LispError::form(
                            "unquote-splicing",
                            "only allowed inside a list",
                        ));
                    }
                    _ => {}
                }
            }
            let cdr = p.cdr.borrow().clone();
            if let Some(expr) = splice_arg(&head)? {
                let spliced = eval(&expr, env)?;
                let rest = eval_quasiquote(&cdr, env)?;
                splice_append(&spliced, rest)
            } else {
                let first = eval_quasiquote(&head, env)?;
                let rest = eval_quasiquote(&cdr, env)?;
                Ok(Value::cons(first, rest))
            }
        }
        _ => Ok(template.clone()),
    }
}

/// The argument of `(unquote-splicing E)` if `v` is such a form.
fn splice_arg(v: &Value) -> Result<Option<Value>, LispError> {
    let Value::Pair(p) = v else { return Ok(None) };
    let is_splice = matches!(&*p.car.borrow(), Value::Symbol(s) if s.as_str() == "unquote-splicing");
    if !is_splice {
        return Ok(None);
    }
    let cdr = p.cdr.borrow().clone();
    let args: Vec<Value> = cdr.iter().collect();
    if args.len() != 1 {
        return Err(LispError::form("unquote-splicing", "expected 1 argument"));
    }
    Ok(Some(args[0].clone()))
}

/// Copy the elements of `spliced` onto the front of `rest`.
fn splice_append(spliced: &Value, rest: Value) -> Result<Value, LispError> {
    match spliced {
        Value::Nil => Ok(rest),
        Value::Pair(p) => {
            let car = p.car.borrow().clone();
            let cdr = p.cdr.borrow().clone();
            Ok(Value::cons(car, splice_append(&cdr, rest)?))
        }
        _ => Err(LispError::form("unquote-splicing", "expected a proper list")),
    }
}

// ============================================================================
// Places
// ============================================================================

/// A mutable slot that `set` can overwrite: a binding's value cell, or the
/// car/cdr field of a pair.
pub enum Place {
    Var(BindingCell),
    Car(Rc<Pair>),
    Cdr(Rc<Pair>),
}

impl Place {
    pub fn store(&self, value: Value) {
        match self {
            Place::Var(cell) => *cell.borrow_mut() = value,
            Place::Car(p) => *p.car.borrow_mut() = value,
            Place::Cdr(p) => *p.cdr.borrow_mut() = value,
        }
    }
}

fn resolve_place(form: &Value, env: &Rc<Environment>) -> Result<Place, LispError> {
    match form {
        Value::Symbol(s) => env
            .lookup(s)
            .map(Place::Var)
            .ok_or_else(|| LispError::UndefinedSymbol(s.to_string())),
        Value::Pair(p) => {
            let head = p.car.borrow().clone();
            let rest = p.cdr.borrow().clone();
            if let Value::Symbol(s) = &head {
                match s.as_str() {
                    "car" | "cdr" => {
                        let args: Vec<Value> = rest.iter().collect();
                        if args.len() != 1 {
                            return Err(LispError::arity(s.as_str(), "1", args.len()));
                        }
                        let target = eval(&args[0], env)?;
                        let Value::Pair(pair) = target else {
                            return Err(LispError::InvalidPlace(form.to_string()));
                        };
                        return Ok(if s.as_str() == "car" {
                            Place::Car(pair)
                        } else {
                            Place::Cdr(pair)
                        });
                    }
                    "if" => return resolve_if_place(&rest, env, form),
                    "def" => {
                        eval_def(&rest, env)?;
                        let Value::Symbol(name) = rest.car() else {
                            return Err(LispError::InvalidPlace(form.to_string()));
                        };
                        return Environment::globals(env)
                            .lookup(&name)
                            .map(Place::Var)
                            .ok_or_else(|| LispError::UndefinedSymbol(name.to_string()));
                    }
                    "set" => {
                        eval_set(&rest, env)?;
                        return resolve_place(&rest.car(), env);
                    }
                    "quote" | "quasiquote" | "fn" | "macro" => {
                        return Err(LispError::InvalidPlace(form.to_string()));
                    }
                    _ => {}
                }
            }
            resolve_call_place(&head, &rest, env, form)
        }
        _ => Err(LispError::InvalidPlace(form.to_string())),
    }
}

/// The slot selected by the same cascade as `if`, with tests evaluated
/// eagerly.
fn resolve_if_place(
    clauses: &Value,
    env: &Rc<Environment>,
    original: &Value,
) -> Result<Place, LispError> {
    let mut clauses = clauses.clone();
    loop {
        match clauses {
            Value::Pair(p) => {
                let test = p.car.borrow().clone();
                let tail = p.cdr.borrow().clone();
                match tail {
                    Value::Pair(q) => {
                        let then = q.car.borrow().clone();
                        let next = q.cdr.borrow().clone();
                        if eval(&test, env)?.is_truthy() {
                            return resolve_place(&then, env);
                        }
                        clauses = next;
                    }
                    _ => return resolve_place(&test, env),
                }
            }
            _ => return Err(LispError::InvalidPlace(original.to_string())),
        }
    }
}

/// A function call in place position: run the body with every form but the
/// last evaluated for effect, then resolve the last form as the slot.
/// Builtins do not yield slots.
fn resolve_call_place(
    head: &Value,
    args_form: &Value,
    env: &Rc<Environment>,
    original: &Value,
) -> Result<Place, LispError> {
    let callee = eval(head, env)?;
    let Value::Function(f) = callee else {
        return Err(LispError::InvalidPlace(original.to_string()));
    };
    let mut args = Vec::new();
    for form in args_form.iter() {
        args.push(eval(&form, env)?);
    }
    let frame = Environment::with_parent(f.env.clone());
    bind_params(&f, args, &frame)?;
    let mut body = f.body.clone();
    loop {
        match body {
            Value::Pair(p) => {
                let form = p.car.borrow().clone();
                let tail = p.cdr.borrow().clone();
                if matches!(tail, Value::Pair(_)) {
                    eval(&form, &frame)?;
                    body = tail;
                } else {
                    return resolve_place(&form, &frame);
                }
            }
            _ => return Err(LispError::InvalidPlace(original.to_string())),
        }
    }
}
