// ABOUTME: Environment frames, binding cells, and the global frame

use crate::symbol::Symbol;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A binding's value cell. Every alias of the binding shares the one cell,
/// so assignment through `set` is visible to all subsequent lookups.
pub type BindingCell = Rc<RefCell<Value>>;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<Symbol, BindingCell>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates the global environment, the unique frame with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a child frame.
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Binds a name in THIS frame. An unnamed function or macro picks up the
    /// defining name, for printing only.
    pub fn define(&self, name: Symbol, value: Value) {
        if let Value::Function(c) | Value::Macro(c) = &value {
            let mut slot = c.name.borrow_mut();
            if slot.is_none() {
                *slot = Some(name.clone());
            }
        }
        self.bindings
            .borrow_mut()
            .insert(name, Rc::new(RefCell::new(value)));
    }

    /// Finds the innermost binding cell for a name, walking the parent chain.
    pub fn lookup(&self, name: &Symbol) -> Option<BindingCell> {
        if let Some(cell) = self.bindings.borrow().get(name) {
            return Some(cell.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// The current value of a name, if bound.
    pub fn get(&self, name: &Symbol) -> Option<Value> {
        self.lookup(name).map(|cell| cell.borrow().clone())
    }

    /// True if the name is bound in THIS frame (parents not consulted).
    pub fn is_defined_here(&self, name: &Symbol) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Walks to the root frame, where `def` writes.
    pub fn globals(env: &Rc<Environment>) -> Rc<Environment> {
        let mut env = env.clone();
        while let Some(parent) = env.parent.clone() {
            env = parent;
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::intern;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define(intern("x"), Value::Int(42));
        assert!(matches!(env.get(&intern("x")), Some(Value::Int(42))));
    }

    #[test]
    fn test_undefined_symbol() {
        let env = Environment::new();
        assert!(env.get(&intern("missing")).is_none());
    }

    #[test]
    fn test_shadowing() {
        let parent = Environment::new();
        parent.define(intern("x"), Value::Int(1));

        let child = Environment::with_parent(parent.clone());
        child.define(intern("x"), Value::Int(2));

        assert!(matches!(child.get(&intern("x")), Some(Value::Int(2))));
        assert!(matches!(parent.get(&intern("x")), Some(Value::Int(1))));
    }

    #[test]
    fn test_parent_lookup() {
        let parent = Environment::new();
        parent.define(intern("x"), Value::Int(42));

        let child = Environment::with_parent(parent);
        assert!(matches!(child.get(&intern("x")), Some(Value::Int(42))));
    }

    #[test]
    fn test_binding_cell_is_shared() {
        let parent = Environment::new();
        parent.define(intern("x"), Value::Int(1));

        let child = Environment::with_parent(parent.clone());
        let cell = child.lookup(&intern("x")).unwrap();
        *cell.borrow_mut() = Value::Int(9);

        assert!(matches!(parent.get(&intern("x")), Some(Value::Int(9))));
    }

    #[test]
    fn test_globals_walks_to_root() {
        let root = Environment::new();
        let mid = Environment::with_parent(root.clone());
        let leaf = Environment::with_parent(mid);
        assert!(Rc::ptr_eq(&Environment::globals(&leaf), &root));
    }

    #[test]
    fn test_define_names_anonymous_function() {
        use crate::value::Closure;
        use std::cell::RefCell;

        let env = Environment::new();
        let f = Value::Function(Rc::new(Closure {
            name: RefCell::new(None),
            params: Value::Nil,
            body: Value::Nil,
            env: env.clone(),
        }));
        env.define(intern("square"), f);

        let bound = env.get(&intern("square")).unwrap();
        assert_eq!(format!("{}", bound), "#<function square>");

        // a second define does not rename
        env.define(intern("sq"), bound.clone());
        assert_eq!(format!("{}", bound), "#<function square>");
    }
}
