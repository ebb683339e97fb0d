// ABOUTME: Symbol interning so that name equality reduces to identity

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned symbol. Two symbols with the same name are the same
/// allocation, so equality is pointer equality.
#[derive(Clone, Debug)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    /// The process-wide symbol table. The interpreter is single-threaded, so
    /// thread-local storage gives each interpreter instance its own table.
    static SYMBOLS: RefCell<HashMap<Box<str>, Symbol>> = RefCell::new(HashMap::new());
}

/// Intern a name, returning the canonical `Symbol` for it.
pub fn intern(name: &str) -> Symbol {
    SYMBOLS.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(sym) = table.get(name) {
            return sym.clone();
        }
        let sym = Symbol(Rc::from(name));
        table.insert(Box::from(name), sym.clone());
        sym
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_identical_symbol() {
        let a = intern("foo");
        let b = intern("foo");
        assert!(Rc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_names_are_distinct_symbols() {
        let a = intern("foo");
        let b = intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn test_symbol_display_is_its_name() {
        let sym = intern("map-cars");
        assert_eq!(format!("{}", sym), "map-cars");
        assert_eq!(sym.as_str(), "map-cars");
    }
}
