//! Binding scopes: where words resolve to variable slots.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::{Symbol, Value};

pub type Env = Rc<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Natives and constants.
    Lib,
    /// Top-level user variables; assignments to unknown words land here.
    User,
    /// Loop and function scopes.
    Local,
}

pub struct Scope {
    kind: ScopeKind,
    vars: RefCell<IndexMap<Symbol, Value>>,
    parent: Option<Env>,
}

impl Scope {
    pub fn root() -> Env {
        Rc::new(Scope {
            kind: ScopeKind::Lib,
            vars: RefCell::new(IndexMap::new()),
            parent: None,
        })
    }

    pub fn user(lib: &Env) -> Env {
        Rc::new(Scope {
            kind: ScopeKind::User,
            vars: RefCell::new(IndexMap::new()),
            parent: Some(Rc::clone(lib)),
        })
    }

    /// Create a fresh local scope extending `parent`.
    pub fn extend(parent: &Env) -> Env {
        Rc::new(Scope {
            kind: ScopeKind::Local,
            vars: RefCell::new(IndexMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_ref()
    }

    /// Bind `symbol` in this scope, shadowing any outer binding.
    pub fn bind(&self, symbol: Symbol, value: Value) {
        self.vars.borrow_mut().insert(symbol, value);
    }

    pub fn defines(&self, symbol: &Symbol) -> bool {
        self.vars.borrow().contains_key(symbol)
    }

    pub fn lookup(&self, symbol: &Symbol) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.vars.borrow().get(symbol) {
                return Some(value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Write the nearest binding of `symbol`; unknown words are created in
    /// the closest user scope.
    pub fn assign(&self, symbol: Symbol, value: Value) {
        let mut scope = self;
        let mut user: Option<&Scope> = None;
        loop {
            if scope.defines(&symbol) {
                scope.bind(symbol, value);
                return;
            }
            if user.is_none() && scope.kind == ScopeKind::User {
                user = Some(scope);
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        user.unwrap_or(self).bind(symbol, value);
    }

    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn words(&self) -> Vec<Symbol> {
        self.vars.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let lib = Scope::root();
        lib.bind(Symbol::new("x"), Value::Integer(1));
        let local = Scope::extend(&lib);
        assert_eq!(local.lookup(&Symbol::new("x")).and_then(|v| v.as_int()), Some(1));
        assert!(local.lookup(&Symbol::new("y")).is_none());
    }

    #[test]
    fn test_local_binding_shadows() {
        let lib = Scope::root();
        lib.bind(Symbol::new("x"), Value::Integer(1));
        let local = Scope::extend(&lib);
        local.bind(Symbol::new("x"), Value::Integer(2));
        assert_eq!(local.lookup(&Symbol::new("x")).and_then(|v| v.as_int()), Some(2));
        assert_eq!(lib.lookup(&Symbol::new("x")).and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_assign_unknown_word_lands_in_user_scope() {
        let lib = Scope::root();
        let user = Scope::user(&lib);
        let local = Scope::extend(&user);
        local.assign(Symbol::new("n"), Value::Integer(5));
        assert!(user.defines(&Symbol::new("n")));
        assert!(!local.defines(&Symbol::new("n")));
    }

    #[test]
    fn test_assign_updates_nearest_definition() {
        let lib = Scope::root();
        let user = Scope::user(&lib);
        let local = Scope::extend(&user);
        local.bind(Symbol::new("i"), Value::Integer(1));
        local.assign(Symbol::new("i"), Value::Integer(2));
        assert_eq!(local.lookup(&Symbol::new("i")).and_then(|v| v.as_int()), Some(2));
        assert!(!user.defines(&Symbol::new("i")));
    }
}
