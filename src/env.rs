use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// One scope's bindings plus a strong link to the enclosing scope. Scopes
/// always form a chain ending at the globals, never a DAG.
#[derive(Debug)]
pub(crate) struct Environment {
    enclosing: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct UndefinedVariable;

impl Environment {
    pub(crate) fn new() -> Self {
        Environment {
            enclosing: None,
            bindings: HashMap::new(),
        }
    }

    pub(crate) fn with(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            enclosing: Some(enclosing),
            bindings: HashMap::new(),
        }
    }

    // Unconditional insert-or-overwrite. Redefining a global is allowed;
    // redefining a local is rejected earlier, by the resolver.
    pub(crate) fn define(&mut self, key: &str, value: Value) {
        self.bindings.insert(String::from(key), value);
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        match self.bindings.get(key) {
            Some(val) => Some(val.clone()),
            None => match &self.enclosing {
                Some(enclosing) => enclosing.as_ref().borrow().get(key),
                None => None,
            },
        }
    }

    /// Distance-indexed lookup. Unlike `get` this only consults the
    /// environment exactly `dist` hops out; the resolver has already decided
    /// which scope holds the binding.
    pub(crate) fn get_at(&self, dist: usize, key: &str) -> Option<Value> {
        if dist == 0 {
            self.bindings.get(key).cloned()
        } else {
            self.enclosing
                .as_ref()
                .and_then(|parent| parent.borrow().get_at(dist - 1, key))
        }
    }

    pub(crate) fn assign(&mut self, key: &str, value: Value) -> Result<(), UndefinedVariable> {
        if let Some(val) = self.bindings.get_mut(key) {
            *val = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.as_ref().borrow_mut().assign(key, value)
        } else {
            Err(UndefinedVariable)
        }
    }

    pub(crate) fn assign_at(
        &mut self,
        dist: usize,
        key: &str,
        value: Value,
    ) -> Result<(), UndefinedVariable> {
        if dist == 0 {
            if let Some(val) = self.bindings.get_mut(key) {
                *val = value;
                Ok(())
            } else {
                Err(UndefinedVariable)
            }
        } else if let Some(parent) = &self.enclosing {
            parent.as_ref().borrow_mut().assign_at(dist - 1, key, value)
        } else {
            Err(UndefinedVariable)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::env::{Environment, UndefinedVariable};
    use crate::value::Value;

    #[test]
    fn test_define_overwrites() {
        let mut env = Environment::new();
        env.define("answer", Value::from(41));
        env.define("answer", Value::from(42));

        assert_eq!(env.get("answer"), Some(Value::from(42)));
    }

    #[test]
    fn test_assign_requires_existing_binding() {
        let mut env = Environment::new();
        assert_eq!(
            env.assign("ghost", Value::Nil),
            Err(UndefinedVariable)
        );
        assert_eq!(env.get("ghost"), None);
    }

    #[test]
    fn test_get_walks_the_chain_but_get_at_does_not() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::from("outer"));

        let inner = Environment::with(globals.clone());
        assert_eq!(inner.get("a"), Some(Value::from("outer")));
        // distance 0 addresses the inner scope only, which holds nothing
        assert_eq!(inner.get_at(0, "a"), None);
        assert_eq!(inner.get_at(1, "a"), Some(Value::from("outer")));
    }

    #[test]
    fn test_shadowing_and_assignment_through_parent() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::from(1));

        {
            let mut inner = Environment::with(globals.clone());
            inner.define("a", Value::from(2));
            assert_eq!(inner.get_at(0, "a"), Some(Value::from(2)));
            assert_eq!(inner.get_at(1, "a"), Some(Value::from(1)));

            inner.assign_at(1, "a", Value::from(3)).unwrap();
            // the inner shadow is untouched
            assert_eq!(inner.get_at(0, "a"), Some(Value::from(2)));
        }

        assert_eq!(globals.borrow().get("a"), Some(Value::from(3)));
    }
}
