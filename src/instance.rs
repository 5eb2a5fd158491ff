use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::callable::{Callable, Class, Method};
use crate::value::Value;

#[derive(Debug)]
pub(crate) struct Instance {
    class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub(crate) fn new(class: Rc<Class>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Instance {
            class,
            fields: HashMap::new(),
        }))
    }

    /// Property lookup: fields shadow methods, and a method comes out bound
    /// to this instance.
    pub(crate) fn get(instance: &Rc<RefCell<Self>>, name: &str) -> Option<Value> {
        if let Some(field) = instance.borrow().fields.get(name) {
            Some(field.clone())
        } else {
            instance.borrow().class.find_method(name).map(|function| {
                Value::Callable(Rc::new(Method::bind(
                    function,
                    Rc::clone(instance),
                    name == "init",
                )))
            })
        }
    }

    // Fields spring into existence on first assignment.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Value {
        self.fields.insert(String::from(name), value.clone());
        value
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class.name())
    }
}
