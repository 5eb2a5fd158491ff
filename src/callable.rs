use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use crate::ast::Stmt;
use crate::env::Environment;
use crate::errors::Error;
use crate::instance::Instance;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

#[derive(Debug, PartialEq)]
pub(crate) enum CallableType {
    Function,
    Class,
}

pub(crate) trait Callable {
    fn ty(&self) -> CallableType {
        CallableType::Function
    }

    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn execute(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> Result<Value, Error>;

    // Downcast hook for the evaluator, which needs the concrete class when a
    // declaration names a superclass.
    fn as_class(self: Rc<Self>) -> Option<Rc<Class>> {
        None
    }
}

impl Debug for dyn Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:?} {}>", self.ty(), self.name())
    }
}

impl Display for dyn Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.ty() {
            CallableType::Class => write!(f, "{}", self.name()),
            CallableType::Function => write!(f, "<fn {}>", self.name()),
        }
    }
}

pub(crate) type BoxedFunction = Box<dyn Fn(&[Value]) -> Result<Value, Error>>;

// `Native` bridges native rust calls and the interpreter environment. These
// trait objects live in the global namespace.
pub(crate) struct Native {
    func: BoxedFunction,
    name: String,
    arity: usize,
}

impl Native {
    pub(crate) fn new(func: BoxedFunction, name: String, arity: usize) -> Self {
        Self { func, name, arity }
    }
}

impl Callable for Native {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn execute(self: Rc<Self>, _: &mut Interpreter, args: &[Value]) -> Result<Value, Error> {
        (self.func)(args)
    }
}

#[derive(Debug)]
pub(crate) struct Function {
    closure: Rc<RefCell<Environment>>,
    name: Token,
    params: Vec<Token>,
    body: Vec<Stmt>,
}

impl Function {
    pub(crate) fn new(
        closure: Rc<RefCell<Environment>>,
        name: &Token,
        params: &[Token],
        body: &[Stmt],
    ) -> Self {
        Function {
            closure,
            name: name.clone(),
            params: Vec::from(params),
            body: Vec::from(body),
        }
    }
}

// Helper that will be called from both functions and methods. The call
// environment is a fresh child of the given closure holding the arguments;
// the `Return` unwind stops here and turns back into a plain value.
fn execute_function(
    function: Rc<Function>,
    closure: Rc<RefCell<Environment>>,
    interpreter: &mut Interpreter,
    args: &[Value],
) -> Result<Value, Error> {
    let mut env = Environment::with(closure);
    for (param, arg) in function.params.iter().zip(args) {
        env.define(&param.lexeme, arg.clone());
    }

    match interpreter.execute_block_with_env(&function.body, Rc::new(RefCell::new(env))) {
        Ok(()) => Ok(Value::Nil),
        Err(Error::Return(value)) => Ok(value.value),
        Err(err) => Err(err),
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        &self.name.lexeme
    }

    fn arity(&self) -> usize {
        self.params.len()
    }

    fn execute(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> Result<Value, Error> {
        let closure = Rc::clone(&self.closure);
        execute_function(self, closure, interpreter, args)
    }
}

// A method bound to an instance. Binding does not clone the function's
// declaration; the bound form only adds one environment layer defining
// `this` and keeps referring to the original function through an Rc.
#[derive(Debug)]
pub(crate) struct Method {
    closure: Rc<RefCell<Environment>>,
    function: Rc<Function>,
    is_init: bool,
}

impl Method {
    pub(crate) fn bind(
        function: Rc<Function>,
        instance: Rc<RefCell<Instance>>,
        is_init: bool,
    ) -> Self {
        let closure = Rc::new(RefCell::new(Environment::with(Rc::clone(
            &function.closure,
        ))));
        closure
            .borrow_mut()
            .define("this", Value::Instance(instance));

        Method {
            closure,
            function,
            is_init,
        }
    }
}

impl Callable for Method {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn arity(&self) -> usize {
        self.function.arity()
    }

    fn execute(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> Result<Value, Error> {
        let res = execute_function(
            Rc::clone(&self.function),
            Rc::clone(&self.closure),
            interpreter,
            args,
        );

        // An initializer always yields its instance, both on fall-through
        // and on a bare `return`. The resolver rejects `return <value>`
        // inside initializers.
        match res {
            Ok(_) if self.is_init => Ok(self.closure.borrow().get_at(0, "this").unwrap()),
            _ => res,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Class {
    name: String,
    superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub(crate) fn new(
        name: &str,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Rc<Self> {
        Rc::new(Class {
            name: name.to_string(),
            superclass,
            methods,
        })
    }

    pub(crate) fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(fun) = self.methods.get(name) {
            Some(Rc::clone(fun))
        } else if let Some(superclass) = &self.superclass {
            superclass.find_method(name)
        } else {
            None
        }
    }
}

impl Callable for Class {
    fn ty(&self) -> CallableType {
        CallableType::Class
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        match self.find_method("init") {
            Some(init) => init.arity(),
            _ => 0,
        }
    }

    // Calling a class builds an instance and runs `init` on it when the
    // class has one.
    fn execute(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> Result<Value, Error> {
        let instance = Instance::new(Rc::clone(&self));
        if let Some(init) = self.find_method("init") {
            Rc::new(Method::bind(init, Rc::clone(&instance), true)).execute(interpreter, args)?;
        }

        Ok(Value::Instance(instance))
    }

    fn as_class(self: Rc<Self>) -> Option<Rc<Class>> {
        Some(self)
    }
}
