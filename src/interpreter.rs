use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Expr, ExprVisitor, Stmt, StmtVisitor};
use crate::callable::{BoxedFunction, Callable, Class, Function, Method, Native};
use crate::env::Environment;
use crate::errors::Error;
use crate::instance::Instance;
use crate::resolver::ResolvedStmts;
use crate::token::{Literal, Token, TokenIndex, Type};
use crate::value::Value;

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    env: Rc<RefCell<Environment>>,
    locals: HashMap<TokenIndex, usize>,
    stdout: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        let clock: BoxedFunction = Box::new(|_| {
            let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
            Ok(Value::Num(since_epoch.as_secs_f64()))
        });
        let clock_callable: Rc<dyn Callable> =
            Rc::new(Native::new(clock, String::from("clock"), 0));
        RefCell::borrow_mut(&globals).define("clock", Value::Callable(clock_callable));

        Interpreter {
            env: globals.clone(),
            globals,
            locals: HashMap::new(),
            stdout,
        }
    }

    pub fn interpret(&mut self, resolved: &ResolvedStmts) -> Result<(), Error> {
        for stmt in &resolved.0 {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    // The environment pointer must be restored on every exit path, including
    // a runtime error and the `Return` unwind.
    pub(crate) fn execute_block_with_env(
        &mut self,
        stmts: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let current = self.env.clone();
        self.env = env;
        for stmt in stmts {
            if let err @ Err(_) = self.visit_stmt(stmt) {
                self.env = current;
                return err;
            }
        }
        self.env = current;
        Ok(())
    }

    /// Called by the resolver to record how many environment hops separate a
    /// variable use from its declaration. Absent entries mean global.
    pub(crate) fn resolve(&mut self, token: &Token, depth: usize) {
        self.locals.insert(token.idx, depth);
    }

    fn lookup_variable(&self, token: &Token) -> Option<Value> {
        match self.locals.get(&token.idx) {
            Some(dist) => RefCell::borrow(&self.env).get_at(*dist, &token.lexeme),
            None => self.globals.borrow().get(&token.lexeme),
        }
    }

    fn undefined_variable(token: &Token) -> Error {
        Error::runtime_error(token, &format!("Undefined variable '{}'.", token.lexeme))
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), Error> {
    match (left, right) {
        (Value::Num(left), Value::Num(right)) => Ok((*left, *right)),
        _ => Err(Error::runtime_error(operator, "Operands must be numbers.")),
    }
}

impl ExprVisitor for Interpreter {
    type Item = Value;

    fn visit_assign(&mut self, name: &Token, value: &Expr) -> Result<Value, Error> {
        let value = self.visit_expr(value)?;

        let assigned = match self.locals.get(&name.idx) {
            Some(dist) => {
                RefCell::borrow_mut(&self.env).assign_at(*dist, &name.lexeme, value.clone())
            }
            None => self.globals.borrow_mut().assign(&name.lexeme, value.clone()),
        };

        match assigned {
            Ok(()) => Ok(value),
            Err(_) => Err(Self::undefined_variable(name)),
        }
    }

    fn visit_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Error> {
        let left = self.visit_expr(left)?;
        let right = self.visit_expr(right)?;

        match operator.ty {
            // `+` doubles as string concatenation, every other arithmetic or
            // ordering operator wants numbers on both sides.
            Type::Plus => match (left, right) {
                (Value::Num(left), Value::Num(right)) => Ok(Value::Num(left + right)),
                (Value::Str(left), Value::Str(right)) => {
                    Ok(Value::from(format!("{}{}", left, right)))
                }
                _ => Err(Error::runtime_error(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            Type::EqualEqual => Ok(Value::Bool(left == right)),
            Type::BangEqual => Ok(Value::Bool(left != right)),
            _ => {
                let (left, right) = number_operands(operator, &left, &right)?;
                match operator.ty {
                    Type::Minus => Ok(Value::Num(left - right)),
                    Type::Slash => Ok(Value::Num(left / right)),
                    Type::Star => Ok(Value::Num(left * right)),
                    Type::Greater => Ok(Value::Bool(left > right)),
                    Type::GreaterEqual => Ok(Value::Bool(left >= right)),
                    Type::Less => Ok(Value::Bool(left < right)),
                    Type::LessEqual => Ok(Value::Bool(left <= right)),
                    _ => Err(Error::runtime_error(operator, "Invalid binary operator.")),
                }
            }
        }
    }

    fn visit_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        args: &[Expr],
    ) -> Result<Value, Error> {
        let callee = self.visit_expr(callee)?;
        let mut evaluated_args = Vec::new();
        for arg in args {
            evaluated_args.push(self.visit_expr(arg)?);
        }

        match callee {
            Value::Callable(func) => {
                if func.arity() == evaluated_args.len() {
                    func.execute(self, &evaluated_args)
                } else {
                    Err(Error::runtime_error(
                        paren,
                        &format!(
                            "Expected {} arguments but got {}.",
                            func.arity(),
                            evaluated_args.len()
                        ),
                    ))
                }
            }
            _ => Err(Error::runtime_error(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    fn visit_get(&mut self, object: &Expr, name: &Token) -> Result<Value, Error> {
        if let Value::Instance(instance) = self.visit_expr(object)? {
            match Instance::get(&instance, &name.lexeme) {
                Some(val) => Ok(val),
                None => Err(Error::runtime_error(
                    name,
                    &format!("Undefined property '{}'.", name.lexeme),
                )),
            }
        } else {
            Err(Error::runtime_error(
                name,
                "Only instances have properties.",
            ))
        }
    }

    fn visit_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value, Error> {
        match self.visit_expr(object)? {
            Value::Instance(instance) => {
                let value = self.visit_expr(value)?;
                Ok(RefCell::borrow_mut(&instance).set(&name.lexeme, value))
            }
            _ => Err(Error::runtime_error(name, "Only instances have fields.")),
        }
    }

    fn visit_this(&mut self, keyword: &Token) -> Result<Value, Error> {
        match self.lookup_variable(keyword) {
            Some(value) => Ok(value),
            None => Err(Self::undefined_variable(keyword)),
        }
    }

    fn visit_super(&mut self, keyword: &Token, method: &Token) -> Result<Value, Error> {
        let dist = match self.locals.get(&keyword.idx) {
            Some(dist) => *dist,
            None => return Err(Self::undefined_variable(keyword)),
        };

        let superclass = match RefCell::borrow(&self.env).get_at(dist, "super") {
            Some(Value::Callable(callable)) => match callable.as_class() {
                Some(class) => class,
                None => return Err(Self::undefined_variable(keyword)),
            },
            _ => return Err(Self::undefined_variable(keyword)),
        };

        // `this` always sits one environment closer than `super`
        let object = match RefCell::borrow(&self.env).get_at(dist - 1, "this") {
            Some(Value::Instance(instance)) => instance,
            _ => {
                return Err(Error::runtime_error(
                    keyword,
                    "Undefined variable 'this'.",
                ))
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(function) => Ok(Value::Callable(Rc::new(Method::bind(
                function,
                object,
                method.lexeme == "init",
            )))),
            None => Err(Error::runtime_error(
                method,
                &format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn visit_grouping(&mut self, expression: &Expr) -> Result<Value, Error> {
        self.visit_expr(expression)
    }

    fn visit_literal(&mut self, value: &Literal) -> Result<Value, Error> {
        Ok(Value::from(value.clone()))
    }

    fn visit_logical(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Error> {
        let left = self.visit_expr(left)?;

        // Short-circuiting hands back the deciding operand itself, not a
        // boolean made from it.
        match operator.ty {
            Type::Or if left.is_truthy() => Ok(left),
            Type::And if !left.is_truthy() => Ok(left),
            _ => self.visit_expr(right),
        }
    }

    fn visit_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, Error> {
        let right = self.visit_expr(right)?;
        match operator.ty {
            Type::Minus => match right {
                Value::Num(val) => Ok(Value::Num(-val)),
                _ => Err(Error::runtime_error(operator, "Operand must be a number.")),
            },
            Type::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(Error::runtime_error(operator, "Invalid unary operator.")),
        }
    }

    fn visit_variable(&mut self, name: &Token) -> Result<Value, Error> {
        match self.lookup_variable(name) {
            Some(value) => Ok(value),
            None => Err(Self::undefined_variable(name)),
        }
    }

    fn visit_empty(&mut self) -> Result<Value, Error> {
        Ok(Value::Nil)
    }
}

impl StmtVisitor for Interpreter {
    type Item = ();

    fn visit_block(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let env = Rc::new(RefCell::new(Environment::with(self.env.clone())));
        self.execute_block_with_env(statements, env)
    }

    fn visit_expression(&mut self, expression: &Expr) -> Result<(), Error> {
        self.visit_expr(expression)?;
        Ok(())
    }

    fn visit_function(
        &mut self,
        name: &Token,
        params: &[Token],
        body: &[Stmt],
    ) -> Result<(), Error> {
        let function: Rc<dyn Callable> =
            Rc::new(Function::new(self.env.clone(), name, params, body));
        RefCell::borrow_mut(&self.env).define(&name.lexeme, Value::Callable(function));
        Ok(())
    }

    fn visit_class(
        &mut self,
        name: &Token,
        superclass: &Expr,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let superclass = match superclass {
            Expr::Empty => None,
            expr => {
                let super_name = match expr {
                    Expr::Variable { name } => name,
                    other => panic!("Unexpected superclass expression '{:?}'.", other),
                };

                match self.visit_expr(expr)? {
                    Value::Callable(callable) => match callable.as_class() {
                        Some(class) => Some(class),
                        None => {
                            return Err(Error::runtime_error(
                                super_name,
                                "Superclass must be a class.",
                            ))
                        }
                    },
                    _ => {
                        return Err(Error::runtime_error(
                            super_name,
                            "Superclass must be a class.",
                        ))
                    }
                }
            }
        };

        RefCell::borrow_mut(&self.env).define(&name.lexeme, Value::Nil);

        // Method closures capture the environment of the class declaration,
        // extended with `super` when there is a superclass.
        let previous = self.env.clone();
        if let Some(superclass) = &superclass {
            let mut env = Environment::with(self.env.clone());
            let callable: Rc<dyn Callable> = Rc::clone(superclass) as Rc<dyn Callable>;
            env.define("super", Value::Callable(callable));
            self.env = Rc::new(RefCell::new(env));
        }

        let mut method_map = HashMap::new();
        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let function = Rc::new(Function::new(self.env.clone(), name, params, body));
                method_map.insert(name.lexeme.clone(), function);
            } else {
                panic!(
                    "Unexpected statement '{:?}' found in class body, expecting a method.",
                    method
                )
            }
        }

        let class = Class::new(&name.lexeme, superclass, method_map);
        self.env = previous;

        let callable: Rc<dyn Callable> = class;
        if RefCell::borrow_mut(&self.env)
            .assign(&name.lexeme, Value::Callable(callable))
            .is_err()
        {
            return Err(Self::undefined_variable(name));
        }
        Ok(())
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: &Stmt,
    ) -> Result<(), Error> {
        if self.visit_expr(condition)?.is_truthy() {
            self.visit_stmt(then_branch)
        } else {
            self.visit_stmt(else_branch)
        }
    }

    fn visit_while(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        while self.visit_expr(condition)?.is_truthy() {
            self.visit_stmt(body)?;
        }
        Ok(())
    }

    fn visit_print(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.visit_expr(expression)?;
        writeln!(RefCell::borrow_mut(&self.stdout), "{}", value).unwrap();
        Ok(())
    }

    fn visit_return(&mut self, _keyword: &Token, value: &Expr) -> Result<(), Error> {
        let value = self.visit_expr(value)?;
        Err(Error::return_value(value))
    }

    fn visit_var(&mut self, name: &Token, init: &Expr) -> Result<(), Error> {
        let value = self.visit_expr(init)?;
        RefCell::borrow_mut(&self.env).define(&name.lexeme, value);
        Ok(())
    }
}
