use crate::spec::OdeSystemSpec;
use crate::traits::OdeSystem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("parse error in `{input}`: {reason}")]
    Parse { input: String, reason: String },
    #[error("unknown variable or parameter: {0}")]
    UnknownSymbol(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(char),
    #[error("no equation for state variable `{0}`")]
    MissingEquation(String),
}

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a state variable (by index) onto the stack.
    /// Indices correspond to the order variables were defined (e.g., 0=x, 1=y).
    LoadVar(usize),
    /// Pushes the value of a parameter (by index) onto the stack.
    LoadParam(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes sin(a).
    Sin,
    /// Pops top value (a), pushes cos(a).
    Cos,
    /// Pops top value (a), pushes exp(a).
    Exp,
    /// Pops top value (a), pushes -a.
    Neg,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based Virtual Machine for evaluating equations.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `vars`: Current state vector (read-only).
/// - `params`: Parameter vector (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
///
/// A malformed program evaluates to NaN, which the solvers treat as a failed step.
pub struct VM;

impl VM {
    pub fn execute(bytecode: &Bytecode, vars: &[f64], params: &[f64], stack: &mut Vec<f64>) -> f64 {
        stack.clear();

        for op in &bytecode.ops {
            match op {
                OpCode::LoadConst(val) => stack.push(*val),
                OpCode::LoadVar(idx) => stack.push(vars.get(*idx).copied().unwrap_or(f64::NAN)),
                OpCode::LoadParam(idx) => {
                    stack.push(params.get(*idx).copied().unwrap_or(f64::NAN))
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    let b = stack.pop().unwrap_or(f64::NAN);
                    let a = stack.pop().unwrap_or(f64::NAN);
                    stack.push(match op {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    });
                }
                OpCode::Sin | OpCode::Cos | OpCode::Exp | OpCode::Neg => {
                    let a = stack.pop().unwrap_or(f64::NAN);
                    stack.push(match op {
                        OpCode::Sin => a.sin(),
                        OpCode::Cos => a.cos(),
                        OpCode::Exp => a.exp(),
                        _ => -a,
                    });
                }
            }
        }

        stack.pop().unwrap_or(f64::NAN)
    }
}

// --- AST ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, ^
    Unary(char, Box<Expr>),             // only '-'
    Call(String, Box<Expr>),            // sin, cos, exp
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    /// Numeric literal. Negative values become a negated literal, the shape the parser builds.
    pub fn num(value: f64) -> Self {
        if value.is_sign_negative() {
            Expr::Unary('-', Box::new(Expr::Number(-value)))
        } else {
            Expr::Number(value)
        }
    }

    pub fn call(function: &str, arg: Expr) -> Self {
        Expr::Call(function.to_string(), Box::new(arg))
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Binary(Box::new(self), '^', Box::new(exponent))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, '+' | '-', _) => 1,
            Expr::Binary(_, '^', _) => 4,
            Expr::Binary(..) => 2,
            Expr::Unary(..) => 3,
            Expr::Number(n) if n.is_sign_negative() => 3,
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Canonical infix form. Re-parsing the output yields the same tree, except that a
/// negative `Expr::Number` built by hand comes back as a negated literal.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Call(name, arg) => write!(f, "{name}({arg})"),
            Expr::Unary(op, operand) => {
                write!(f, "{op}")?;
                operand.fmt_operand(f, operand.precedence() < 3)
            }
            Expr::Binary(left, '^', right) => {
                left.fmt_operand(f, left.precedence() <= 4)?;
                write!(f, "^")?;
                right.fmt_operand(f, right.precedence() < 4)
            }
            Expr::Binary(left, op, right) => {
                let prec = self.precedence();
                left.fmt_operand(f, left.precedence() < prec)?;
                write!(f, " {op} ")?;
                right.fmt_operand(f, right.precedence() <= prec)
            }
        }
    }
}

macro_rules! expr_binop {
    ($trait:ident, $method:ident, $op:literal) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary(Box::new(self), $op, Box::new(rhs))
            }
        }
    };
}

expr_binop!(Add, add, '+');
expr_binop!(Sub, sub, '-');
expr_binop!(Mul, mul, '*');
expr_binop!(Div, div, '/');

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Unary('-', Box::new(self))
    }
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable and parameter names to indices.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new<V: AsRef<str>, P: AsRef<str>>(var_names: &[V], param_names: &[P]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().to_string(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().to_string(), i))
            .collect();
        Self { var_map, param_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else {
                    return Err(ExpressionError::UnknownSymbol(name.clone()));
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    _ => return Err(ExpressionError::UnknownOperator(*op)),
                });
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    _ => return Err(ExpressionError::UnknownOperator(*op)),
                }
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, ops)?;
                ops.push(match func.as_str() {
                    "sin" => OpCode::Sin,
                    "cos" => OpCode::Cos,
                    "exp" => OpCode::Exp,
                    _ => return Err(ExpressionError::UnknownFunction(func.clone())),
                });
            }
        }
        Ok(())
    }
}

// --- Simple Parser ---

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let fail = |reason: &str| ExpressionError::Parse {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let tokens = tokenize(input).map_err(|reason| fail(&reason))?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression().map_err(|reason| fail(&reason))?;
    if parser.pos != parser.tokens.len() {
        return Err(fail("unexpected trailing input"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| format!("invalid number literal `{num_str}`"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(format!("unexpected character `{other}`")),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err("expected ')'".to_string()),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Unary minus binds looser than '^': -x^2 == -(x^2).
    fn parse_unary(&mut self) -> Result<Expr, String> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary('-', Box::new(expr)));
        }
        self.parse_power()
    }

    // Right-associative: a^b^c == a^(b^c).
    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

// --- EquationSystem ---

/// An `OdeSystem` evaluated from symbolic equations.
/// Contains one compiled bytecode expression per state variable.
pub struct EquationSystem {
    pub equations: Vec<Bytecode>,
    pub params: Vec<f64>,
    // Interior mutability for VM stack to avoid allocation in derivative.
    // Note: This makes the system !Sync.
    stack: RefCell<Vec<f64>>,
}

impl EquationSystem {
    pub fn new(equations: Vec<Bytecode>, params: Vec<f64>) -> Self {
        Self {
            equations,
            params,
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    /// Compiles the symbolic equations of a spec so it can be integrated.
    /// Parameters are rounded to `f64` here and nowhere else.
    pub fn from_spec(spec: &OdeSystemSpec) -> Result<Self, ExpressionError> {
        let param_names: Vec<&str> = spec.parameters().keys().map(String::as_str).collect();
        let compiler = Compiler::new(spec.state_variable_names(), &param_names);

        let mut bytecodes = Vec::with_capacity(spec.state_dimension());
        for name in spec.state_variable_names() {
            let source = spec
                .symbolic_equations()
                .get(name)
                .ok_or_else(|| ExpressionError::MissingEquation(name.clone()))?;
            bytecodes.push(compiler.compile(&parse(source)?)?);
        }

        let params = spec.parameters().values().map(|p| p.to_f64()).collect();
        Ok(Self::new(bytecodes, params))
    }
}

impl OdeSystem for EquationSystem {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn derivative(&self, _t: f64, state: &[f64], out: &mut [f64]) {
        let mut stack = self.stack.borrow_mut();
        for (i, eq) in self.equations.iter().enumerate() {
            out[i] = VM::execute(eq, state, &self.params, &mut stack);
        }
    }
}
