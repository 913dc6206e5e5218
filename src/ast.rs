//! AST for the source language
//!
//! ASDL:
//!   program = Program(declaration*)
//!   declaration = VarDecl(var_decl) | FunDecl(fun_decl)
//!   var_decl = VarDecl(type, identifier name, int offset)
//!   fun_decl = FunDecl(type return_type, identifier name, param* params,
//!                      statement* body, scope_id scope)
//!   param = Param(type, identifier name, int position)
//!   statement = VarDecl(var_decl)
//!             | Assign(identifier target, int position, exp)
//!             | Return(exp)
//!             | Expression(exp)
//!   exp = Constant(const)
//!       | Var(identifier name, int position)
//!       | Binary(binary_operator, exp, exp)
//!   const = Int(int) | Float(float)
//!   binary_operator = Add | Subtract | Multiply | Divide
//!
//! A `position` is the byte offset of a name in the source text. The
//! `offset` of a `VarDecl` is its slot in the enclosing scope instead.
//!

use crate::lexer::Identifier;
use crate::symbols::ScopeId;
use derive_more::Display;
use std::fmt::Formatter;

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Display)]
pub enum Type {
    #[display("int")]
    Int,
    #[display("float")]
    Float,
    #[display("void")]
    Void,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &FunDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::FunDecl(f) => Some(f),
            Declaration::VarDecl(_) => None,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Declaration {
    VarDecl(VarDecl),
    FunDecl(FunDecl),
}

/// A variable declaration, carrying the frame offset the symbol table
/// assigned to it when the declaration was recognised.
#[derive(Debug, PartialEq, Clone)]
pub struct VarDecl {
    pub type_: Type,
    pub name: Identifier,
    pub offset: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunDecl {
    pub return_type: Type,
    pub name: Identifier,
    pub params: Vec<Param>,
    pub body: Vec<Statement>,
    /// Local scope holding the parameters and locals
    pub scope: ScopeId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub type_: Type,
    pub name: Identifier,
    pub position: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    VarDecl(VarDecl),
    Assign {
        target: Identifier,
        position: usize,
        exp: Expression,
    },
    Return(Expression),
    Expression(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Constant(Const),
    Var { name: Identifier, position: usize },
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Number of binary operator nodes in this expression tree
    pub fn binary_count(&self) -> usize {
        match self {
            Expression::Constant(_) | Expression::Var { .. } => 0,
            Expression::Binary(_, left, right) => 1 + left.binary_count() + right.binary_count(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Const {
    Int(u64),
    Float(f64),
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::Int(i) => write!(f, "{i}"),
            // keep the decimal point so 2.0 doesn't read back as an int
            Const::Float(x) => write!(f, "{x:?}"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Display)]
pub enum BinaryOperator {
    #[display("+")]
    Add,
    #[display("-")]
    Subtract,
    #[display("*")]
    Multiply,
    #[display("/")]
    Divide,
}
