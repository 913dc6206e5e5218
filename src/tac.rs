//! Three-address code
//!
//! ASDL:
//!   program = Program(function*)
//!   function = Function(identifier name, quadruple* body)
//!   quadruple = Quadruple(op, operand? arg1, operand? arg2, operand? result)
//!   op = Add | Subtract | Multiply | Divide | Copy | Return
//!   operand = Constant(const) | Var(identifier) | Temporary(int)
//!
//! Listing form, one quadruple per line: `op arg1 arg2 -> result`, with absent
//! operands left out.
//!

use crate::ast;
use crate::lexer::Identifier;
use crate::symbols::{ScopeId, SemanticError, SymbolTable};
use crate::temp_gen::TempGenerator;
use derive_more::Display;
use std::fmt::Formatter;
use thiserror::Error;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    /// In declaration order
    pub functions: Vec<Function>,
}

impl Program {
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub name: Identifier,
    pub body: Vec<Quadruple>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Quadruple {
    pub op: Op,
    pub arg1: Option<Operand>,
    pub arg2: Option<Operand>,
    pub result: Option<Operand>,
}

impl Quadruple {
    pub fn binary(op: Op, arg1: Operand, arg2: Operand, result: Operand) -> Self {
        Quadruple {
            op,
            arg1: Some(arg1),
            arg2: Some(arg2),
            result: Some(result),
        }
    }

    pub fn copy(src: Operand, dst: Operand) -> Self {
        Quadruple {
            op: Op::Copy,
            arg1: Some(src),
            arg2: None,
            result: Some(dst),
        }
    }

    pub fn ret(val: Operand) -> Self {
        Quadruple {
            op: Op::Return,
            arg1: Some(val),
            arg2: None,
            result: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Display)]
pub enum Op {
    #[display("+")]
    Add,
    #[display("-")]
    Subtract,
    #[display("*")]
    Multiply,
    #[display("/")]
    Divide,
    #[display(":=")]
    Copy,
    #[display("return")]
    Return,
}

impl From<ast::BinaryOperator> for Op {
    fn from(op: ast::BinaryOperator) -> Self {
        match op {
            ast::BinaryOperator::Add => Op::Add,
            ast::BinaryOperator::Subtract => Op::Subtract,
            ast::BinaryOperator::Multiply => Op::Multiply,
            ast::BinaryOperator::Divide => Op::Divide,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Display)]
pub enum Operand {
    #[display("{_0}")]
    Constant(ast::Const),
    #[display("{_0}")]
    Var(Identifier),
    #[display("{_0}")]
    Temporary(Temporary),
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Display)]
#[display("t{_0}")]
pub struct Temporary(pub usize);

impl std::fmt::Display for Quadruple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.op)?;
        for arg in [&self.arg1, &self.arg2].into_iter().flatten() {
            write!(f, " {arg}")?;
        }
        if let Some(result) = &self.result {
            write!(f, " -> {result}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for quad in &self.body {
            writeln!(f, "    {quad}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

/// Generation stopped at `function`; the functions before it were fully
/// generated and are kept in `completed`.
#[derive(Debug, PartialEq, Error)]
#[error("{source} (in function {function})")]
pub struct TacError {
    pub function: Identifier,
    pub source: SemanticError,
    pub completed: Program,
}

pub(crate) fn generate(program: &ast::Program, symbols: &SymbolTable) -> Result<Program, TacError> {
    let mut functions = vec![];

    for declaration in &program.declarations {
        match declaration {
            // storage only, no code
            ast::Declaration::VarDecl(_) => {}
            ast::Declaration::FunDecl(fun_decl) => match emit_function(fun_decl, symbols) {
                Ok(function) => functions.push(function),
                Err(source) => {
                    return Err(TacError {
                        function: fun_decl.name.clone(),
                        source,
                        completed: Program { functions },
                    });
                }
            },
        }
    }

    Ok(Program { functions })
}

/// Name resolution within one function body.
struct Names<'a> {
    symbols: &'a SymbolTable,
    scope: ScopeId,
    // locals declared so far, parameters included
    visible: usize,
}

impl Names<'_> {
    fn resolve(&self, name: &str, position: usize) -> Result<Operand, SemanticError> {
        self.symbols
            .resolve(self.scope, self.visible, name)
            .map(|symbol| Operand::Var(symbol.name.clone()))
            .map_err(|e| e.at(position))
    }
}

fn emit_function(
    fun_decl: &ast::FunDecl,
    symbols: &SymbolTable,
) -> Result<Function, SemanticError> {
    let mut names = Names {
        symbols,
        scope: fun_decl.scope,
        visible: fun_decl.params.len(),
    };
    let mut body = vec![];
    let mut temps = TempGenerator::new();

    for statement in &fun_decl.body {
        emit_statement(statement, &mut names, &mut body, &mut temps)?;
    }

    log::debug!(
        "Function {}: {} quadruples, {} temporaries",
        fun_decl.name,
        body.len(),
        temps.count()
    );

    Ok(Function {
        name: fun_decl.name.clone(),
        body,
    })
}

fn emit_statement(
    statement: &ast::Statement,
    names: &mut Names<'_>,
    instructions: &mut Vec<Quadruple>,
    temps: &mut TempGenerator,
) -> Result<(), SemanticError> {
    match statement {
        ast::Statement::VarDecl(var_decl) => {
            // Locals are numbered in declaration order, so the offset tells
            // how many of the scope's symbols are in view from here on.
            names.visible = names.visible.max(var_decl.offset + 1);
        }
        ast::Statement::Assign {
            target,
            position,
            exp,
        } => {
            let src = emit_tac(exp, names, instructions, temps)?;
            let dst = names.resolve(target, *position)?;
            instructions.push(Quadruple::copy(src, dst));
        }
        ast::Statement::Return(exp) => {
            let val = emit_tac(exp, names, instructions, temps)?;
            instructions.push(Quadruple::ret(val));
        }
        ast::Statement::Expression(exp) => {
            let _ = emit_tac(exp, names, instructions, temps)?;
        }
    }
    Ok(())
}

fn emit_tac(
    exp: &ast::Expression,
    names: &Names<'_>,
    instructions: &mut Vec<Quadruple>,
    temps: &mut TempGenerator,
) -> Result<Operand, SemanticError> {
    match exp {
        ast::Expression::Constant(c) => Ok(Operand::Constant(*c)),

        ast::Expression::Var { name, position } => names.resolve(name, *position),

        ast::Expression::Binary(op, left, right) => {
            // left before right, always
            let src1 = emit_tac(left, names, instructions, temps)?;
            let src2 = emit_tac(right, names, instructions, temps)?;
            let dst = Operand::Temporary(temps.next());
            let quad = Quadruple::binary((*op).into(), src1, src2, dst.clone());
            log::trace!("{quad}");
            instructions.push(quad);
            Ok(dst)
        }
    }
}
