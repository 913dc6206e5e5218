//! Semantic actions run as grammar rules are recognised
//!
//! A parser reports each completed rule through [`SemanticActions`]. The
//! [`Translator`] implementation populates the symbol table as declarations
//! arrive and builds the AST; expression and statement rules only build nodes.

use crate::ast::{BinaryOperator, Const, Expression, FunDecl, Param, Statement, Type, VarDecl};
use crate::lexer::Identifier;
use crate::symbols::{ScopeId, SemanticError, SymbolTable};

pub trait SemanticActions {
    /// `type name ;`, where `offset` is the byte position of `name`
    fn on_var_decl(
        &mut self,
        type_: Type,
        name: Identifier,
        offset: usize,
    ) -> Result<VarDecl, SemanticError>;

    /// `type name ( params )`, before the body is parsed; `offset` is the
    /// byte position of `name`
    fn on_func_start(
        &mut self,
        return_type: Type,
        name: Identifier,
        params: Vec<Param>,
        offset: usize,
    ) -> Result<(), SemanticError>;

    /// `{ body }` closing the most recently started function
    fn on_func_end(&mut self, body: Vec<Statement>) -> Result<FunDecl, SemanticError>;

    fn on_assign(&mut self, target: Identifier, position: usize, exp: Expression) -> Statement {
        Statement::Assign {
            target,
            position,
            exp,
        }
    }

    fn on_return(&mut self, exp: Expression) -> Statement {
        Statement::Return(exp)
    }

    fn on_expression(&mut self, exp: Expression) -> Statement {
        Statement::Expression(exp)
    }

    fn on_binary(
        &mut self,
        op: BinaryOperator,
        left: Expression,
        right: Expression,
    ) -> Expression {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    fn on_literal(&mut self, value: Const) -> Expression {
        Expression::Constant(value)
    }

    fn on_var_ref(&mut self, name: Identifier, position: usize) -> Expression {
        Expression::Var { name, position }
    }
}

#[derive(Debug)]
struct FunctionHeader {
    return_type: Type,
    name: Identifier,
    params: Vec<Param>,
    scope: ScopeId,
}

/// Builds the AST and symbol table for one compilation unit.
#[derive(Debug, Default)]
pub struct Translator {
    symbols: SymbolTable,
    headers: Vec<FunctionHeader>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }
}

impl SemanticActions for Translator {
    fn on_var_decl(
        &mut self,
        type_: Type,
        name: Identifier,
        offset: usize,
    ) -> Result<VarDecl, SemanticError> {
        let symbol = self
            .symbols
            .declare_variable(name.clone(), type_)
            .map_err(|e| e.at(offset))?;
        let offset = symbol.offset().unwrap_or_default();
        Ok(VarDecl {
            type_,
            name,
            offset,
        })
    }

    fn on_func_start(
        &mut self,
        return_type: Type,
        name: Identifier,
        params: Vec<Param>,
        offset: usize,
    ) -> Result<(), SemanticError> {
        let param_types = params.iter().map(|p| p.type_).collect();
        self.symbols
            .declare_function(name.clone(), return_type, param_types)
            .map_err(|e| e.at(offset))?;

        self.symbols.enter_scope();
        for param in &params {
            self.symbols
                .declare_variable(param.name.clone(), param.type_)
                .map_err(|e| e.at(param.position))?;
        }

        log::debug!("Function {name}: local scope {}", self.symbols.current_scope());
        self.headers.push(FunctionHeader {
            return_type,
            name,
            params,
            scope: self.symbols.current_scope(),
        });
        Ok(())
    }

    fn on_func_end(&mut self, body: Vec<Statement>) -> Result<FunDecl, SemanticError> {
        let FunctionHeader {
            return_type,
            name,
            params,
            scope,
        } = self.headers.pop().ok_or(SemanticError::ScopeUnderflow)?;

        self.symbols.leave_scope()?;

        Ok(FunDecl {
            return_type,
            name,
            params,
            body,
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Symbol, SymbolKind};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn param(type_: Type, name: &str, position: usize) -> Param {
        Param {
            type_,
            name: name.into(),
            position,
        }
    }

    #[test]
    fn test_var_decl_declares_in_current_scope() {
        let mut translator = Translator::new();
        let x = translator.on_var_decl(Type::Int, "x".into(), 4).unwrap();
        let y = translator.on_var_decl(Type::Float, "y".into(), 11).unwrap();
        assert_eq!(
            (x.offset, y.offset, y.type_),
            (0, 1, Type::Float)
        );
        assert_eq!(
            translator.symbols().lookup("y").unwrap(),
            &Symbol {
                name: "y".into(),
                type_: Type::Float,
                kind: SymbolKind::Variable { offset: 1 },
            }
        );
    }

    #[test]
    fn test_var_decl_duplicate_reports_position() {
        let mut translator = Translator::new();
        translator.on_var_decl(Type::Int, "x".into(), 4).unwrap();
        assert_eq!(
            translator.on_var_decl(Type::Int, "x".into(), 15),
            Err(SemanticError::DuplicateSymbol {
                name: "x".into(),
                offset: Some(15)
            })
        );
    }

    #[test]
    fn test_function_scope_lifecycle() {
        let mut translator = Translator::new();
        translator
            .on_func_start(
                Type::Int,
                "add".into(),
                vec![param(Type::Int, "a", 12), param(Type::Int, "b", 19)],
                4,
            )
            .unwrap();

        // function is in the enclosing scope, params in the new one
        assert_eq!(translator.symbols().depth(), 1);
        assert_eq!(translator.symbols().lookup("a").unwrap().offset(), Some(0));
        assert_eq!(translator.symbols().lookup("b").unwrap().offset(), Some(1));
        assert_eq!(
            translator.symbols().symbols_in(ScopeId::GLOBAL)[0].kind,
            SymbolKind::Function {
                param_types: vec![Type::Int, Type::Int]
            }
        );

        let z = translator.on_var_decl(Type::Int, "z".into(), 30).unwrap();
        assert_eq!(z.offset, 2);

        let z_ref = translator.on_var_ref("z".into(), 50);
        let body = vec![translator.on_return(z_ref)];
        let fun_decl = translator.on_func_end(body).unwrap();
        assert_eq!(fun_decl.name, "add");
        assert_eq!(fun_decl.params.len(), 2);
        assert_eq!(fun_decl.body.len(), 1);

        assert_eq!(translator.symbols().depth(), 0);
        assert_matches!(
            translator.symbols().lookup("a"),
            Err(SemanticError::UndeclaredSymbol { .. })
        );
        assert_eq!(
            translator
                .symbols()
                .symbols_in(fun_decl.scope)
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b", "z"]
        );
    }

    #[test]
    fn test_duplicate_function() {
        let mut translator = Translator::new();
        translator
            .on_func_start(Type::Void, "f".into(), vec![], 5)
            .unwrap();
        translator.on_func_end(vec![]).unwrap();
        assert_matches!(
            translator.on_func_start(Type::Int, "f".into(), vec![], 40),
            Err(SemanticError::DuplicateSymbol { offset: Some(40), .. })
        );
    }

    #[test]
    fn test_duplicate_parameter() {
        // int f(int a, float a)
        let mut translator = Translator::new();
        assert_eq!(
            translator.on_func_start(
                Type::Int,
                "f".into(),
                vec![param(Type::Int, "a", 10), param(Type::Float, "a", 19)],
                4
            ),
            Err(SemanticError::DuplicateSymbol {
                name: "a".into(),
                offset: Some(19)
            })
        );
    }

    #[test]
    fn test_parameter_may_shadow_global() {
        let mut translator = Translator::new();
        translator.on_var_decl(Type::Int, "a".into(), 4).unwrap();
        translator
            .on_func_start(Type::Int, "f".into(), vec![param(Type::Float, "a", 24)], 11)
            .unwrap();
        assert_eq!(translator.symbols().lookup("a").unwrap().type_, Type::Float);
    }

    #[test]
    fn test_func_end_without_start() {
        let mut translator = Translator::new();
        assert_eq!(
            translator.on_func_end(vec![]),
            Err(SemanticError::ScopeUnderflow)
        );
    }

    #[test]
    fn test_node_builders() {
        let mut translator = Translator::new();
        let left = translator.on_literal(Const::Int(2));
        let right = translator.on_var_ref("x".into(), 6);
        let exp = translator.on_binary(BinaryOperator::Add, left, right);
        assert_eq!(
            exp,
            Expression::Binary(
                BinaryOperator::Add,
                Box::new(Expression::Constant(Const::Int(2))),
                Box::new(Expression::Var {
                    name: "x".into(),
                    position: 6
                }),
            )
        );
        // assignments are not checked against the symbol table here
        assert_eq!(
            translator.on_assign("undeclared".into(), 0, exp.clone()),
            Statement::Assign {
                target: "undeclared".into(),
                position: 0,
                exp
            }
        );
    }
}
