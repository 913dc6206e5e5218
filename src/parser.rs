//! Parser for the source language
//!
//! Grammar:
//!   <program> ::= { <declaration> }
//!   <declaration> ::= <type> <identifier> <function-rest>
//!                   | <type> <identifier> { "," <identifier> } ";"
//!   <function-rest> ::= "(" <params> ")" "{" { <statement> } "}"
//!   <params> ::= [ "void" ] | <type> <identifier> { "," <type> <identifier> }
//!   <statement> ::= <type> <identifier> { "," <identifier> } ";"
//!                 | "return" <exp> ";"
//!                 | <identifier> "=" <exp> ";"
//!                 | <exp> ";"
//!   <exp> ::= <term> { ("+" | "-") <term> }
//!   <term> ::= <factor> { ("*" | "/") <factor> }
//!   <factor> ::= <int> | <float> | <identifier> | "(" <exp> ")"
//!   <type> ::= "int" | "float" | "void"
//!
//! Each completed rule is handed to a [`SemanticActions`] implementation, which
//! builds the AST node and, for declarations, updates the symbol table while
//! the parse is still in progress.
//!

use crate::ast::{
    BinaryOperator, Const, Declaration, Expression, FunDecl, Param, Program, Statement, Type,
    VarDecl,
};
use crate::lexer::{Identifier, Keyword, Token, TokenKind};
use crate::semantics::SemanticActions;
use crate::symbols::SemanticError;
use thiserror::Error;
use winnow::combinator::{opt, peek, separated};
use winnow::error::{ContextError, FromExternalError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{Stream, TokenSlice};
use winnow::token::{any, one_of};

#[derive(Debug, PartialEq, Error)]
#[error("{message}")]
pub struct ParserError {
    pub message: String,
    pub expected: String,
    pub found: String,
    pub offset: usize,
}

impl ParserError {
    // Avoiding `From` so winnow types don't become part of our public API
    fn from_parse(error: &winnow::error::ParseError<Tokens<'_>, ContextError>) -> Self {
        let context = error.inner().context();
        let expected = context
            .filter_map(|c| match c {
                StrContext::Expected(e) => Some(e.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>();

        let expected = expected.first().cloned().unwrap_or("unknown".to_string());

        let found = error
            .input()
            .get(error.offset())
            .map(|t| format!("{:?}", t.kind))
            .unwrap_or("EOF".into());

        let offset = if error.input().is_empty() {
            0
        } else {
            error
                .input()
                .get(error.offset())
                .map(|e| e.span.start)
                .unwrap_or(
                    // Unexpected EOF, so get the end of the last token's span
                    error
                        .input()
                        .get(error.offset() - 1)
                        .map(|e| e.span.end)
                        .unwrap_or(0),
                )
        };

        ParserError {
            message: format!("Expected {}, found {:?}", expected, found),
            expected,
            found,
            offset,
        }
    }
}

type Tokens<'i> = TokenSlice<'i, Token>;

impl winnow::stream::ContainsToken<&'_ Token> for TokenKind {
    #[inline(always)]
    fn contains_token(&self, token: &'_ Token) -> bool {
        *self == token.kind
    }
}

/// Parse a token stream, reporting each recognised rule to `actions`.
///
/// A semantic failure raised by an action (a duplicate declaration, say)
/// aborts the parse and is returned as-is, not as a syntax error.
pub(crate) fn parse<A: SemanticActions>(
    input: &[Token],
    actions: &mut A,
) -> Result<Program, crate::Error> {
    let tokens = Tokens::new(input);
    let mut parser = |i: &mut Tokens<'_>| program(i, actions);
    let program = parser.parse(tokens).map_err(|e| {
        let semantic = e
            .inner()
            .cause()
            .and_then(|cause| cause.downcast_ref::<SemanticError>())
            .cloned();
        match semantic {
            Some(semantic) => crate::Error::Semantic(semantic),
            None => crate::Error::Parser(ParserError::from_parse(&e)),
        }
    })?;
    Ok(program)
}

// Carry a semantic failure through winnow's error type
fn raise<T>(i: &Tokens<'_>, result: Result<T, SemanticError>) -> winnow::Result<T> {
    result.map_err(|e| ContextError::from_external_error(i, e))
}

fn peek_kind<'i>(i: &mut Tokens<'i>) -> Option<&'i TokenKind> {
    let next: winnow::Result<&'i Token> = peek(any).parse_next(i);
    next.ok().map(|t| &t.kind)
}

fn program<A: SemanticActions>(i: &mut Tokens<'_>, actions: &mut A) -> winnow::Result<Program> {
    let mut declarations = vec![];
    while i.eof_offset() > 0 {
        declarations.extend(declaration(i, actions)?);
    }
    Ok(Program { declarations })
}

fn declaration<A: SemanticActions>(
    i: &mut Tokens<'_>,
    actions: &mut A,
) -> winnow::Result<Vec<Declaration>> {
    let type_ = type_specifier
        .context(StrContext::Label("declaration"))
        .parse_next(i)?;
    let (name, offset) = identifier.parse_next(i)?;

    if peek_kind(i) == Some(&TokenKind::OpenParen) {
        let fun_decl = function(type_, name, offset, i, actions)?;
        Ok(vec![Declaration::FunDecl(fun_decl)])
    } else {
        let variables = variable_declarations(type_, name, offset, i, actions)?;
        Ok(variables.into_iter().map(Declaration::VarDecl).collect())
    }
}

fn function<A: SemanticActions>(
    return_type: Type,
    name: Identifier,
    offset: usize,
    i: &mut Tokens<'_>,
    actions: &mut A,
) -> winnow::Result<FunDecl> {
    punctuation(i, TokenKind::OpenParen, "(")?;
    let params = parameters(i)?;
    punctuation(i, TokenKind::CloseParen, ")")?;

    raise(i, actions.on_func_start(return_type, name, params, offset))?;

    punctuation(i, TokenKind::OpenBrace, "{")?;
    let mut body = vec![];
    while peek_kind(i) != Some(&TokenKind::CloseBrace) {
        body.extend(statement(i, actions)?);
    }
    punctuation(i, TokenKind::CloseBrace, "}")?;

    raise(i, actions.on_func_end(body))
}

fn parameters(i: &mut Tokens<'_>) -> winnow::Result<Vec<Param>> {
    // `f()` and `f(void)` both take no parameters
    if opt((
        one_of(TokenKind::Keyword(Keyword::Void)),
        peek(one_of(TokenKind::CloseParen)),
    ))
    .parse_next(i)?
    .is_some()
        || peek_kind(i) == Some(&TokenKind::CloseParen)
    {
        return Ok(vec![]);
    }

    separated(1.., parameter, one_of(TokenKind::Comma))
        .context(StrContext::Label("parameters"))
        .parse_next(i)
}

fn parameter(i: &mut Tokens<'_>) -> winnow::Result<Param> {
    let type_ = type_specifier.parse_next(i)?;
    let (name, position) = identifier.parse_next(i)?;
    Ok(Param {
        type_,
        name,
        position,
    })
}

// `type a, b, c;` once `type a` has been consumed
fn variable_declarations<A: SemanticActions>(
    type_: Type,
    name: Identifier,
    offset: usize,
    i: &mut Tokens<'_>,
    actions: &mut A,
) -> winnow::Result<Vec<VarDecl>> {
    let mut names = vec![(name, offset)];
    while opt(one_of(TokenKind::Comma)).parse_next(i)?.is_some() {
        names.push(identifier.parse_next(i)?);
    }
    punctuation(i, TokenKind::Semicolon, ";")?;

    names
        .into_iter()
        .map(|(name, offset)| raise(i, actions.on_var_decl(type_, name, offset)))
        .collect()
}

fn statement<A: SemanticActions>(
    i: &mut Tokens<'_>,
    actions: &mut A,
) -> winnow::Result<Vec<Statement>> {
    match peek_kind(i) {
        Some(TokenKind::Keyword(Keyword::Int | Keyword::Float | Keyword::Void)) => {
            let type_ = type_specifier.parse_next(i)?;
            let (name, offset) = identifier.parse_next(i)?;
            let variables = variable_declarations(type_, name, offset, i, actions)?;
            Ok(variables.into_iter().map(Statement::VarDecl).collect())
        }
        Some(TokenKind::Keyword(Keyword::Return)) => {
            one_of(TokenKind::Keyword(Keyword::Return)).parse_next(i)?;
            let exp = exp(i, actions)?;
            punctuation(i, TokenKind::Semicolon, ";")?;
            Ok(vec![actions.on_return(exp)])
        }
        _ => {
            if let Some(((target, position), _)) =
                opt((identifier, one_of(TokenKind::Assign))).parse_next(i)?
            {
                let exp = exp(i, actions)?;
                punctuation(i, TokenKind::Semicolon, ";")?;
                return Ok(vec![actions.on_assign(target, position, exp)]);
            }
            let exp = exp(i, actions)?;
            punctuation(i, TokenKind::Semicolon, ";")?;
            Ok(vec![actions.on_expression(exp)])
        }
    }
}

fn exp<A: SemanticActions>(i: &mut Tokens<'_>, actions: &mut A) -> winnow::Result<Expression> {
    let mut left = term(i, actions)?;
    while let Some(op) = opt(additive_operator).parse_next(i)? {
        let right = term(i, actions)?;
        left = actions.on_binary(op, left, right);
    }
    Ok(left)
}

fn term<A: SemanticActions>(i: &mut Tokens<'_>, actions: &mut A) -> winnow::Result<Expression> {
    let mut left = factor(i, actions)?;
    while let Some(op) = opt(multiplicative_operator).parse_next(i)? {
        let right = factor(i, actions)?;
        left = actions.on_binary(op, left, right);
    }
    Ok(left)
}

enum Primary {
    Literal(Const),
    Var(Identifier, usize),
}

fn factor<A: SemanticActions>(i: &mut Tokens<'_>, actions: &mut A) -> winnow::Result<Expression> {
    if opt(one_of(TokenKind::OpenParen)).parse_next(i)?.is_some() {
        let exp = exp(i, actions)?;
        punctuation(i, TokenKind::CloseParen, ")")?;
        return Ok(exp);
    }

    let primary = any
        .verify_map(|t: &Token| match &t.kind {
            TokenKind::IntConstant(c) => Some(Primary::Literal(Const::Int(*c))),
            TokenKind::FloatConstant(c) => Some(Primary::Literal(Const::Float(*c))),
            TokenKind::Identifier(name) => Some(Primary::Var(name.clone(), t.span.start)),
            _ => None,
        })
        .context(StrContext::Label("expression"))
        .context(StrContext::Expected(StrContextValue::Description(
            "expression",
        )))
        .parse_next(i)?;

    Ok(match primary {
        Primary::Literal(value) => actions.on_literal(value),
        Primary::Var(name, position) => actions.on_var_ref(name, position),
    })
}

fn additive_operator(i: &mut Tokens<'_>) -> winnow::Result<BinaryOperator> {
    any.verify_map(|t: &Token| match t.kind {
        TokenKind::Plus => Some(BinaryOperator::Add),
        TokenKind::Minus => Some(BinaryOperator::Subtract),
        _ => None,
    })
    .parse_next(i)
}

fn multiplicative_operator(i: &mut Tokens<'_>) -> winnow::Result<BinaryOperator> {
    any.verify_map(|t: &Token| match t.kind {
        TokenKind::Star => Some(BinaryOperator::Multiply),
        TokenKind::Slash => Some(BinaryOperator::Divide),
        _ => None,
    })
    .parse_next(i)
}

fn punctuation(i: &mut Tokens<'_>, kind: TokenKind, expected: &'static str) -> winnow::Result<()> {
    one_of(kind)
        .void()
        .context(StrContext::Expected(StrContextValue::StringLiteral(expected)))
        .parse_next(i)
}

fn type_specifier(i: &mut Tokens<'_>) -> winnow::Result<Type> {
    any.verify_map(|t: &Token| match t.kind {
        TokenKind::Keyword(Keyword::Int) => Some(Type::Int),
        TokenKind::Keyword(Keyword::Float) => Some(Type::Float),
        TokenKind::Keyword(Keyword::Void) => Some(Type::Void),
        _ => None,
    })
    .context(StrContext::Label("type"))
    .context(StrContext::Expected(StrContextValue::Description("type")))
    .parse_next(i)
}

/// An identifier and the byte offset it starts at
fn identifier(i: &mut Tokens<'_>) -> winnow::Result<(Identifier, usize)> {
    any.verify_map(|t: &Token| match &t.kind {
        TokenKind::Identifier(id) => Some((id.clone(), t.span.start)),
        _ => None,
    })
    .context(StrContext::Label("identifier"))
    .context(StrContext::Expected(StrContextValue::Description(
        "identifier",
    )))
    .parse_next(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::semantics::Translator;
    use crate::symbols::ScopeId;
    use crate::Error;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn do_parse(input: &str) -> Result<(Program, Translator), Error> {
        let mut translator = Translator::new();
        let program = parse(&lex(input)?, &mut translator)?;
        Ok((program, translator))
    }

    fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    fn int(i: u64) -> Expression {
        Expression::Constant(Const::Int(i))
    }

    fn var(name: &str, position: usize) -> Expression {
        Expression::Var {
            name: name.into(),
            position,
        }
    }

    #[test]
    fn test_parse_function() {
        let input = "int add(int a, int b) { return a + b; }";
        let (program, translator) = do_parse(input).unwrap();
        assert_eq!(program.declarations.len(), 1);

        let add = program.functions().next().unwrap();
        assert_eq!(
            add,
            &FunDecl {
                return_type: Type::Int,
                name: "add".into(),
                params: vec![
                    Param {
                        type_: Type::Int,
                        name: "a".into(),
                        position: 12
                    },
                    Param {
                        type_: Type::Int,
                        name: "b".into(),
                        position: 19
                    },
                ],
                body: vec![Statement::Return(binary(
                    BinaryOperator::Add,
                    var("a", 31),
                    var("b", 35),
                ))],
                scope: add.scope,
            }
        );
        assert_ne!(add.scope, ScopeId::GLOBAL);
        assert_eq!(translator.symbols().parent_of(add.scope), Some(ScopeId::GLOBAL));
        assert_eq!(translator.symbols().depth(), 0);
    }

    #[test]
    fn test_parse_precedence_and_associativity() {
        let input = "int f() { return 1 - 2 - 3 * 4 / (5 + 6); }";
        let (program, _) = do_parse(input).unwrap();
        let body = &program.functions().next().unwrap().body;
        // ((1 - 2) - ((3 * 4) / (5 + 6)))
        assert_eq!(
            body,
            &vec![Statement::Return(binary(
                BinaryOperator::Subtract,
                binary(BinaryOperator::Subtract, int(1), int(2)),
                binary(
                    BinaryOperator::Divide,
                    binary(BinaryOperator::Multiply, int(3), int(4)),
                    binary(BinaryOperator::Add, int(5), int(6)),
                ),
            ))]
        );
    }

    #[test]
    fn test_parse_statements() {
        let input = "void main(void) { int x, y; float z; x = 1; z = 2.5; x + y; return x; }";
        let (program, translator) = do_parse(input).unwrap();
        let main = program.functions().next().unwrap();
        assert!(main.params.is_empty());
        assert_eq!(
            main.body,
            vec![
                Statement::VarDecl(VarDecl {
                    type_: Type::Int,
                    name: "x".into(),
                    offset: 0
                }),
                Statement::VarDecl(VarDecl {
                    type_: Type::Int,
                    name: "y".into(),
                    offset: 1
                }),
                Statement::VarDecl(VarDecl {
                    type_: Type::Float,
                    name: "z".into(),
                    offset: 2
                }),
                Statement::Assign {
                    target: "x".into(),
                    position: 37,
                    exp: int(1)
                },
                Statement::Assign {
                    target: "z".into(),
                    position: 44,
                    exp: Expression::Constant(Const::Float(2.5))
                },
                Statement::Expression(binary(BinaryOperator::Add, var("x", 53), var("y", 57))),
                Statement::Return(var("x", 67)),
            ]
        );
        assert_eq!(translator.symbols().symbols_in(main.scope).len(), 3);
    }

    #[test]
    fn test_parse_globals() {
        let (program, translator) = do_parse("int x, y; float z;").unwrap();
        assert_eq!(program.declarations.len(), 3);
        assert_matches!(
            &program.declarations[2],
            Declaration::VarDecl(VarDecl { name, offset: 2, type_: Type::Float }) if name == "z"
        );
        assert_eq!(translator.symbols().snapshot().count(), 3);
    }

    #[test]
    fn test_parse_duplicate_global() {
        let input = "int x;\nint x;";
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Semantic(SemanticError::DuplicateSymbol { name, offset: Some(11) }) if name == "x"
        );
    }

    #[test]
    fn test_parse_duplicate_local() {
        let input = "int f(int a) { int b; float a; return b; }";
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Semantic(SemanticError::DuplicateSymbol { name, offset: Some(28) }) if name == "a"
        );
    }

    #[test]
    fn test_parse_duplicate_parameter() {
        let input = "int f(int a, float a) { return a; }";
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Semantic(SemanticError::DuplicateSymbol { name, offset: Some(19) }) if name == "a"
        );
    }

    #[test]
    fn test_parse_local_may_shadow_global() {
        let input = "int a; int f() { float a; return a; }";
        let (program, translator) = do_parse(input).unwrap();
        let f = program.functions().next().unwrap();
        assert_eq!(translator.symbols().symbols_in(f.scope)[0].type_, Type::Float);
    }

    #[test]
    fn test_parse_undeclared_is_not_a_parse_error() {
        // name resolution happens when generating TAC
        let input = "int f() { x = 1; return y; }";
        assert_matches!(do_parse(input), Ok(_));
    }

    #[test]
    fn test_parse_error_incomplete_identifier() {
        let input = r#"int "#;
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Parser(ParserError {
                message: _,
                expected,
                found,
                offset
            }) if expected == "identifier" && found == "EOF" && offset == 3
        );
    }

    #[test]
    fn test_parse_error_incomplete_expression() {
        let input = r#"int main(void) { return"#;
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Parser(ParserError {
                message: _,
                expected,
                found,
                offset
            }) if expected == "expression" && found == "EOF" && offset == 23
        );
    }

    #[test]
    fn test_parse_error_switched_parens() {
        let input = r#"int main )( { return 0; }"#;
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Parser(ParserError {
                message: _,
                expected,
                found,
                offset
            }) if expected == "`;`" && found == "CloseParen" && offset == 9
        );
    }

    #[test]
    fn test_parse_error_missing_semicolon() {
        let input = "int f() { return 1 }";
        assert_matches!(
            do_parse(input).unwrap_err(),
            Error::Parser(ParserError { expected, .. }) if expected == "`;`"
        );
    }

    #[test]
    fn test_parse_error_unclosed_body() {
        assert_matches!(do_parse("int f() { return 1;"), Err(Error::Parser(_)));
    }
}
