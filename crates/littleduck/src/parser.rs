//! Recursive-descent parser for the LittleDuck grammar.
//!
//! ```text
//! program   := imports 'program' ID ';' vars funcs 'main' body 'end' ';'
//! imports   := ('import' ID ';')*
//! vars      := ('var' ID (',' ID)* ':' type ';')*
//! funcs     := (('void' | type) ID '(' params ')' ':' body)*
//! body      := '{' statement* '}'
//! ```
//!
//! Expression precedence, loosest first: `||`, `&&`, comparison
//! (`==` `!=` `<` `>`), additive, multiplicative, unary (`-` `!`), primary.
//! Precedence is resolved here; the analyzer receives a shaped tree.

use crate::{
    ast::{
        Assignment, BinaryOperator, Call, DoWhile, Expression, ExpressionKind, FunctionDecl, If,
        Literal, Print, Program, Return, ScopeBlock, Statement, UnaryOperator, VarDecl, While,
    },
    errors::SyntaxError,
    lexer::{SpannedToken, Token, tokenize},
    value::ValueType,
};

/// Result alias for parser productions.
pub type ParseResult<T> = Result<T, SyntaxError>;

/// Parses a whole module from source text.
///
/// # Errors
/// Returns [`SyntaxError`] on illegal characters, unexpected tokens, or
/// premature end of file.
pub fn parse(source: &str) -> ParseResult<Program> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, position: 0 }
    }

    //
    // Token stream helpers
    //

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.position.min(self.tokens.len().saturating_sub(1)))
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> ParseResult<Token> {
        let spanned = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| self.eof_error())?;
        self.position += 1;
        Ok(spanned.token)
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        match self.peek() {
            Some(token) if token == expected => {
                self.position += 1;
                Ok(())
            }
            Some(token) => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected {expected}"),
                self.line(),
            )),
            None => Err(self.eof_error()),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        let line = self.line();
        match self.advance()? {
            Token::Ident(name) => Ok(name),
            token => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected an identifier"),
                line,
            )),
        }
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn eof_error(&self) -> SyntaxError {
        SyntaxError::new("Unexpected end of file", self.tokens.last().map_or(1, |t| t.line))
    }

    //
    // Program structure
    //

    fn program(&mut self) -> ParseResult<Program> {
        let mut imports = Vec::new();
        while self.consume(&Token::Import) {
            imports.push(self.expect_identifier()?);
            self.expect(&Token::Semicolon)?;
        }

        self.expect(&Token::Program)?;
        let identifier = self.expect_identifier()?;
        self.expect(&Token::Semicolon)?;

        let mut global_vars = Vec::new();
        while self.peek() == Some(&Token::Var) {
            global_vars.extend(self.var_declaration()?);
        }

        let mut functions = Vec::new();
        while matches!(
            self.peek(),
            Some(Token::Void | Token::Int | Token::Float | Token::String | Token::Bool)
        ) {
            functions.push(self.function()?);
        }

        self.expect(&Token::Main)?;
        let main_body = self.body()?;
        self.expect(&Token::End)?;
        self.expect(&Token::Semicolon)?;

        if let Some(token) = self.peek() {
            return Err(SyntaxError::new(
                format!("Unexpected token {token} after end of program"),
                self.line(),
            ));
        }

        Ok(Program { identifier, imports, global_vars, functions, main_body })
    }

    /// `var a, b : int;` — one declaration node per listed identifier.
    fn var_declaration(&mut self) -> ParseResult<Vec<VarDecl>> {
        self.expect(&Token::Var)?;
        let mut names = vec![self.expect_identifier()?];
        while self.consume(&Token::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(&Token::Colon)?;
        let value_type = self.type_name()?;
        self.expect(&Token::Semicolon)?;
        Ok(names
            .into_iter()
            .map(|identifier| VarDecl { identifier, value_type })
            .collect())
    }

    fn type_name(&mut self) -> ParseResult<ValueType> {
        match self.advance()? {
            Token::Int => Ok(ValueType::Int),
            Token::Float => Ok(ValueType::Float),
            Token::String => Ok(ValueType::String),
            Token::Bool => Ok(ValueType::Bool),
            token => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected a type"),
                self.line(),
            )),
        }
    }

    fn function(&mut self) -> ParseResult<FunctionDecl> {
        let return_type = if self.consume(&Token::Void) { None } else { Some(self.type_name()?) };
        let identifier = self.expect_identifier()?;
        self.expect(&Token::LParen)?;
        let mut parameters = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                let name = self.expect_identifier()?;
                self.expect(&Token::Colon)?;
                let value_type = self.type_name()?;
                parameters.push(VarDecl { identifier: name, value_type });
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        self.expect(&Token::Colon)?;
        let body = self.body()?;
        Ok(FunctionDecl { identifier, return_type, parameters, body })
    }

    //
    // Statements
    //

    fn body(&mut self) -> ParseResult<ScopeBlock> {
        self.expect(&Token::LBrace)?;
        let mut statements = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            match self.peek() {
                Some(Token::Var) => {
                    statements.extend(self.var_declaration()?.into_iter().map(Statement::VarDecl));
                }
                Some(_) => statements.push(self.statement()?),
                None => return Err(self.eof_error()),
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(ScopeBlock { statements })
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek() {
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => self.while_statement(),
            Some(Token::Do) => self.do_while_statement(),
            Some(Token::Print) => self.print_statement(),
            Some(Token::Return) => self.return_statement(),
            Some(Token::Ident(_)) => self.assignment_or_call(),
            Some(token) => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected a statement"),
                self.line(),
            )),
            None => Err(self.eof_error()),
        }
    }

    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.expression()?;
        self.expect(&Token::RParen)?;
        let body = self.body()?;
        let else_body = if self.consume(&Token::Else) { Some(self.body()?) } else { None };
        Ok(Statement::If(If { condition, body, else_body }))
    }

    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let condition = self.expression()?;
        self.expect(&Token::RParen)?;
        let body = self.body()?;
        Ok(Statement::While(While { condition, body }))
    }

    fn do_while_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::Do)?;
        let body = self.body()?;
        self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let condition = self.expression()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::Semicolon)?;
        Ok(Statement::DoWhile(DoWhile { body, condition }))
    }

    fn print_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::Print)?;
        let arguments = self.argument_list()?;
        self.expect(&Token::Semicolon)?;
        Ok(Statement::Print(Print { arguments }))
    }

    fn return_statement(&mut self) -> ParseResult<Statement> {
        self.expect(&Token::Return)?;
        let value =
            if self.peek() == Some(&Token::Semicolon) { None } else { Some(self.expression()?) };
        self.expect(&Token::Semicolon)?;
        Ok(Statement::Return(Return { value }))
    }

    fn assignment_or_call(&mut self) -> ParseResult<Statement> {
        let identifier = self.expect_identifier()?;
        match self.peek() {
            Some(Token::Assign) => {
                self.position += 1;
                let value = self.expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(Statement::Assignment(Assignment { identifier, value }))
            }
            Some(Token::LParen) => {
                let arguments = self.argument_list()?;
                self.expect(&Token::Semicolon)?;
                Ok(Statement::VoidCall(Call { identifier, arguments }))
            }
            Some(token) => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected '=' or '('"),
                self.line(),
            )),
            None => Err(self.eof_error()),
        }
    }

    /// `'(' (expr (',' expr)*)? ')'`
    fn argument_list(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(&Token::LParen)?;
        let mut arguments = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(arguments)
    }

    //
    // Expressions (precedence climbing)
    //

    fn expression(&mut self) -> ParseResult<Expression> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.and_expression()?;
        while self.consume(&Token::Or) {
            let right = self.and_expression()?;
            left = binary(BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.comparison()?;
        while self.consume(&Token::And) {
            let right = self.comparison()?;
            left = binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.additive()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Equals) => BinaryOperator::Eq,
                Some(Token::NotEquals) => BinaryOperator::Ne,
                Some(Token::Less) => BinaryOperator::Lt,
                Some(Token::Greater) => BinaryOperator::Gt,
                _ => break,
            };
            self.position += 1;
            let right = self.additive()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.multiplicative()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Plus) => BinaryOperator::Add,
                Some(Token::Minus) => BinaryOperator::Sub,
                _ => break,
            };
            self.position += 1;
            let right = self.multiplicative()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.unary()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Times) => BinaryOperator::Mul,
                Some(Token::Divide) => BinaryOperator::Div,
                _ => break,
            };
            self.position += 1;
            let right = self.unary()?;
            left = binary(operator, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.peek() {
            Some(Token::Minus) => Some(UnaryOperator::Neg),
            Some(Token::Not) => Some(UnaryOperator::Not),
            _ => None,
        };
        if let Some(operator) = operator {
            self.position += 1;
            let operand = self.unary()?;
            return Ok(Expression::new(ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            }));
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expression> {
        match self.advance()? {
            Token::CteInt(value) => Ok(Expression::new(ExpressionKind::Literal(Literal::Int(value)))),
            Token::CteFloat(value) => {
                Ok(Expression::new(ExpressionKind::Literal(Literal::Float(value))))
            }
            Token::CteString(value) => {
                Ok(Expression::new(ExpressionKind::Literal(Literal::Str(value))))
            }
            Token::CteBool(value) => {
                Ok(Expression::new(ExpressionKind::Literal(Literal::Bool(value))))
            }
            Token::Ident(identifier) => {
                if self.peek() == Some(&Token::LParen) {
                    let arguments = self.argument_list()?;
                    Ok(Expression::new(ExpressionKind::ValueCall(Call { identifier, arguments })))
                } else {
                    Ok(Expression::new(ExpressionKind::ReadVar { identifier }))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            token => Err(SyntaxError::new(
                format!("Unexpected token {token}, expected an expression"),
                self.line(),
            )),
        }
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::new(ExpressionKind::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_program_skeleton() {
        let program = parse(
            "import A;\nprogram Demo;\nvar x, y : int; var s : string;\n\
             void foo(a:int): { print(a); }\nmain { x = 1; } end;",
        )
        .unwrap();
        assert_eq!(program.identifier, "Demo");
        assert_eq!(program.imports, vec!["A".to_owned()]);
        assert_eq!(program.global_vars.len(), 3);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].identifier, "foo");
        assert_eq!(program.functions[0].return_type, None);
        assert_eq!(program.main_body.statements.len(), 1);
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let program = parse("program P; main { x = 1 + 2 * 3; } end;").unwrap();
        let Statement::Assignment(assign) = &program.main_body.statements[0] else {
            panic!("expected assignment");
        };
        let ExpressionKind::Binary { operator, right, .. } = &assign.value.kind else {
            panic!("expected binary root");
        };
        assert_eq!(*operator, BinaryOperator::Add);
        let ExpressionKind::Binary { operator: inner, .. } = &right.kind else {
            panic!("expected nested multiplication");
        };
        assert_eq!(*inner, BinaryOperator::Mul);
    }

    #[test]
    fn parses_control_flow_and_calls() {
        let program = parse(
            "program P;\nint add(a:int, b:int): { return a + b; }\n\
             main {\n  var i : int;\n  i = 0;\n  while (i < 5) { i = i + 1; }\n  \
             do { i = i - 1; } while (i > 0);\n  if (i == 0) { print(add(2, 3)); } else { print(0); }\n} end;",
        )
        .unwrap();
        assert_eq!(program.functions[0].return_type, Some(ValueType::Int));
        assert_eq!(program.main_body.statements.len(), 5);
        assert!(matches!(program.main_body.statements[2], Statement::While(_)));
        assert!(matches!(program.main_body.statements[3], Statement::DoWhile(_)));
        assert!(matches!(program.main_body.statements[4], Statement::If(_)));
    }

    #[test]
    fn rejects_missing_semicolon() {
        let err = parse("program P; main { x = 1 } end;").unwrap_err();
        assert!(err.message.contains("Unexpected token"), "{}", err.message);
    }

    #[test]
    fn rejects_multiple_assignment_targets() {
        assert!(parse("program P; main { x, y = 10; } end;").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse("program P; main { } end; extra").is_err());
    }

    #[test]
    fn unary_operators_nest() {
        let program = parse("program P; main { x = -(-1) + !y; } end;").unwrap();
        assert_eq!(program.main_body.statements.len(), 1);
    }
}
