//! Recursive-descent Pratt parser producing the Mica AST.

use crate::ast::{Block, Expr, FunctionLiteral, InfixOp, PrefixOp, Program, Stmt};
use crate::error::ParserError;
use crate::lexer::Token;
use crate::parser::precedence::Precedence;

const EOF: Token = Token::Eof;

/// Result type for parsing.
pub type ParseResult<T> = Result<T, ParserError>;

/// The parser walks a token stream with a one-token lookahead.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the whole token stream into a program.
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while *self.current() != Token::Eof {
            statements.push(self.parse_statement()?);
            self.advance();
        }
        Ok(Program { statements })
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&EOF)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position + 1).unwrap_or(&EOF)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn expect_current(&self, expected: Token, context: &str) -> ParseResult<()> {
        if *self.current() == expected {
            Ok(())
        } else if *self.current() == Token::Eof {
            Err(ParserError::UnexpectedEof)
        } else {
            Err(ParserError::unexpected_token(
                format!("'{}' {}", expected, context),
                self.current().to_string(),
            ))
        }
    }

    fn current_precedence(&self) -> Precedence {
        Precedence::of(self.current())
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek())
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.current() {
            Token::Let => self.parse_let_statement(),
            Token::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let name = match self.current() {
            Token::Ident(name) => name.clone(),
            Token::Eof => return Err(ParserError::UnexpectedEof),
            other => {
                return Err(ParserError::unexpected_token(
                    "an identifier after 'let'",
                    other.to_string(),
                ))
            }
        };
        self.advance();
        self.expect_current(Token::Assign, "after the binding name")?;
        self.advance();

        let mut value = self.parse_expression(Precedence::Lowest)?;
        // A function literal bound by `let` learns its own name, so it can
        // call itself without a global or local slot.
        if let Expr::Function(literal) = &mut value {
            if literal.name.is_none() {
                literal.name = Some(name.clone());
            }
        }

        if *self.peek() == Token::Semicolon {
            self.advance();
        }
        Ok(Stmt::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;
        if *self.peek() == Token::Semicolon {
            self.advance();
        }
        Ok(Stmt::Return(value))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        if *self.peek() == Token::Semicolon {
            self.advance();
        }
        Ok(Stmt::Expression(expression))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut expression = self.parse_prefix_position()?;
        while *self.peek() != Token::Semicolon && precedence < self.peek_precedence() {
            self.advance();
            expression = self.parse_infix_position(expression)?;
        }
        Ok(expression)
    }

    fn parse_prefix_position(&mut self) -> ParseResult<Expr> {
        match self.current() {
            Token::Ident(name) => Ok(Expr::Identifier(name.clone())),
            Token::Int(value) => Ok(Expr::Integer(*value)),
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::Str(value) => Ok(Expr::Str(value.clone())),
            Token::Bang => self.parse_prefix_operation(PrefixOp::Not),
            Token::Minus => self.parse_prefix_operation(PrefixOp::Neg),
            Token::LParen => self.parse_grouped_expression(),
            Token::If => self.parse_if_expression(),
            Token::Function => self.parse_function_literal(),
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_hash_literal(),
            Token::Illegal(text) => Err(ParserError::IllegalToken(text.clone())),
            Token::Eof => Err(ParserError::UnexpectedEof),
            other => Err(ParserError::unexpected_token(
                "an expression",
                other.to_string(),
            )),
        }
    }

    fn parse_infix_position(&mut self, left: Expr) -> ParseResult<Expr> {
        let operator = match self.current() {
            Token::Plus => InfixOp::Add,
            Token::Minus => InfixOp::Sub,
            Token::Asterisk => InfixOp::Mul,
            Token::Slash => InfixOp::Div,
            Token::Eq => InfixOp::Eq,
            Token::NotEq => InfixOp::NotEq,
            Token::Lt => InfixOp::Lt,
            Token::Gt => InfixOp::Gt,
            Token::LParen => return self.parse_call_expression(left),
            Token::LBracket => return self.parse_index_expression(left),
            _ => return Ok(left),
        };
        let precedence = self.current_precedence();
        self.advance();
        let right = self.parse_expression(precedence)?;
        Ok(Expr::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_prefix_operation(&mut self, operator: PrefixOp) -> ParseResult<Expr> {
        self.advance();
        let right = self.parse_expression(Precedence::Prefix)?;
        Ok(Expr::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> ParseResult<Expr> {
        self.advance();
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.advance();
        self.expect_current(Token::RParen, "to close the grouped expression")?;
        Ok(expression)
    }

    fn parse_if_expression(&mut self) -> ParseResult<Expr> {
        self.advance();
        self.expect_current(Token::LParen, "after 'if'")?;
        // The condition parses as a grouped expression, parentheses included.
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.advance();
        self.expect_current(Token::LBrace, "after the if condition")?;
        let consequence = self.parse_block()?;

        let alternative = if *self.peek() == Token::Else {
            self.advance();
            self.advance();
            self.expect_current(Token::LBrace, "after 'else'")?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// Parse a braced block. The current token is the opening brace; on
    /// return the current token is the closing brace.
    fn parse_block(&mut self) -> ParseResult<Block> {
        self.advance();
        let mut statements = Vec::new();
        while *self.current() != Token::RBrace {
            if *self.current() == Token::Eof {
                return Err(ParserError::UnexpectedEof);
            }
            statements.push(self.parse_statement()?);
            self.advance();
        }
        Ok(Block { statements })
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expr> {
        self.advance();
        self.expect_current(Token::LParen, "after 'fn'")?;
        let parameters = self.parse_function_parameters()?;
        self.advance();
        self.expect_current(Token::LBrace, "to open the function body")?;
        let body = self.parse_block()?;
        Ok(Expr::Function(FunctionLiteral {
            name: None,
            parameters,
            body,
        }))
    }

    fn parse_function_parameters(&mut self) -> ParseResult<Vec<String>> {
        if *self.peek() == Token::RParen {
            self.advance();
            return Ok(Vec::new());
        }

        self.advance();
        let mut parameters = vec![self.parse_parameter()?];
        self.advance();
        while *self.current() == Token::Comma {
            self.advance();
            parameters.push(self.parse_parameter()?);
            self.advance();
        }
        self.expect_current(Token::RParen, "to close the parameter list")?;
        Ok(parameters)
    }

    fn parse_parameter(&mut self) -> ParseResult<String> {
        match self.current() {
            Token::Ident(name) => Ok(name.clone()),
            Token::Eof => Err(ParserError::UnexpectedEof),
            other => Err(ParserError::unexpected_token(
                "a parameter name",
                other.to_string(),
            )),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        let elements = self.parse_expression_list(Token::RBracket)?;
        Ok(Expr::Array(elements))
    }

    /// Parse a comma-separated expression list ending at `end`. The current
    /// token is the opening delimiter; on return it is `end`.
    fn parse_expression_list(&mut self, end: Token) -> ParseResult<Vec<Expr>> {
        if *self.peek() == end {
            self.advance();
            return Ok(Vec::new());
        }

        self.advance();
        let mut expressions = vec![self.parse_expression(Precedence::Lowest)?];
        self.advance();
        while *self.current() == Token::Comma {
            self.advance();
            expressions.push(self.parse_expression(Precedence::Lowest)?);
            self.advance();
        }
        self.expect_current(end, "to close the expression list")?;
        Ok(expressions)
    }

    fn parse_hash_literal(&mut self) -> ParseResult<Expr> {
        let mut pairs = Vec::new();
        if *self.peek() == Token::RBrace {
            self.advance();
            return Ok(Expr::Hash(pairs));
        }

        self.advance();
        pairs.push(self.parse_hash_pair()?);
        self.advance();
        while *self.current() == Token::Comma {
            self.advance();
            pairs.push(self.parse_hash_pair()?);
            self.advance();
        }
        self.expect_current(Token::RBrace, "to close the hash literal")?;
        Ok(Expr::Hash(pairs))
    }

    fn parse_hash_pair(&mut self) -> ParseResult<(Expr, Expr)> {
        let key = self.parse_expression(Precedence::Lowest)?;
        self.advance();
        self.expect_current(Token::Colon, "between hash key and value")?;
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok((key, value))
    }

    fn parse_call_expression(&mut self, function: Expr) -> ParseResult<Expr> {
        let arguments = self.parse_expression_list(Token::RParen)?;
        Ok(Expr::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expr) -> ParseResult<Expr> {
        self.advance();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.advance();
        self.expect_current(Token::RBracket, "to close the index expression")?;
        Ok(Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}
