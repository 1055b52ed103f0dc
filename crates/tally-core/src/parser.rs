//! Query text parser.
//!
//! Turns boolean query text into a [`QueryTree`]. Parsing is a two-step
//! process: a lexer splits the text into words, operator keywords and
//! parentheses, then a precedence-climbing parser builds the tree.
//!
//! # Grammar
//!
//! ```text
//! query     := ε | expr
//! expr      := operand (binop operand)*      -- climbed by precedence
//! binop     := OR | AND | AND NOT            -- OR binds loosest
//! operand   := NOT operand | '(' expr ')' | WORD
//! WORD      := run of non-space, non-paren chars other than AND/OR/NOT
//!            | '"' (char | '\"' | '\\')+ '"'
//! ```
//!
//! `AND` and `AND NOT` share a precedence level and associate to the left.
//! `AND NOT` is recognized when the operand slot after `AND` starts with
//! `NOT`, so `a AND NOT b` is the difference `a \ b`, never an intersection
//! with a complement.
//!
//! The parser alternates between expecting an operand (`parse_operand`) and
//! expecting an operator (the loop in `parse_expression`), and finishes once
//! the end of input is reached at the outermost level. Errors abort the whole
//! parse, so a partially built tree is never returned.

use crate::ast::{Operator, QueryNode, QueryTree};
use crate::error::{Result, TallyError};
use std::fmt;

/// Default limit on nesting of parentheses and `NOT` chains
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options controlling how query text is turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Lowercase every term (operator keywords stay case-sensitive)
    pub fold_case: bool,

    /// Maximum nesting depth before the query is rejected
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            fold_case: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Set whether terms are lowercased.
    pub fn with_fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }

    /// Set the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Parse query text into a tree.
///
/// Empty or all-whitespace text yields the empty tree.
pub fn parse(text: &str, options: &ParseOptions) -> Result<QueryTree> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
        options,
    };

    if parser.peek().kind == TokenKind::Eof {
        return Ok(QueryTree::empty());
    }

    let root = parser.parse_expression(Operator::Or.precedence())?;

    let token = parser.peek();
    match token.kind {
        TokenKind::Eof => Ok(QueryTree::from(root)),
        TokenKind::RightParen => Err(TallyError::parse(token.offset, "unmatched ')'")),
        _ => Err(TallyError::parse(
            token.offset,
            format!("expected operator, found {}", token.kind),
        )),
    }
}

// === Lexer ===

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(word) => write!(f, "word {:?}", word),
            TokenKind::And => f.write_str("operator AND"),
            TokenKind::Or => f.write_str("operator OR"),
            TokenKind::Not => f.write_str("operator NOT"),
            TokenKind::LeftParen => f.write_str("'('"),
            TokenKind::RightParen => f.write_str("')'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    /// Byte offset of the token in the query text
    offset: usize,
}

struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.position += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let offset = self.position;

        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some('(') => {
                self.advance();
                TokenKind::LeftParen
            }
            Some(')') => {
                self.advance();
                TokenKind::RightParen
            }
            Some('"') => {
                self.advance();
                TokenKind::Word(self.read_quoted(offset)?)
            }
            Some(_) => {
                let word = self.read_word();
                match word {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    _ => TokenKind::Word(word.to_string()),
                }
            }
        };

        Ok(Token { kind, offset })
    }

    fn read_word(&mut self) -> &'a str {
        let start = self.position;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            self.advance();
        }
        &self.input[start..self.position]
    }

    fn read_quoted(&mut self, offset: usize) -> Result<String> {
        let mut term = String::new();
        loop {
            match self.current_char() {
                None => {
                    return Err(TallyError::parse(offset, "unterminated quoted term"));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = self.current_char().ok_or_else(|| {
                        TallyError::parse(offset, "unterminated quoted term")
                    })?;
                    term.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    term.push(c);
                    self.advance();
                }
            }
        }

        if term.is_empty() {
            return Err(TallyError::parse(offset, "empty quoted term"));
        }
        Ok(term)
    }
}

// === Parser ===

struct Parser<'o> {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    options: &'o ParseOptions,
}

impl<'o> Parser<'o> {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof and we never advance past it
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn descend(&mut self, offset: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(TallyError::parse(
                offset,
                format!("query nests deeper than {} levels", self.options.max_depth),
            ));
        }
        Ok(())
    }

    /// Parse operands joined by operators binding at least as tightly as
    /// `min_precedence`.
    fn parse_expression(&mut self, min_precedence: u8) -> Result<QueryNode> {
        self.descend(self.peek().offset)?;
        let mut left = self.parse_operand()?;

        loop {
            let token = self.peek();
            let op = match token.kind {
                TokenKind::And => Operator::And,
                TokenKind::Or => Operator::Or,
                TokenKind::Eof | TokenKind::RightParen => break,
                _ => {
                    return Err(TallyError::parse(
                        token.offset,
                        format!("expected operator, found {}", token.kind),
                    ));
                }
            };
            if op.precedence() < min_precedence {
                break;
            }
            self.advance();

            let op = if op == Operator::And && self.peek().kind == TokenKind::Not {
                self.advance();
                Operator::AndNot
            } else {
                op
            };

            let right = self.parse_expression(op.precedence() + 1)?;
            left = QueryNode::binary(op, left, right);
        }

        self.depth -= 1;
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<QueryNode> {
        let token = self.advance();
        match token.kind {
            TokenKind::Word(word) => {
                let term = if self.options.fold_case {
                    word.to_lowercase()
                } else {
                    word
                };
                QueryNode::word(term).map_err(|e| TallyError::parse(token.offset, e.to_string()))
            }
            TokenKind::Not => {
                self.descend(token.offset)?;
                let child = self.parse_operand()?;
                self.depth -= 1;
                Ok(QueryNode::not(child))
            }
            TokenKind::LeftParen => {
                let inner = self.parse_expression(Operator::Or.precedence())?;
                if self.peek().kind != TokenKind::RightParen {
                    return Err(TallyError::parse(token.offset, "unclosed '('"));
                }
                self.advance();
                Ok(inner)
            }
            TokenKind::And | TokenKind::Or | TokenKind::RightParen | TokenKind::Eof => {
                Err(TallyError::parse(
                    token.offset,
                    format!("expected operand, found {}", token.kind),
                ))
            }
        }
    }
}
