//! Parser for fused expression text.
//!
//! Turns the `expr` parameter of a `pnnx.Expression` operator back into a
//! syntax tree, so that later consumers can inspect calls and slots without
//! re-scanning strings. The parser does not evaluate anything.
//!
//! # Examples
//!
//! ```
//! use tracefuse_compiler::expr_syntax::{Expr, parse_expr};
//!
//! let expr = parse_expr("add(int(size(@0,0)),1)").unwrap();
//! assert_eq!(expr.slots(), vec![0]);
//!
//! let list = parse_expr("[@1,2,None]").unwrap();
//! assert!(matches!(list, Expr::List(ref items) if items.len() == 3));
//! ```

/// Syntax tree of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal constant.
    Literal(Literal),
    /// Reference to the operator input at this index.
    Slot(usize),
    /// Function call, e.g. `mul(@0,2)`.
    Call(String, Vec<Expr>),
    /// List, e.g. `[@0,1]`.
    List(Vec<Expr>),
}

/// Literal constant kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Bare word that is not a call, e.g. a rounding mode.
    String(String),
}

impl Expr {
    /// Slot indices in order of appearance, including repeats.
    pub fn slots(&self) -> Vec<usize> {
        let mut slots = Vec::new();
        self.collect_slots(&mut slots);
        slots
    }

    fn collect_slots(&self, slots: &mut Vec<usize>) {
        match self {
            Expr::Slot(index) => slots.push(*index),
            Expr::Call(_, args) | Expr::List(args) => {
                for arg in args {
                    arg.collect_slots(slots);
                }
            }
            Expr::Literal(_) => {}
        }
    }

    /// Check that slots are numbered densely in first-reference order
    /// (`@0` appears before `@1`, and no index is skipped).
    pub fn has_dense_slots(&self) -> bool {
        let mut next = 0;
        for slot in self.slots() {
            if slot == next {
                next += 1;
            } else if slot > next {
                return false;
            }
        }
        true
    }

    /// Number of distinct slots referenced.
    pub fn slot_count(&self) -> usize {
        self.slots().into_iter().max().map_or(0, |max| max + 1)
    }
}

/// Parse expression text into a syntax tree.
///
/// # Grammar
///
/// ```text
/// expr    = literal | slot | call | list
/// call    = ident '(' expr (',' expr)* ')'
/// list    = '[' (expr (',' expr)*)? ']'
/// slot    = '@' [0-9]+
/// literal = 'None' | 'True' | 'False' | number | 'inf' | '-inf' | 'nan' | ident
/// ```
pub fn parse_expr(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;

    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected token after expression: {:?}",
            parser.tokens[parser.pos]
        ));
    }

    Ok(expr)
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Slot(usize),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '[' => {
                tokens.push(Token::LBracket);
                chars.next();
            }
            ']' => {
                tokens.push(Token::RBracket);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '@' => {
                chars.next();
                let digits = take_while(&mut chars, |c| c.is_ascii_digit());
                let index = digits
                    .parse()
                    .map_err(|_| format!("Invalid slot reference: '@{}'", digits))?;
                tokens.push(Token::Slot(index));
            }
            '-' if starts_word(&chars) => {
                chars.next();
                let word = take_while(&mut chars, |c| c.is_alphanumeric() || c == '_');
                match word.as_str() {
                    "inf" => tokens.push(Token::Float(f64::NEG_INFINITY)),
                    _ => return Err(format!("Unexpected negated word: '-{}'", word)),
                }
            }
            '0'..='9' | '-' | '+' | '.' => {
                tokens.push(parse_number(&mut chars)?);
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let ident = take_while(&mut chars, |c| c.is_alphanumeric() || c == '_');
                let token = match ident.as_str() {
                    "inf" => Token::Float(f64::INFINITY),
                    "nan" => Token::Float(f64::NAN),
                    _ => Token::Ident(ident),
                };
                tokens.push(token);
            }
            _ => {
                return Err(format!("Unexpected character: '{}'", ch));
            }
        }
    }

    Ok(tokens)
}

/// Check whether the character after the current one starts a word.
fn starts_word(chars: &std::iter::Peekable<std::str::Chars>) -> bool {
    let mut ahead = chars.clone();
    ahead.next();
    ahead.next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn take_while(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    pred: impl Fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.peek() {
        if pred(ch) {
            out.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    out
}

fn parse_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<Token, String> {
    let mut num_str = String::new();
    let mut prev = None;
    while let Some(&ch) = chars.peek() {
        let sign_ok = num_str.is_empty() || matches!(prev, Some('e') | Some('E'));
        let accept = ch.is_ascii_digit()
            || ch == '.'
            || ch == 'e'
            || ch == 'E'
            || ((ch == '-' || ch == '+') && sign_ok);
        if !accept {
            break;
        }
        num_str.push(ch);
        prev = Some(ch);
        chars.next();
    }

    let is_float = num_str.contains(['.', 'e', 'E']);
    if is_float {
        num_str
            .parse()
            .map(Token::Float)
            .map_err(|_| format!("Failed to parse float: {}", num_str))
    } else {
        num_str
            .parse()
            .map(Token::Int)
            .map_err(|_| format!("Failed to parse integer: {}", num_str))
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        if self.current() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            Err(format!("Expected {:?}, found {:?}", token, self.current()))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        match self.current().cloned() {
            Some(Token::Int(n)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            Some(Token::Float(f)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            Some(Token::Slot(index)) => {
                self.advance();
                Ok(Expr::Slot(index))
            }
            Some(Token::LBracket) => {
                self.advance();
                let items = self.parse_args(Token::RBracket, true)?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if self.current() == Some(&Token::LParen) {
                    self.advance();
                    let args = self.parse_args(Token::RParen, false)?;
                    return Ok(Expr::Call(name, args));
                }
                let literal = match name.as_str() {
                    "None" => Literal::None,
                    "True" => Literal::Bool(true),
                    "False" => Literal::Bool(false),
                    _ => Literal::String(name),
                };
                Ok(Expr::Literal(literal))
            }
            _ => Err("Expected literal, slot, call, or list".to_string()),
        }
    }

    /// Parse a comma-separated argument list up to and including `close`.
    fn parse_args(&mut self, close: Token, allow_empty: bool) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();

        if self.current() == Some(&close) {
            if !allow_empty {
                return Err("Call requires at least one argument".to_string());
            }
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);
            match self.current() {
                Some(Token::Comma) => self.advance(),
                _ => break,
            }
        }

        self.expect(close)?;
        Ok(args)
    }
}
