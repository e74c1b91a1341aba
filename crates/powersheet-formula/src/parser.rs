//! Formula parser
//!
//! The input is first split into tokens, then a recursive descent parser
//! builds the AST with the usual spreadsheet operator precedence.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use powersheet_core::{CellAddress, CellError, CellRange, FORMULA_MARKER};

/// Deepest nesting of parentheses, function calls and prefix/power chains
///
/// Keeps parsing and evaluation recursion well inside the thread stack.
pub const MAX_NESTING: usize = 64;

/// Longest accepted formula, in characters
pub const MAX_FORMULA_LEN: usize = 8192;

/// Deepest accepted expression tree, counting long operator chains like `A1+A2+...`
pub const MAX_EXPRESSION_DEPTH: usize = 512;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use powersheet_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(a1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let body = formula
        .trim()
        .strip_prefix(FORMULA_MARKER)
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;
    if body.chars().count() > MAX_FORMULA_LEN {
        return Err(FormulaError::Parse(format!(
            "Formula is longer than {} characters",
            MAX_FORMULA_LEN
        )));
    }

    let tokens = tokenize(body)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;

    if !matches!(parser.peek(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.peek()
        )));
    }
    if expr.depth() > MAX_EXPRESSION_DEPTH {
        return Err(FormulaError::Parse(format!(
            "Formula nests deeper than {} levels",
            MAX_EXPRESSION_DEPTH
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Function name or bare name
    Identifier(String),
    /// Cell reference like A1 or $B$2, kept as written
    CellRef(String),

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    LeftParen,
    RightParen,

    Eof,
}

// === Tokenizer ===

fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().map_or(false, &pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn next_token(&mut self) -> FormulaResult<Token> {
        self.take_while(char::is_whitespace);

        let Some(c) = self.bump() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '%' => Token::Percent,
            '&' => Token::Ampersand,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '=' => Token::Equal,
            '<' => match self.peek() {
                Some('=') => {
                    self.pos += 1;
                    Token::LessEqual
                }
                Some('>') => {
                    self.pos += 1;
                    Token::NotEqual
                }
                _ => Token::LessThan,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                }
            }
            '"' => self.scan_string()?,
            '#' => self.scan_error()?,
            c if c.is_ascii_digit() => {
                self.pos -= 1;
                self.scan_number()?
            }
            '.' if self.peek().map_or(false, |c| c.is_ascii_digit()) => {
                self.pos -= 1;
                self.scan_number()?
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                self.pos -= 1;
                self.scan_word()
            }
            other => {
                return Err(FormulaError::Parse(format!(
                    "Unexpected character '{}'",
                    other
                )))
            }
        };
        Ok(token)
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let mut s = String::new();
        loop {
            match self.bump() {
                // "" inside a string is an escaped quote
                Some('"') if self.peek() == Some('"') => {
                    self.pos += 1;
                    s.push('"');
                }
                Some('"') => return Ok(Token::String(s)),
                Some(c) => s.push(c),
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let rest = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?'));
        let text = format!("#{}", rest);
        CellError::from_str(&text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.pos += 1;
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek_at(1).map_or(false, |c| c.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && self.peek_at(2).map_or(false, |c| c.is_ascii_digit())))
        {
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.pos += 1;
            }
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", text)))
    }

    fn scan_word(&mut self) -> Token {
        let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        let next_is_paren = self.peek_after_whitespace() == Some('(');

        // A word followed by '(' is always a function call (LOG10(100) is not a cell)
        if next_is_paren {
            return Token::Identifier(text);
        }
        if text.eq_ignore_ascii_case("TRUE") {
            return Token::Boolean(true);
        }
        if text.eq_ignore_ascii_case("FALSE") {
            return Token::Boolean(false);
        }
        if is_cell_reference(&text) {
            return Token::CellRef(text);
        }
        Token::Identifier(text)
    }

    fn peek_after_whitespace(&self) -> Option<char> {
        self.chars[self.pos..]
            .iter()
            .copied()
            .find(|c| !c.is_whitespace())
    }
}

/// `[$]LETTERS[$]DIGITS`, letters in either case
fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 {
        return false;
    }
    let rest = &rest[letters..];
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn cell_reference(text: &str) -> FormulaResult<CellReference> {
    let col_absolute = text.starts_with('$');
    let body = text.trim_start_matches('$');
    let row_absolute = body.contains('$');
    let clean = body.replace('$', "").to_ascii_uppercase();
    let address = CellAddress::parse(&clean).map_err(|e| {
        FormulaError::InvalidReference(format!("'{}': {}", text, e))
    })?;
    Ok(CellReference {
        address,
        row_absolute,
        col_absolute,
    })
}

// === Parser ===

// Precedence (lowest to highest):
// comparison, concatenation, additive, multiplicative, exponent (right assoc),
// unary minus and postfix %, range (A1:B2), primary
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> FormulaResult<()> {
        let found = self.next();
        if found == expected {
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected, found
            )))
        }
    }

    /// Run one level of nested parsing, failing past [`MAX_NESTING`]
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::Parse(format!(
                "Formula nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;
        loop {
            let op = match self.peek() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;
        while matches!(self.peek(), Token::Ampersand) {
            self.next();
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => return Ok(left),
            };
            self.next();
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;
        if matches!(self.peek(), Token::Caret) {
            self.next();
            let right = self.nested(Self::parse_exponent)?;
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.peek() {
            Token::Minus => {
                self.next();
                let operand = self.nested(Self::parse_unary)?;
                return Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                });
            }
            Token::Plus => {
                self.next();
                return self.nested(Self::parse_unary);
            }
            _ => {}
        }

        let mut expr = self.parse_range()?;
        while matches!(self.peek(), Token::Percent) {
            self.next();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;
        if !matches!(self.peek(), Token::Colon) {
            return Ok(left);
        }
        self.next();

        let FormulaExpr::CellRef(start) = left else {
            return Err(FormulaError::Parse(
                "Range start must be a cell reference".into(),
            ));
        };
        match self.next() {
            Token::CellRef(text) => {
                let end = cell_reference(&text)?;
                Ok(FormulaExpr::RangeRef(RangeReference {
                    range: CellRange::new(start.address, end.address),
                }))
            }
            other => Err(FormulaError::Parse(format!(
                "Range end must be a cell reference, got {:?}",
                other
            ))),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.next() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),
            Token::CellRef(text) => Ok(FormulaExpr::CellRef(cell_reference(&text)?)),
            Token::LeftParen => {
                let expr = self.nested(Self::parse_expression)?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                if matches!(self.peek(), Token::LeftParen) {
                    self.nested(|p| p.parse_function_call(name))
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }
            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RightParen) {
            args.push(self.parse_expression()?);
            while matches!(self.peek(), Token::Comma) {
                self.next();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}
