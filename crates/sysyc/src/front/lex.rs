//! Hand-written lexer for SysY source text.
//!
//! Produces a flat token stream with line/column positions. Integer literals
//! follow C conventions: decimal, octal (leading `0`) and hexadecimal
//! (`0x`/`0X`). Line (`//`) and block (`/* */`) comments are skipped.

use anyhow::{bail, Result};
use std::fmt;

/// Token classes of SysY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    IntConst(i32),

    // Keywords
    Int,
    Void,
    Const,
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Assign,

    // Punctuation
    Comma,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::IntConst(n) => write!(f, "integer {}", n),
            Token::Int => write!(f, "'int'"),
            Token::Void => write!(f, "'void'"),
            Token::Const => write!(f, "'const'"),
            Token::If => write!(f, "'if'"),
            Token::Else => write!(f, "'else'"),
            Token::While => write!(f, "'while'"),
            Token::Break => write!(f, "'break'"),
            Token::Continue => write!(f, "'continue'"),
            Token::Return => write!(f, "'return'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Not => write!(f, "'!'"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::Le => write!(f, "'<='"),
            Token::Ge => write!(f, "'>='"),
            Token::EqEq => write!(f, "'=='"),
            Token::Ne => write!(f, "'!='"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::Assign => write!(f, "'='"),
            Token::Comma => write!(f, "','"),
            Token::Semi => write!(f, "';'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
        }
    }
}

/// A token together with its source position (1-indexed).
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lex a complete source string into a token vector.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => bail!("unterminated block comment at {}:{}", line, column),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<SpannedToken>> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            keyword_or_ident(ident)
        } else if c.is_ascii_digit() {
            self.lex_number()?
        } else {
            self.lex_operator(line, column)?
        };

        Ok(Some(SpannedToken {
            token,
            line,
            column,
        }))
    }

    fn lex_number(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        let mut digits = String::new();
        let radix = if self.peek() == Some('0')
            && matches!(self.peek2(), Some('x') | Some('X'))
        {
            self.bump();
            self.bump();
            16
        } else if self.peek() == Some('0') && matches!(self.peek2(), Some(d) if d.is_ascii_digit())
        {
            self.bump();
            8
        } else {
            10
        };
        while let Some(c) = self.peek() {
            if c.is_ascii_hexdigit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // Only reachable for "0x" with no digits behind it: the decimal and
        // octal paths always leave at least one digit to collect.
        if digits.is_empty() {
            bail!("malformed integer literal at {}:{}", line, column);
        }
        let value = i64::from_str_radix(&digits, radix)
            .map_err(|_| anyhow::anyhow!("malformed integer literal at {}:{}", line, column))?;
        Ok(Token::IntConst(value as i32))
    }

    fn lex_operator(&mut self, line: usize, column: usize) -> Result<Token> {
        let c = self.bump().unwrap();
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            ',' => Token::Comma,
            ';' => Token::Semi,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ne
                } else {
                    Token::Not
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    Token::AndAnd
                } else {
                    bail!("unexpected character '&' at {}:{}", line, column);
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    Token::OrOr
                } else {
                    bail!("unexpected character '|' at {}:{}", line, column);
                }
            }
            other => bail!("unexpected character {:?} at {}:{}", other, line, column),
        };
        Ok(token)
    }
}

fn keyword_or_ident(ident: String) -> Token {
    match ident.as_str() {
        "int" => Token::Int,
        "void" => Token::Void,
        "const" => Token::Const,
        "if" => Token::If,
        "else" => Token::Else,
        "while" => Token::While,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "return" => Token::Return,
        _ => Token::Ident(ident),
    }
}
