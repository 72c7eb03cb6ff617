//! 属性表达式
//!
//! 将用户提供的过滤字符串编译为不可变的布尔表达式树，再针对测试的属性集合求值。
//!
//! 语法（优先级从高到低）：`!`、`&&`、`||`，括号可改变优先级。
//!
//! - 不带引号的项只能由字母、数字和下划线组成，按集合成员精确匹配；
//! - 带引号的项可以包含任意字符（空格、冒号等），其中 `*` 匹配任意子串，
//!   匹配是针对单个属性整体锚定的。
//!
//! ```
//! use std::collections::HashSet;
//! use testdispatch_dispatcher::expr::Expr;
//!
//! let expr = Expr::new(r#""group:*" && !informational"#).unwrap();
//! let attrs: HashSet<String> = ["group:mainline".to_string()].into();
//! assert!(expr.matches(&attrs));
//! ```

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::glob::glob_match;

/// 表达式解析错误，`pos` 为出错位置的字节偏移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("表达式为空")]
    Empty,

    #[error("位置 {pos}: 括号不匹配")]
    UnbalancedParen { pos: usize },

    #[error("位置 {pos}: 两个操作数之间缺少运算符")]
    MissingOperator { pos: usize },

    #[error("位置 {pos}: 期望操作数")]
    ExpectedOperand { pos: usize },

    #[error("位置 {pos}: 项 {term:?} 含有 ':'，必须加引号")]
    UnquotedColon { pos: usize, term: String },

    #[error("位置 {pos}: 项 {term:?} 含有通配符 '*'，必须加引号")]
    UnquotedWildcard { pos: usize, term: String },

    #[error("位置 {pos}: 引号未闭合")]
    UnterminatedQuote { pos: usize },

    #[error("位置 {pos}: 非法字符 {ch:?}")]
    UnexpectedChar { pos: usize, ch: char },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Exact(String),
    Glob(String),
}

impl Node {
    fn eval(&self, attrs: &HashSet<String>) -> bool {
        match self {
            Node::And(lhs, rhs) => lhs.eval(attrs) && rhs.eval(attrs),
            Node::Or(lhs, rhs) => lhs.eval(attrs) || rhs.eval(attrs),
            Node::Not(inner) => !inner.eval(attrs),
            Node::Exact(term) => attrs.contains(term),
            Node::Glob(pattern) => attrs.iter().any(|attr| glob_match(pattern, attr)),
        }
    }
}

/// 编译后的属性表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    pub fn new(raw: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(raw)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens: &tokens,
            cursor: 0,
            end: raw.len(),
        };
        let root = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(match tok.kind {
                TokenKind::RParen => ExprError::UnbalancedParen { pos: tok.pos },
                _ => ExprError::MissingOperator { pos: tok.pos },
            });
        }
        Ok(Self {
            source: raw.to_string(),
            root,
        })
    }

    /// 求值不会失败，也没有副作用
    pub fn matches(&self, attrs: &HashSet<String>) -> bool {
        self.root.eval(attrs)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Expr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expr::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Ident(String),
    Quoted(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '!' | '&' | '|' | '"')
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '!' => TokenKind::Not,
            '&' | '|' => match chars.peek() {
                Some(&(_, next)) if next == c => {
                    chars.next();
                    if c == '&' {
                        TokenKind::And
                    } else {
                        TokenKind::Or
                    }
                }
                _ => return Err(ExprError::UnexpectedChar { pos, ch: c }),
            },
            '"' => {
                let mut term = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, ch)) => term.push(ch),
                        None => return Err(ExprError::UnterminatedQuote { pos }),
                    }
                }
                TokenKind::Quoted(term)
            }
            _ => {
                let mut term = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    term.push(next);
                    chars.next();
                }
                validate_ident(&term, pos)?;
                TokenKind::Ident(term)
            }
        };
        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

fn validate_ident(term: &str, pos: usize) -> Result<(), ExprError> {
    if term.contains(':') {
        return Err(ExprError::UnquotedColon {
            pos,
            term: term.to_string(),
        });
    }
    if term.contains('*') {
        return Err(ExprError::UnquotedWildcard {
            pos,
            term: term.to_string(),
        });
    }
    match term
        .char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
    {
        Some((offset, ch)) => Err(ExprError::UnexpectedChar {
            pos: pos + offset,
            ch,
        }),
        None => Ok(()),
    }
}

/// 递归下降：or := and ('||' and)* ; and := not ('&&' not)* ; not := '!' not | atom
struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    end: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|tok| &tok.kind == kind) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_not()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_not(&mut self) -> Result<Node, ExprError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Node, ExprError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(ExprError::ExpectedOperand { pos: self.end });
        };
        self.cursor += 1;

        match tok.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.peek().map(|next| (next.kind == TokenKind::RParen, next.pos)) {
                    Some((true, _)) => {
                        self.cursor += 1;
                        Ok(inner)
                    }
                    Some((false, pos)) => Err(ExprError::MissingOperator { pos }),
                    None => Err(ExprError::UnbalancedParen { pos: tok.pos }),
                }
            }
            TokenKind::Ident(term) => Ok(Node::Exact(term)),
            TokenKind::Quoted(term) if term.contains('*') => Ok(Node::Glob(term)),
            TokenKind::Quoted(term) => Ok(Node::Exact(term)),
            TokenKind::RParen | TokenKind::And | TokenKind::Or | TokenKind::Not => {
                Err(ExprError::ExpectedOperand { pos: tok.pos })
            }
        }
    }
}
