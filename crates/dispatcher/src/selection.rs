use std::collections::HashSet;

use crate::expr::{Expr, ExprError};
use crate::glob::glob_match;

/// 本次调用要运行哪些测试
///
/// - 没有模式：全部选中；
/// - 只有一个且以括号包裹的模式：属性表达式；
/// - 其它情况：按测试名通配（`*` 匹配任意子串），任一命中即选中。
#[derive(Debug, Clone)]
pub enum Selector {
    All,
    Attributes(Expr),
    Names(Vec<String>),
}

impl Selector {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExprError> {
        match patterns {
            [] => Ok(Selector::All),
            [single] if is_attr_expr(single.as_ref()) => {
                Ok(Selector::Attributes(Expr::new(single.as_ref())?))
            }
            _ => patterns
                .iter()
                .map(|p| check_name_pattern(p.as_ref()).map(|_| p.as_ref().to_string()))
                .collect::<Result<Vec<_>, _>>()
                .map(Selector::Names),
        }
    }

    pub fn selects(&self, name: &str, attrs: &HashSet<String>) -> bool {
        match self {
            Selector::All => true,
            Selector::Attributes(expr) => expr.matches(attrs),
            Selector::Names(patterns) => patterns.iter().any(|p| glob_match(p, name)),
        }
    }
}

fn is_attr_expr(pattern: &str) -> bool {
    let trimmed = pattern.trim();
    trimmed.starts_with('(') && trimmed.ends_with(')')
}

/// 名称模式中出现括号或引号，多半是写错了的属性表达式
fn check_name_pattern(pattern: &str) -> Result<(), ExprError> {
    match pattern
        .char_indices()
        .find(|&(_, c)| matches!(c, '(' | ')' | '"'))
    {
        Some((pos, ch)) => Err(ExprError::UnexpectedChar { pos, ch }),
        None if pattern.is_empty() => Err(ExprError::Empty),
        None => Ok(()),
    }
}
