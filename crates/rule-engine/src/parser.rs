//! 规则表达式解析器
//!
//! 递归下降解析，文法如下（AND 优先级高于 OR，二者均为左结合）：
//!
//! ```text
//! expr      := or_expr
//! or_expr   := and_expr ( "OR" and_expr )*
//! and_expr  := primary ( "AND" primary )*
//! primary   := "(" expr ")" | condition
//! condition := ATTRIBUTE OPERATOR LITERAL
//! ```
//!
//! 解析失败时不返回部分结果。

use crate::error::{Result, RuleError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::models::{Condition, Literal, RuleNode};
use rule_shared::config::EngineConfig;

const EOF_TOKEN: &str = "<EOF>";

/// 语法树深度的硬上限
///
/// serde_json 读取时最多允许 127 层嵌套，编码后每个节点占一层，
/// 条件节点的 value 对象再占一层。
pub const MAX_TREE_DEPTH_CEILING: usize = 120;

/// 解析限制
///
/// `max_depth` 限制括号嵌套层数，`max_tree_depth` 限制语法树深度，
/// `max_conditions` 限制条件总数。树深度有界保证递归遍历与编码往返都安全。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_depth: usize,
    pub max_tree_depth: usize,
    pub max_conditions: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tree_depth: 100,
            max_conditions: 256,
        }
    }
}

impl From<&EngineConfig> for ParserLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_tree_depth: config.max_tree_depth.min(MAX_TREE_DEPTH_CEILING),
            max_conditions: config.max_conditions,
        }
    }
}

/// 规则表达式解析器
#[derive(Debug, Clone, Default)]
pub struct Parser {
    limits: ParserLimits,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ParserLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ParserLimits {
        self.limits
    }

    /// 解析完整的规则表达式
    pub fn parse(&self, source: &str) -> Result<RuleNode> {
        let tokens = Lexer::tokenize(source)?;
        if tokens.is_empty() {
            return Err(RuleError::syntax("空规则表达式", 0, EOF_TOKEN));
        }

        let mut state = ParseState::new(&tokens, source.len(), self.limits);
        let (root, _) = state.parse_or()?;
        state.expect_end()?;
        Ok(root)
    }

    /// 解析单个条件（如 `age > 30`），不允许出现逻辑操作符或括号
    pub fn parse_condition(&self, source: &str) -> Result<Condition> {
        let tokens = Lexer::tokenize(source)?;
        if tokens.is_empty() {
            return Err(RuleError::syntax("空条件表达式", 0, EOF_TOKEN));
        }

        let mut state = ParseState::new(&tokens, source.len(), self.limits);
        let condition = state.parse_condition()?;
        state.expect_end()?;
        Ok(condition)
    }
}

/// 使用默认限制解析规则表达式
pub fn parse(source: &str) -> Result<RuleNode> {
    Parser::new().parse(source)
}

struct ParseState<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// 源文本长度，用作 EOF 的位置
    end: usize,
    depth: usize,
    conditions: usize,
    limits: ParserLimits,
}

impl<'t> ParseState<'t> {
    fn new(tokens: &'t [Token], end: usize, limits: ParserLimits) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            depth: 0,
            conditions: 0,
            limits,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> RuleError {
        match self.peek() {
            Some(token) => RuleError::syntax(message, token.position, token.text.clone()),
            None => RuleError::syntax(message, self.end, EOF_TOKEN),
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::RParen => {
                Err(self.error_here("括号不匹配: 多余的 ')'"))
            }
            Some(_) => Err(self.error_here("表达式结束后存在多余的记号")),
        }
    }

    // 以下解析函数同时返回子树深度

    fn parse_or(&mut self) -> Result<(RuleNode, usize)> {
        let (mut left, mut depth) = self.parse_and()?;
        while let Some(op) = self.peek().filter(|t| t.kind == TokenKind::Or) {
            self.advance();
            let (right, right_depth) = self.parse_and()?;
            depth = self.combined_depth(op, depth, right_depth)?;
            left = RuleNode::or(left, right);
        }
        Ok((left, depth))
    }

    fn parse_and(&mut self) -> Result<(RuleNode, usize)> {
        let (mut left, mut depth) = self.parse_primary()?;
        while let Some(op) = self.peek().filter(|t| t.kind == TokenKind::And) {
            self.advance();
            let (right, right_depth) = self.parse_primary()?;
            depth = self.combined_depth(op, depth, right_depth)?;
            left = RuleNode::and(left, right);
        }
        Ok((left, depth))
    }

    /// 组合节点的深度，超限时在该逻辑操作符处报错
    fn combined_depth(&self, op: &Token, left: usize, right: usize) -> Result<usize> {
        let depth = 1 + left.max(right);
        if depth > self.limits.max_tree_depth {
            return Err(RuleError::syntax(
                format!("语法树深度超过上限 {}", self.limits.max_tree_depth),
                op.position,
                op.text.clone(),
            ));
        }
        Ok(depth)
    }

    fn parse_primary(&mut self) -> Result<(RuleNode, usize)> {
        let Some(token) = self.peek() else {
            return Err(self.error_here("表达式意外结束, 期望条件或 '('"));
        };

        match token.kind {
            TokenKind::LParen => {
                if self.depth >= self.limits.max_depth {
                    return Err(self.error_here(format!(
                        "括号嵌套超过上限 {}",
                        self.limits.max_depth
                    )));
                }
                self.advance();
                self.depth += 1;
                let inner = self.parse_or()?;
                match self.peek() {
                    Some(t) if t.kind == TokenKind::RParen => {
                        self.advance();
                    }
                    _ => return Err(self.error_here("括号不匹配: 缺少 ')'")),
                }
                self.depth -= 1;
                Ok(inner)
            }
            TokenKind::Identifier(_) => Ok((RuleNode::Condition(self.parse_condition()?), 1)),
            _ => Err(self.error_here("期望属性名或 '('")),
        }
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        let attribute = match self.peek() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => {
                self.advance();
                name.clone()
            }
            _ => return Err(self.error_here("期望属性名")),
        };

        let operator = match self.peek() {
            Some(Token {
                kind: TokenKind::Operator(op),
                ..
            }) => {
                self.advance();
                *op
            }
            _ => {
                return Err(self.error_here(format!("属性 '{}' 后缺少比较操作符", attribute)));
            }
        };

        let value = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Number(n)) => Literal::Number(*n),
            Some(TokenKind::Text(s)) => Literal::Text(s.clone()),
            Some(TokenKind::Bool(b)) => Literal::Bool(*b),
            _ => {
                return Err(self.error_here(format!(
                    "条件 '{} {}' 缺少右侧操作数",
                    attribute, operator
                )));
            }
        };

        if self.conditions >= self.limits.max_conditions {
            return Err(self.error_here(format!(
                "条件数量超过上限 {}",
                self.limits.max_conditions
            )));
        }
        self.advance();
        self.conditions += 1;

        Ok(Condition::new(attribute, operator, value))
    }
}
