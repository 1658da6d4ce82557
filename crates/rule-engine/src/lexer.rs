//! 规则表达式词法分析
//!
//! 按空白与括号边界切分记号，每个记号携带其在源文本中的字节位置。

use crate::error::{Result, RuleError};
use crate::operators::Operator;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    Text(String),
    Bool(bool),
    Operator(Operator),
    And,
    Or,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 记号起始的字节偏移
    pub position: usize,
    /// 源文本中的原始片段，用于错误诊断
    pub text: String,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    /// 将整个源文本切分为记号序列
    pub fn tokenize(source: &'a str) -> Result<Vec<Token>> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let Some(&(start, c)) = self.chars.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => {
                self.chars.next();
                TokenKind::LParen
            }
            ')' => {
                self.chars.next();
                TokenKind::RParen
            }
            '>' | '<' | '=' | '!' => self.lex_operator(start)?,
            '\'' | '"' => self.lex_text(start, c)?,
            '-' if self.next_is_digit(start) => self.lex_number(start)?,
            c if c.is_ascii_digit() => self.lex_number(start)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_word(start),
            other => {
                return Err(RuleError::syntax(
                    format!("无法识别的字符 '{}'", other),
                    start,
                    other.to_string(),
                ));
            }
        };

        let end = self.offset();
        Ok(Some(Token {
            kind,
            position: start,
            text: self.source[start..end].to_string(),
        }))
    }

    /// 当前读取位置的字节偏移
    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn next_is_digit(&self, start: usize) -> bool {
        self.source[start + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn consume_while<F>(&mut self, pred: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            self.chars.next();
        }
    }

    fn lex_operator(&mut self, start: usize) -> Result<TokenKind> {
        self.consume_while(|c| matches!(c, '>' | '<' | '=' | '!'));
        let source = self.source;
        let symbol = &source[start..self.offset()];
        Operator::from_symbol(symbol)
            .map(TokenKind::Operator)
            .map_err(|_| RuleError::syntax(format!("无法识别的操作符 '{}'", symbol), start, symbol))
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind> {
        if let Some(&(_, '-')) = self.chars.peek() {
            self.chars.next();
        }
        self.consume_while(|c| c.is_ascii_digit());

        if let Some(&(_, '.')) = self.chars.peek() {
            self.chars.next();
            self.consume_while(|c| c.is_ascii_digit());
        }

        if let Some(&(_, 'e' | 'E')) = self.chars.peek() {
            self.chars.next();
            if let Some(&(_, '+' | '-')) = self.chars.peek() {
                self.chars.next();
            }
            self.consume_while(|c| c.is_ascii_digit());
        }

        // 数字后紧跟标识符字符（如 30abc）视为非法记号
        if let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                let source = self.source;
                let text = &source[start..self.offset()];
                return Err(RuleError::syntax(format!("无效的数值 '{}'", text), start, text));
            }
        }

        let source = self.source;
        let text = &source[start..self.offset()];
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(TokenKind::Number(n)),
            _ => Err(RuleError::syntax(format!("无效的数值 '{}'", text), start, text)),
        }
    }

    fn lex_text(&mut self, start: usize, quote: char) -> Result<TokenKind> {
        self.chars.next();
        let mut value = String::new();

        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(TokenKind::Text(value)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                Some((_, c)) => value.push(c),
                None => break,
            }
        }

        Err(RuleError::syntax(
            "字符串字面量未闭合",
            start,
            &self.source[start..],
        ))
    }

    fn lex_word(&mut self, start: usize) -> TokenKind {
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let source = self.source;
        let word = &source[start..self.offset()];

        if word.eq_ignore_ascii_case("and") {
            TokenKind::And
        } else if word.eq_ignore_ascii_case("or") {
            TokenKind::Or
        } else if word.eq_ignore_ascii_case("true") {
            TokenKind::Bool(true)
        } else if word.eq_ignore_ascii_case("false") {
            TokenKind::Bool(false)
        } else {
            TokenKind::Identifier(word.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_simple_condition() {
        assert_eq!(
            kinds("age > 30"),
            vec![
                TokenKind::Identifier("age".to_string()),
                TokenKind::Operator(Operator::Gt),
                TokenKind::Number(30.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_without_spaces() {
        assert_eq!(
            kinds("(age>=30)"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("age".to_string()),
                TokenKind::Operator(Operator::Gte),
                TokenKind::Number(30.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("a = 1 and b = 2 Or c = TRUE"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(Operator::Eq),
                TokenKind::Number(1.0),
                TokenKind::And,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Operator(Operator::Eq),
                TokenKind::Number(2.0),
                TokenKind::Or,
                TokenKind::Identifier("c".to_string()),
                TokenKind::Operator(Operator::Eq),
                TokenKind::Bool(true),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("-5")[0], TokenKind::Number(-5.0));
        assert_eq!(kinds("2.5")[0], TokenKind::Number(2.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
    }

    #[test]
    fn test_text_literals() {
        assert_eq!(kinds("'Sales'")[0], TokenKind::Text("Sales".to_string()));
        assert_eq!(kinds(r#""R&D""#)[0], TokenKind::Text("R&D".to_string()));
        assert_eq!(kinds(r"'it\'s'")[0], TokenKind::Text("it's".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::tokenize("age  >= 30").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 5, 8]);
        assert_eq!(tokens[1].text, ">=");
    }

    #[test]
    fn test_unknown_operator() {
        let err = Lexer::tokenize("age => 30").unwrap_err();
        match err {
            RuleError::Syntax {
                position, token, ..
            } => {
                assert_eq!(position, 4);
                assert_eq!(token, "=>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_character() {
        assert!(matches!(
            Lexer::tokenize("age ~ 30"),
            Err(RuleError::Syntax { position: 4, .. })
        ));
    }

    #[test]
    fn test_unterminated_text() {
        assert!(matches!(
            Lexer::tokenize("dept = 'Sales"),
            Err(RuleError::Syntax { position: 7, .. })
        ));
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(Lexer::tokenize("age > 30abc").is_err());
        assert!(Lexer::tokenize("age > 1.2.3").is_err());
        assert!(Lexer::tokenize("age > 1e999").is_err());
    }
}
