//! Tokenizer for LittleDuck source text.
//!
//! Built on `logos`; comments (`// …` and `/* … */`) and whitespace are
//! skipped at the lexer level. Line numbers are tracked by counting
//! newlines between token spans so the parser can report locations.

use std::fmt;

use logos::Logos;

use crate::errors::SyntaxError;

/// A lexical token. Reserved words win over the identifier rule.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // Reserved words
    #[token("program")]
    Program,
    #[token("main")]
    Main,
    #[token("import")]
    Import,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("end")]
    End,
    #[token("print")]
    Print,
    #[token("var")]
    Var,
    #[token("void")]
    Void,
    #[token("int")]
    Int,
    #[token("float")]
    Float,
    #[token("string")]
    String,
    #[token("bool")]
    Bool,
    #[token("return")]
    Return,

    // Literals
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    CteBool(bool),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    CteFloat(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    CteInt(i64),
    /// Double-quoted string literal; the quotes are stripped and escape
    /// sequences pass through unchanged.
    #[regex(r#""(\\.|[^"\\])*""#, |lex| {
        let slice = lex.slice();
        slice[1..slice.len() - 1].to_owned()
    })]
    CteString(std::string::String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(std::string::String),

    // Separators
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Times,
    #[token("/")]
    Divide,
    #[token("==")]
    Equals,
    #[token("!=")]
    NotEquals,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,
    #[token("=")]
    Assign,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CteBool(b) => write!(f, "'{b}'"),
            Self::CteFloat(v) => write!(f, "'{v}'"),
            Self::CteInt(i) => write!(f, "'{i}'"),
            Self::CteString(s) => write!(f, "\"{s}\""),
            Self::Ident(name) => write!(f, "'{name}'"),
            other => write!(f, "'{}'", lexeme(other)),
        }
    }
}

fn lexeme(token: &Token) -> &'static str {
    match token {
        Token::Program => "program",
        Token::Main => "main",
        Token::Import => "import",
        Token::If => "if",
        Token::Else => "else",
        Token::While => "while",
        Token::Do => "do",
        Token::End => "end",
        Token::Print => "print",
        Token::Var => "var",
        Token::Void => "void",
        Token::Int => "int",
        Token::Float => "float",
        Token::String => "string",
        Token::Bool => "bool",
        Token::Return => "return",
        Token::Colon => ":",
        Token::Semicolon => ";",
        Token::Comma => ",",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Times => "*",
        Token::Divide => "/",
        Token::Equals => "==",
        Token::NotEquals => "!=",
        Token::Less => "<",
        Token::Greater => ">",
        Token::And => "&&",
        Token::Or => "||",
        Token::Not => "!",
        Token::Assign => "=",
        _ => "<literal>",
    }
}

/// A token together with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
}

/// Tokenizes a whole source file.
///
/// # Errors
/// Returns [`SyntaxError`] on the first illegal character.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, SyntaxError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut scanned = 0;
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;
        match result {
            Ok(token) => tokens.push(SpannedToken { token, line }),
            Err(()) => {
                let illegal = source[span.start..].chars().next().unwrap_or('\0');
                return Err(SyntaxError::new(format!("Illegal character '{illegal}'"), line));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn tokenizes_statements_and_keywords() {
        let tokens = kinds("program P; main { x = 10; print(x, y); } end;");
        assert_eq!(
            tokens,
            vec![
                Token::Program,
                Token::Ident("P".to_owned()),
                Token::Semicolon,
                Token::Main,
                Token::LBrace,
                Token::Ident("x".to_owned()),
                Token::Assign,
                Token::CteInt(10),
                Token::Semicolon,
                Token::Print,
                Token::LParen,
                Token::Ident("x".to_owned()),
                Token::Comma,
                Token::Ident("y".to_owned()),
                Token::RParen,
                Token::Semicolon,
                Token::RBrace,
                Token::End,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn literal_kinds() {
        assert_eq!(
            kinds(r#"1 2.5 "hi\n" true false"#),
            vec![
                Token::CteInt(1),
                Token::CteFloat(2.5),
                Token::CteString("hi\\n".to_owned()),
                Token::CteBool(true),
                Token::CteBool(false),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = kinds("x // trailing\n/* block\n * with lines */ y");
        assert_eq!(tokens, vec![Token::Ident("x".to_owned()), Token::Ident("y".to_owned())]);
    }

    #[test]
    fn line_numbers_follow_newlines() {
        let tokens = tokenize("a\nb\n\nc").unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn illegal_character_is_reported_with_line() {
        let err = tokenize("x = 1;\n@").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains('@'));
    }

    #[test]
    fn operators_two_char_before_one_char() {
        assert_eq!(
            kinds("== != = ! < > && ||"),
            vec![
                Token::Equals,
                Token::NotEquals,
                Token::Assign,
                Token::Not,
                Token::Less,
                Token::Greater,
                Token::And,
                Token::Or,
            ]
        );
    }
}
