use super::SyntaxError;
use logos::Logos;
use std::ops::Range;

#[derive(Logos, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("@")]
    At,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    /// Identifier, possibly containing `*` wildcards
    #[regex(r"[a-zA-Z_$*][a-zA-Z0-9_$*]*")]
    Word,
}

impl Token {
    pub fn describe(self) -> &'static str {
        match self {
            Token::AndAnd => "`&&`",
            Token::OrOr => "`||`",
            Token::Bang => "`!`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::Comma => "`,`",
            Token::DotDot => "`..`",
            Token::Dot => "`.`",
            Token::Plus => "`+`",
            Token::At => "`@`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::Word => "identifier",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Lexeme<'s> {
    pub token: Token,
    pub text: &'s str,
    pub span: Range<usize>,
}

/// Split pointcut text into tokens
pub fn tokenize(source: &str) -> Result<Vec<Lexeme<'_>>, SyntaxError> {
    let mut lexemes = vec![];
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        match token {
            Ok(token) => lexemes.push(Lexeme {
                token,
                text: lexer.slice(),
                span,
            }),
            Err(()) => {
                return Err(SyntaxError {
                    message: format!("unexpected character(s) `{}`", lexer.slice()),
                    span,
                })
            }
        }
    }
    Ok(lexemes)
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Vec<(Token, &str)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|lexeme| (lexeme.token, lexeme.text))
            .collect()
    }

    #[test]
    fn package_wildcards() {
        assert_eq!(
            tokens("call(* com..*Service+.get*(..))"),
            vec![
                (Token::Word, "call"),
                (Token::LParen, "("),
                (Token::Word, "*"),
                (Token::Word, "com"),
                (Token::DotDot, ".."),
                (Token::Word, "*Service"),
                (Token::Plus, "+"),
                (Token::Dot, "."),
                (Token::Word, "get*"),
                (Token::LParen, "("),
                (Token::DotDot, ".."),
                (Token::RParen, ")"),
                (Token::RParen, ")"),
            ]
        );
    }

    #[test]
    fn operators_and_errors() {
        assert_eq!(
            tokens("!a()&&b() || @this(X)"),
            vec![
                (Token::Bang, "!"),
                (Token::Word, "a"),
                (Token::LParen, "("),
                (Token::RParen, ")"),
                (Token::AndAnd, "&&"),
                (Token::Word, "b"),
                (Token::LParen, "("),
                (Token::RParen, ")"),
                (Token::OrOr, "||"),
                (Token::At, "@"),
                (Token::Word, "this"),
                (Token::LParen, "("),
                (Token::Word, "X"),
                (Token::RParen, ")"),
            ]
        );

        let err = tokenize("call(List<String> *(..))").unwrap_err();
        assert_eq!(err.span.start, 9);
    }
}
