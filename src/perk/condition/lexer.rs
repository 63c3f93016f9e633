//! Single-pass tokenizer for the expression language

use crate::perk::error::ExprError;

/// Token kinds produced by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword, including dot-joined field paths
    Word,
    /// `==`, `!=`, `>=`, `<=`, `>`, `<`, `*`, `/`, `+`, `-`
    Op,
    /// `"..."` or `'...'` with escapes resolved
    Str,
    /// `42`, `3.14`, `-5`
    Number,
    /// `true` / `false` (case-insensitive)
    Bool,
    LParen,
    RParen,
    /// End-of-input sentinel
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Scan an expression into a flat token sequence terminated by `Eof`.
pub fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        if ch == '(' {
            tokens.push(Token::new(TokenKind::LParen, "("));
            i += 1;
            continue;
        }
        if ch == ')' {
            tokens.push(Token::new(TokenKind::RParen, ")"));
            i += 1;
            continue;
        }
        // Comparison operators, with the two-character forms first.
        if matches!(ch, '=' | '!' | '<' | '>') {
            if i + 1 < chars.len() && chars[i + 1] == '=' {
                tokens.push(Token::new(TokenKind::Op, format!("{ch}=")));
                i += 2;
            } else {
                tokens.push(Token::new(TokenKind::Op, ch));
                i += 1;
            }
            continue;
        }
        // Arithmetic operators (used in formula expressions). A '-' is only
        // an operator when not immediately followed by a digit; negative
        // number literals are handled below.
        if matches!(ch, '*' | '/' | '+') {
            tokens.push(Token::new(TokenKind::Op, ch));
            i += 1;
            continue;
        }
        if ch == '-' && !next_is_digit(&chars, i) {
            tokens.push(Token::new(TokenKind::Op, ch));
            i += 1;
            continue;
        }
        // Quoted string literals with \", \' and \\ escapes.
        if ch == '"' || ch == '\'' {
            let (text, next) = scan_string(&chars, i, ch)?;
            tokens.push(Token::new(TokenKind::Str, text));
            i = next;
            continue;
        }
        // Numbers, optionally negative.
        if ch.is_ascii_digit() || (ch == '-' && next_is_digit(&chars, i)) {
            let mut j = i;
            if chars[j] == '-' {
                j += 1;
            }
            while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                j += 1;
            }
            let text: String = chars[i..j].iter().collect();
            tokens.push(Token::new(TokenKind::Number, text));
            i = j;
            continue;
        }
        // Words: identifiers, keywords and field paths. Dots are part of the
        // token so `payload.amount` scans as one word.
        if ch.is_alphabetic() || ch == '_' {
            let mut j = i;
            while j < chars.len()
                && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.')
            {
                j += 1;
            }
            let word: String = chars[i..j].iter().collect();
            if word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") {
                tokens.push(Token::new(TokenKind::Bool, word.to_ascii_lowercase()));
            } else {
                tokens.push(Token::new(TokenKind::Word, word));
            }
            i = j;
            continue;
        }
        return Err(ExprError::UnexpectedChar { ch, pos: i });
    }

    tokens.push(Token::new(TokenKind::Eof, ""));
    Ok(tokens)
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    i + 1 < chars.len() && chars[i + 1].is_ascii_digit()
}

/// Scan a quoted literal starting at `start` (which holds the quote).
/// Returns the unescaped contents and the index just past the closing quote.
fn scan_string(chars: &[char], start: usize, quote: char) -> Result<(String, usize), ExprError> {
    let mut text = String::new();
    let mut j = start + 1;
    while j < chars.len() {
        let c = chars[j];
        if c == quote {
            return Ok((text, j + 1));
        }
        if c == '\\' && j + 1 < chars.len() {
            let next = chars[j + 1];
            match next {
                '"' | '\'' | '\\' => text.push(next),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
            j += 2;
            continue;
        }
        text.push(c);
        j += 1;
    }
    Err(ExprError::UnterminatedString { pos: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expr: &str) -> Vec<TokenKind> {
        tokenize(expr).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_comparison() {
        let tokens = tokenize("payload.amount > 1000").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].kind, TokenKind::Word);
        assert_eq!(tokens[0].text, "payload.amount");
        assert_eq!(tokens[1].kind, TokenKind::Op);
        assert_eq!(tokens[1].text, ">");
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].text, "1000");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_two_char_operators() {
        for op in ["==", "!=", ">=", "<="] {
            let tokens = tokenize(&format!("a {op} 1")).unwrap();
            assert_eq!(tokens[1].text, op);
        }
    }

    #[test]
    fn test_string_quotes_and_escapes() {
        let tokens = tokenize(r#"name == "he said \"hi\"""#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, r#"he said "hi""#);

        let tokens = tokenize(r"name == 'it\'s'").unwrap();
        assert_eq!(tokens[2].text, "it's");

        let tokens = tokenize(r#"path == "a\\b""#).unwrap();
        assert_eq!(tokens[2].text, r"a\b");
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#"name == "oops"#).unwrap_err();
        assert!(matches!(err, ExprError::UnterminatedString { pos: 8 }));
    }

    #[test]
    fn test_negative_number_vs_subtraction() {
        // "-5" is one number token
        let tokens = tokenize("-5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "-5");

        // "amount - 5" is word, op, number
        assert_eq!(
            kinds("amount - 5"),
            vec![
                TokenKind::Word,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_arithmetic_operators() {
        let tokens = tokenize("payload.amount * 0.05").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Op);
        assert_eq!(tokens[1].text, "*");
        assert_eq!(tokens[2].text, "0.05");
    }

    #[test]
    fn test_boolean_literals_case_insensitive() {
        for text in ["true", "True", "FALSE"] {
            let tokens = tokenize(text).unwrap();
            assert_eq!(tokens[0].kind, TokenKind::Bool);
        }
    }

    #[test]
    fn test_keywords_stay_words() {
        let tokens = tokenize("a == 1 AND b == 2").unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Word);
        assert_eq!(tokens[3].text, "AND");
    }

    #[test]
    fn test_parens() {
        assert_eq!(
            kinds("(a > 1)"),
            vec![
                TokenKind::LParen,
                TokenKind::Word,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("a @ 1").unwrap_err();
        assert!(matches!(err, ExprError::UnexpectedChar { ch: '@', pos: 2 }));
    }

    #[test]
    fn test_empty_input_is_just_eof() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
