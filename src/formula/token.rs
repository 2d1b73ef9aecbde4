//! Tokenizer for the restricted formula grammar.

use smallvec::SmallVec;

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Definitions are short; sixteen tokens covers virtually every real formula
/// without a heap allocation.
pub type TokenBuf = SmallVec<[Token; 16]>;

/// Splits a definition into tokens. Identifiers are maximal runs of
/// alphanumeric/underscore characters; all-digit runs are numeric literals.
pub fn tokenize(input: &str) -> Result<TokenBuf, ExprError> {
    let mut tokens = TokenBuf::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            let mut end = start;
            while let Some(&(idx, w)) = chars.peek() {
                if w.is_alphanumeric() || w == '_' {
                    end = idx + w.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &input[start..end];
            if word.chars().all(|d| d.is_ascii_digit()) {
                let value = word
                    .parse::<f64>()
                    .map_err(|_| ExprError::Malformed(format!("bad numeric literal '{word}'")))?;
                tokens.push(Token::Number(value));
            } else {
                tokens.push(Token::Ident(word.to_string()));
            }
            continue;
        }
        chars.next();
        tokens.push(match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(ExprError::Malformed(format!("unexpected character '{other}'"))),
        });
    }

    Ok(tokens)
}
