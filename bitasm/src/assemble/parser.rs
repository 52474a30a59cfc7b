//! Parsers for line shapes and numeric literals.

use chumsky::prelude::*;
use logos::Logos;

use crate::bits::{self, Bits};

/// Splits `line` into its first whitespace-free word and, if the word is
/// followed by spaces or tabs, the remainder of the line.
/// Returns `None` if the line does not start with a word.
pub fn split_word(line: &str) -> Option<(&str, Option<&str>)> {
    word_and_rest().parse(line).into_result().ok()
}

fn word_and_rest<'src>()
-> impl Parser<'src, &'src str, (&'src str, Option<&'src str>), extra::Err<Rich<'src, char>>> {
    let word = any()
        .filter(|c: &char| !c.is_whitespace())
        .repeated()
        .at_least(1)
        .to_slice();
    let rest = one_of(" \t")
        .repeated()
        .at_least(1)
        .ignore_then(any().repeated().to_slice());
    word.then(rest.or_not()).then_ignore(end())
}

/// A numeric literal as written in an immediate operand or directive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// An unsigned hex, octal or binary literal.
    /// Each digit contributes exactly 4, 3 or 1 bits, leading zeros included.
    Pattern(Bits),
    /// A decimal literal, or any literal with an explicit sign.
    Integer(i128),
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralToken<'a> {
    #[regex("0[xX][0-9a-fA-F_]+", |lex| &lex.slice()[2..])]
    Hex(&'a str),

    #[regex("0[oO][0-7_]+", |lex| &lex.slice()[2..])]
    Octal(&'a str),

    #[regex("0[bB][01_]+", |lex| &lex.slice()[2..])]
    Binary(&'a str),

    #[regex("[0-9][0-9_]*", |lex| lex.slice())]
    Decimal(&'a str),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
}

impl<'a> LiteralToken<'a> {
    /// The digits and radix of a number token.
    fn digits(self) -> Option<(&'a str, u32)> {
        match self {
            LiteralToken::Hex(digits) => Some((digits, 16)),
            LiteralToken::Octal(digits) => Some((digits, 8)),
            LiteralToken::Binary(digits) => Some((digits, 2)),
            LiteralToken::Decimal(digits) => Some((digits, 10)),
            LiteralToken::Plus | LiteralToken::Minus => None,
        }
    }
}

/// Parses `text` as `[+-]?(0x<hex>|0o<oct>|0b<bin>|<decimal>)`.
pub fn parse_literal(text: &str) -> Option<Literal> {
    let tokens = LiteralToken::lexer(text)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    match tokens.as_slice() {
        [LiteralToken::Decimal(digits)] => integer(digits, 10).map(Literal::Integer),
        [number] => {
            let (digits, radix) = number.digits()?;
            pattern(digits, radix).map(Literal::Pattern)
        }
        [LiteralToken::Plus, number] => {
            let (digits, radix) = number.digits()?;
            integer(digits, radix).map(Literal::Integer)
        }
        [LiteralToken::Minus, number] => {
            let (digits, radix) = number.digits()?;
            integer(digits, radix)?.checked_neg().map(Literal::Integer)
        }
        _ => None,
    }
}

fn integer(digits: &str, radix: u32) -> Option<i128> {
    i128::from_str_radix(&digits.replace('_', ""), radix).ok()
}

fn pattern(digits: &str, radix: u32) -> Option<Bits> {
    let digit_width = match radix {
        16 => 4,
        8 => 3,
        2 => 1,
        _ => return None,
    };
    let mut result = Bits::new();
    for digit in digits.chars().filter(|c| *c != '_') {
        let value = digit.to_digit(radix)?;
        result.extend_from_bitslice(&bits::from_unsigned(u128::from(value), digit_width));
    }
    (!result.is_empty()).then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_first_word() {
        assert_eq!(split_word("NOP"), Some(("NOP", None)));
        assert_eq!(
            split_word("ADDI $0, $1, #2"),
            Some(("ADDI", Some("$0, $1, #2")))
        );
        assert_eq!(split_word("segment\tTEXT"), Some(("segment", Some("TEXT"))));
        assert_eq!(split_word(" NOP"), None);
        assert_eq!(split_word(""), None);
    }

    #[test]
    fn based_literals_are_patterns() {
        assert_eq!(
            parse_literal("0x1F"),
            Some(Literal::Pattern(bits::from_bin("00011111").unwrap()))
        );
        assert_eq!(
            parse_literal("0b101"),
            Some(Literal::Pattern(bits::from_bin("101").unwrap()))
        );
        assert_eq!(
            parse_literal("0o17"),
            Some(Literal::Pattern(bits::from_bin("001111").unwrap()))
        );
    }

    #[test]
    fn signed_and_decimal_literals_are_integers() {
        assert_eq!(parse_literal("22"), Some(Literal::Integer(22)));
        assert_eq!(parse_literal("-1024"), Some(Literal::Integer(-1024)));
        assert_eq!(parse_literal("+7"), Some(Literal::Integer(7)));
        assert_eq!(parse_literal("-0x10"), Some(Literal::Integer(-16)));
        assert_eq!(parse_literal("1_000"), Some(Literal::Integer(1000)));
    }

    #[test]
    fn rejects_malformed_literals() {
        assert_eq!(parse_literal(""), None);
        assert_eq!(parse_literal("0xZZ"), None);
        assert_eq!(parse_literal("12abc"), None);
        assert_eq!(parse_literal("--1"), None);
        assert_eq!(parse_literal("LOOP"), None);
    }
}
