//! Encoders for the individual fields of an instruction.

use std::sync::Arc;

use crate::{
    assemble::{
        parser::{Literal, parse_literal, split_word},
        state::PassState,
        syntax::Syntax,
    },
    bits::{self, Bits, Signedness},
    diagnostic::{Diagnostic, ErrorKind},
};

use super::RegisterTable;

/// How one field of an instruction is filled in.
#[derive(Debug, Clone)]
pub enum OperandProcessor {
    /// A constant field that is never written in source.
    Implicit(Bits),
    /// A register name such as `$3`, looked up in `table`.
    Register {
        width: usize,
        table: Arc<RegisterTable>,
    },
    /// A literal such as `#-2`, or a label standing for its address.
    Immediate { width: usize, signedness: Signedness },
    /// A signed offset from the following instruction to a label.
    /// Literals are written into the field as given.
    Displacement { width: usize },
}

/// Bits produced for one field or instruction, together with the warnings
/// raised while encoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bits: Bits,
    pub warnings: Vec<Diagnostic>,
}

impl Encoded {
    pub fn new(bits: Bits) -> Self {
        Encoded {
            bits,
            warnings: Vec::new(),
        }
    }
}

/// What an operand encoder may look at.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub state: &'a PassState,
    pub syntax: &'a Syntax,
    /// Size of the instruction being encoded, in storage units.
    pub instruction_units: u64,
}

impl OperandProcessor {
    pub fn zeros(width: usize) -> Self {
        OperandProcessor::Implicit(Bits::repeat(false, width))
    }

    pub fn fixed(value: u128, width: usize) -> Self {
        OperandProcessor::Implicit(bits::from_unsigned(value, width))
    }

    pub fn register(table: &Arc<RegisterTable>) -> Self {
        OperandProcessor::Register {
            width: table.width(),
            table: Arc::clone(table),
        }
    }

    pub fn signed(width: usize) -> Self {
        OperandProcessor::Immediate {
            width,
            signedness: Signedness::Signed,
        }
    }

    pub fn unsigned(width: usize) -> Self {
        OperandProcessor::Immediate {
            width,
            signedness: Signedness::Unsigned,
        }
    }

    pub fn displacement(width: usize) -> Self {
        OperandProcessor::Displacement { width }
    }

    pub fn width(&self) -> usize {
        match self {
            OperandProcessor::Implicit(bits) => bits.len(),
            OperandProcessor::Register { width, .. }
            | OperandProcessor::Immediate { width, .. }
            | OperandProcessor::Displacement { width } => *width,
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, OperandProcessor::Implicit(_))
    }

    /// The constant bits of an implicit field.
    pub fn implicit_bits(&self) -> Option<&Bits> {
        match self {
            OperandProcessor::Implicit(bits) => Some(bits),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            OperandProcessor::Implicit(_) => "implicit",
            OperandProcessor::Register { .. } => "CPU register",
            OperandProcessor::Immediate { .. } => "immediate",
            OperandProcessor::Displacement { .. } => "displacement",
        }
    }

    /// Encodes an operand as written in source.
    pub fn encode_text(&self, text: &str, cx: &EncodeContext<'_>) -> Result<Encoded, Diagnostic> {
        let text = text.trim();
        match self {
            OperandProcessor::Implicit(bits) => {
                if text.is_empty() {
                    Ok(Encoded::new(bits.clone()))
                } else {
                    Err(ErrorKind::UnexpectedImplicitOperand(text.to_owned()).into())
                }
            }
            OperandProcessor::Register { table, .. } => {
                let name = self.strip_prefix(text, cx.syntax.register_prefix)?;
                let name = self.single_token(name)?;
                table
                    .get(name)
                    .map(|register| Encoded::new(register.bits.clone()))
                    .ok_or_else(|| ErrorKind::UnknownRegister(name.to_owned()).into())
            }
            OperandProcessor::Immediate { width, signedness } => {
                self.encode_literal(text, *width, *signedness, cx)
            }
            OperandProcessor::Displacement { width } => {
                self.encode_literal(text, *width, Signedness::Signed, cx)
            }
        }
    }

    /// Encodes an operand that named the symbol `name`, bound to `value`.
    pub fn encode_symbol(
        &self,
        name: &str,
        value: &Bits,
        cx: &EncodeContext<'_>,
    ) -> Result<Encoded, Diagnostic> {
        match self {
            OperandProcessor::Implicit(_) => {
                Err(ErrorKind::SymbolNotPermitted(name.to_owned()).into())
            }
            OperandProcessor::Register { width, table } => {
                match bits::resize(value, *width, Signedness::Unsigned) {
                    Ok(bits) if table.contains_bits(&bits) => Ok(Encoded::new(bits)),
                    _ => Err(ErrorKind::UnknownRegisterSymbol(name.to_owned()).into()),
                }
            }
            OperandProcessor::Immediate { width, signedness } => {
                Ok(Encoded::new(bits::resize(value, *width, *signedness)?))
            }
            OperandProcessor::Displacement { width } => {
                let target = bits::to_unsigned(value) as i128;
                let displacement =
                    target - i128::from(cx.state.pc) - i128::from(cx.instruction_units);
                log::trace!(
                    "displacement to '{name}' from {}: {displacement}",
                    cx.state.pc
                );
                let bits = bits::resize(
                    &bits::from_signed(displacement, 128),
                    *width,
                    Signedness::Signed,
                )?;
                Ok(Encoded::new(bits))
            }
        }
    }

    fn strip_prefix<'t>(&self, text: &'t str, prefix: char) -> Result<&'t str, ErrorKind> {
        if let Some(rest) = text.strip_prefix(prefix) {
            return Ok(rest);
        }
        let found = text.chars().next().unwrap_or(' ');
        // An identifier where a literal was expected can only be a label nobody defined.
        if !self.is_register() && (found.is_alphabetic() || found == '_') {
            return Err(ErrorKind::UndefinedSymbol(text.to_owned()));
        }
        Err(ErrorKind::UnknownFormatSpecifier {
            found,
            kind: self.kind(),
            expected: prefix,
        })
    }

    fn is_register(&self) -> bool {
        matches!(self, OperandProcessor::Register { .. })
    }

    /// Rejects anything following the first word of an operand.
    fn single_token<'t>(&self, text: &'t str) -> Result<&'t str, ErrorKind> {
        match split_word(text) {
            Some((_, Some(extra))) if !extra.trim().is_empty() => Err(ErrorKind::UnexpectedToken {
                token: extra.trim().to_owned(),
                kind: self.kind(),
            }),
            Some((word, _)) => Ok(word),
            None => Ok(text),
        }
    }

    fn encode_literal(
        &self,
        text: &str,
        width: usize,
        signedness: Signedness,
        cx: &EncodeContext<'_>,
    ) -> Result<Encoded, Diagnostic> {
        let literal = self.single_token(self.strip_prefix(text, cx.syntax.immediate_prefix)?)?;
        let invalid = || ErrorKind::InvalidImmediate {
            literal: literal.to_owned(),
            width,
            signedness,
        };
        match parse_literal(literal) {
            Some(Literal::Pattern(pattern)) => {
                let bits = bits::resize(&pattern, width, Signedness::Unsigned)
                    .map_err(|_| invalid())?;
                let mut encoded = Encoded::new(bits);
                if signedness == Signedness::Signed && encoded.bits.first().is_some_and(|b| *b) {
                    encoded.warnings.push(
                        Diagnostic::warning(ErrorKind::SignBitLiteral {
                            literal: literal.to_owned(),
                            width,
                            value: bits::to_signed(&encoded.bits),
                        })
                        .at_token(text),
                    );
                }
                Ok(encoded)
            }
            Some(Literal::Integer(value)) => {
                bits::resize(&bits::from_signed(value, 128), width, signedness)
                    .map(Encoded::new)
                    .map_err(|_| invalid().into())
            }
            None => Err(invalid().into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::from_bin;

    fn encode(processor: &OperandProcessor, text: &str) -> Result<Encoded, Diagnostic> {
        let state = PassState::default();
        let syntax = Syntax::default();
        let cx = EncodeContext {
            state: &state,
            syntax: &syntax,
            instruction_units: 2,
        };
        processor.encode_text(text, &cx)
    }

    fn kind(result: Result<Encoded, Diagnostic>) -> ErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn registers() {
        let table = Arc::new(RegisterTable::numbered("", 8, 3));
        let register = OperandProcessor::register(&table);
        assert_eq!(encode(&register, " $5 ").unwrap().bits, from_bin("101").unwrap());
        assert_eq!(
            kind(encode(&register, "$8")),
            ErrorKind::UnknownRegister("8".to_owned())
        );
        assert_eq!(
            kind(encode(&register, "#1")),
            ErrorKind::UnknownFormatSpecifier {
                found: '#',
                kind: "CPU register",
                expected: '$',
            }
        );
        assert_eq!(
            kind(encode(&register, "$1 $2")),
            ErrorKind::UnexpectedToken {
                token: "$2".to_owned(),
                kind: "CPU register",
            }
        );
    }

    #[test]
    fn decimal_immediates_are_range_checked() {
        let imm = OperandProcessor::signed(5);
        assert_eq!(encode(&imm, "#-2").unwrap().bits, from_bin("11110").unwrap());
        assert_eq!(encode(&imm, "#15").unwrap().bits, from_bin("01111").unwrap());
        assert_eq!(
            kind(encode(&imm, "#16")),
            ErrorKind::InvalidImmediate {
                literal: "16".to_owned(),
                width: 5,
                signedness: Signedness::Signed,
            }
        );
        assert!(encode(&OperandProcessor::unsigned(8), "#-1").is_err());
        assert_eq!(
            encode(&OperandProcessor::unsigned(8), "#255").unwrap().bits,
            from_bin("11111111").unwrap()
        );
    }

    #[test]
    fn based_immediates_are_bit_patterns() {
        let imm = OperandProcessor::signed(5);
        let encoded = encode(&imm, "#0x1F").unwrap();
        assert_eq!(encoded.bits, from_bin("11111").unwrap());
        assert_eq!(encoded.warnings.len(), 1);
        assert_eq!(
            encoded.warnings[0].kind,
            ErrorKind::SignBitLiteral {
                literal: "0x1F".to_owned(),
                width: 5,
                value: -1,
            }
        );
        let encoded = encode(&imm, "#0x0F").unwrap();
        assert_eq!(encoded.bits, from_bin("01111").unwrap());
        assert!(encoded.warnings.is_empty());
        assert!(encode(&imm, "#0x3F").is_err());
    }

    #[test]
    fn identifiers_are_undefined_symbols() {
        assert_eq!(
            kind(encode(&OperandProcessor::displacement(8), "LOOP")),
            ErrorKind::UndefinedSymbol("LOOP".to_owned())
        );
        assert_eq!(
            kind(encode(&OperandProcessor::signed(8), "%4")),
            ErrorKind::UnknownFormatSpecifier {
                found: '%',
                kind: "immediate",
                expected: '#',
            }
        );
    }

    #[test]
    fn displacements_are_relative_to_the_next_instruction() {
        let mut state = PassState::default();
        state.pc = 6;
        let syntax = Syntax::default();
        let cx = EncodeContext {
            state: &state,
            syntax: &syntax,
            instruction_units: 2,
        };
        let disp = OperandProcessor::displacement(11);
        let target = bits::from_unsigned(2, bits::ADDRESS_WIDTH);
        assert_eq!(
            disp.encode_symbol("LOOP", &target, &cx).unwrap().bits,
            bits::from_signed(-6, 11)
        );

        let far = bits::from_unsigned(4000, bits::ADDRESS_WIDTH);
        let err = OperandProcessor::displacement(8)
            .encode_symbol("FAR", &far, &cx)
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Overflow {
                value: "3992".to_owned(),
                width: 8,
                signedness: Signedness::Signed,
            }
        );
    }

    #[test]
    fn register_symbols_must_name_a_register() {
        let state = PassState::default();
        let syntax = Syntax::default();
        let cx = EncodeContext {
            state: &state,
            syntax: &syntax,
            instruction_units: 2,
        };
        let table = Arc::new(RegisterTable::numbered("", 4, 3));
        let register = OperandProcessor::register(&table);
        let address = |value| bits::from_unsigned(value, bits::ADDRESS_WIDTH);

        assert_eq!(
            register.encode_symbol("R", &address(3), &cx).unwrap().bits,
            from_bin("011").unwrap()
        );
        // Fits in three bits, but no register is encoded as 110.
        assert_eq!(
            register.encode_symbol("R", &address(6), &cx).unwrap_err().kind,
            ErrorKind::UnknownRegisterSymbol("R".to_owned())
        );
        assert_eq!(
            register.encode_symbol("R", &address(9), &cx).unwrap_err().kind,
            ErrorKind::UnknownRegisterSymbol("R".to_owned())
        );
        assert_eq!(
            OperandProcessor::zeros(4)
                .encode_symbol("R", &address(3), &cx)
                .unwrap_err()
                .kind,
            ErrorKind::SymbolNotPermitted("R".to_owned())
        );
    }

    #[test]
    fn implicit_fields_take_no_text() {
        let pad = OperandProcessor::zeros(11);
        assert_eq!(encode(&pad, "").unwrap().bits, Bits::repeat(false, 11));
        assert_eq!(
            kind(encode(&pad, "#1")),
            ErrorKind::UnexpectedImplicitOperand("#1".to_owned())
        );
    }
}
