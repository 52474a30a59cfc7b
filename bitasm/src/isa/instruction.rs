//! A single instruction: an opcode followed by its operand fields.

use crate::{
    assemble::{state::PassState, syntax::Syntax},
    diagnostic::{Diagnostic, ErrorKind},
};

use super::{EncodeContext, Encoded, IsaError, Opcode, OperandProcessor};

#[derive(Debug, Clone)]
pub struct Operand {
    pub name: String,
    pub processor: OperandProcessor,
}

/// Encodes one instruction.
///
/// Operands are stored in the order their bits appear after the opcode.
/// The format is the order in which they are written in source, which may
/// differ: `ADD $Rd, $Rs, $Rt` is laid out as `Rs Rt Rd`.
#[derive(Debug, Clone)]
pub struct InstructionProcessor {
    opcode: Opcode,
    operands: Vec<Operand>,
    /// Indices into `operands`, in source order.
    format: Vec<usize>,
}

impl InstructionProcessor {
    pub fn new(opcode: Opcode) -> Self {
        InstructionProcessor {
            opcode,
            operands: Vec::new(),
            format: Vec::new(),
        }
    }

    /// Appends a field to the bit layout.
    /// Unless [`Self::format`] is called, source order follows the layout.
    pub fn operand(mut self, name: &str, processor: OperandProcessor) -> Self {
        self.format.push(self.operands.len());
        self.operands.push(Operand {
            name: name.to_owned(),
            processor,
        });
        self
    }

    /// Sets the source order of the operands.
    /// Every operand, implicit ones included, must be named exactly once.
    pub fn format(mut self, order: &[&str]) -> Result<Self, IsaError> {
        if order.len() != self.operands.len() {
            return Err(IsaError::FormatMismatch {
                mnemonic: self.opcode.name.clone(),
                format: order.len(),
                operands: self.operands.len(),
            });
        }
        let mut format = Vec::with_capacity(order.len());
        for name in order {
            match self.operands.iter().position(|op| op.name == *name) {
                Some(index) if !format.contains(&index) => format.push(index),
                _ => {
                    return Err(IsaError::FormatOperand {
                        mnemonic: self.opcode.name.clone(),
                        operand: (*name).to_owned(),
                    });
                }
            }
        }
        self.format = format;
        Ok(self)
    }

    pub fn mnemonic(&self) -> &str {
        &self.opcode.name
    }

    pub fn opcode(&self) -> &Opcode {
        &self.opcode
    }

    /// Operands in bit-layout order.
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Operands in source order.
    pub fn source_operands(&self) -> impl Iterator<Item = &Operand> {
        self.format.iter().map(|&index| &self.operands[index])
    }

    /// Width of the encoded instruction in bits.
    pub fn width(&self) -> usize {
        self.opcode.bits.len()
            + self
                .operands
                .iter()
                .map(|op| op.processor.width())
                .sum::<usize>()
    }

    /// The value of every bit that is the same in all encodings of this
    /// instruction, or `None` where an operand decides it.
    fn fixed_bits(&self) -> Vec<Option<bool>> {
        let mut fixed: Vec<Option<bool>> = self.opcode.bits.iter().by_vals().map(Some).collect();
        for operand in &self.operands {
            match operand.processor.implicit_bits() {
                Some(bits) => fixed.extend(bits.iter().by_vals().map(Some)),
                None => fixed.extend(std::iter::repeat_n(None, operand.processor.width())),
            }
        }
        fixed
    }

    /// Whether some word could be decoded as either instruction.
    pub fn aliases(&self, other: &InstructionProcessor) -> bool {
        self.fixed_bits()
            .into_iter()
            .zip(other.fixed_bits())
            .all(|pair| match pair {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
    }

    /// Encodes the operand text that followed the mnemonic.
    ///
    /// Each operand is first looked up as a symbol; anything else is handed
    /// to its field's encoder as literal text. Errors carry the offending
    /// operand as their token.
    pub fn process_str(
        &self,
        operands: &str,
        state: &PassState,
        syntax: &Syntax,
        storage_unit: usize,
    ) -> Result<Encoded, Diagnostic> {
        let supplied = if operands.trim().is_empty() {
            Vec::new()
        } else {
            operands
                .split(syntax.operand_delimiter)
                .map(str::trim)
                .collect::<Vec<_>>()
        };
        let provided = supplied.iter().filter(|text| !text.is_empty()).count();
        let expected = self
            .operands
            .iter()
            .filter(|op| !op.processor.is_implicit())
            .count();

        if supplied.len() > expected {
            return Err(Diagnostic::from(ErrorKind::UnexpectedOperand {
                operand: supplied[expected].to_owned(),
                position: expected,
                mnemonic: self.opcode.name.clone(),
                expected,
                provided: supplied.len(),
            })
            .at_token(supplied[expected]));
        }

        let cx = EncodeContext {
            state,
            syntax,
            instruction_units: (self.width() / storage_unit.max(1)) as u64,
        };
        let mut fields: Vec<Option<Encoded>> = vec![None; self.operands.len()];
        let mut texts = supplied.iter();
        let mut position = 0;
        for &index in &self.format {
            let operand = &self.operands[index];
            let encoded = if operand.processor.is_implicit() {
                operand.processor.encode_text("", &cx)?
            } else {
                let text = texts.next().copied().unwrap_or_default();
                if text.is_empty() {
                    return Err(Diagnostic::from(ErrorKind::MissingOperand {
                        name: operand.name.clone(),
                        position,
                        mnemonic: self.opcode.name.clone(),
                        expected,
                        provided,
                    })
                    .at_token(operands.trim()));
                }
                position += 1;
                match state.symbol(text) {
                    Some(value) => operand.processor.encode_symbol(text, value, &cx),
                    None => operand.processor.encode_text(text, &cx),
                }
                .map_err(|err| err.at_token(text))?
            };
            fields[index] = Some(encoded);
        }

        let mut result = Encoded::new(self.opcode.bits.clone());
        for field in fields.into_iter().flatten() {
            result.bits.extend_from_bitslice(&field.bits);
            result.warnings.extend(field.warnings);
        }
        Ok(result)
    }
}
