//! Declarative description of an instruction set.
//!
//! An [`InstructionSet`] maps mnemonics to [`InstructionProcessor`]s, each of
//! which is an [`Opcode`] followed by a fixed layout of operand fields.
//! Tables are validated as they are built: an instruction that could not be
//! told apart from an existing one by its fixed bits is rejected.

use std::collections::BTreeMap;

use bitvec::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::bits::{self, Bits};

pub mod instruction;
pub mod operand;
pub mod table;

pub use instruction::{InstructionProcessor, Operand};
pub use operand::{EncodeContext, Encoded, OperandProcessor};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum IsaError {
    #[error(
        "instruction '{mnemonic}' lists {format} operands in its format but has {operands} operand processors"
    )]
    FormatMismatch {
        mnemonic: String,
        format: usize,
        operands: usize,
    },
    #[error("format of instruction '{mnemonic}' names unknown or repeated operand '{operand}'")]
    FormatOperand { mnemonic: String, operand: String },
    #[error("instructions '{first}' and '{second}' cannot be told apart by their fixed bits")]
    OpcodeAlias { first: String, second: String },
    #[error("instruction '{0}' is defined twice")]
    DuplicateMnemonic(String),
    #[error("register '{name}' is {actual} bits wide but its table holds {expected}-bit registers")]
    RegisterWidth {
        name: String,
        actual: usize,
        expected: usize,
    },
    #[error(
        "instruction '{mnemonic}' is {width} bits wide, which is not a whole number of {unit}-bit storage units"
    )]
    UnalignedWidth {
        mnemonic: String,
        width: usize,
        unit: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub name: String,
    pub bits: Bits,
}

impl Opcode {
    pub fn new(name: &str, code: u128, width: usize) -> Self {
        Opcode {
            name: name.to_uppercase(),
            bits: bits::from_unsigned(code, width),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub name: String,
    pub bits: Bits,
}

/// One class of registers, all of the same width.
/// Names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTable {
    width: usize,
    registers: BTreeMap<String, Register>,
}

impl RegisterTable {
    pub fn new(width: usize) -> Self {
        RegisterTable {
            width,
            registers: BTreeMap::new(),
        }
    }

    /// `count` registers named `{prefix}0`, `{prefix}1`, ..., numbered from zero.
    pub fn numbered(prefix: &str, count: u128, width: usize) -> Self {
        let mut table = RegisterTable::new(width);
        for code in 0..count {
            let name = format!("{prefix}{code}").to_uppercase();
            table.registers.insert(
                name.clone(),
                Register {
                    name,
                    bits: bits::from_unsigned(code, width),
                },
            );
        }
        table
    }

    pub fn insert(&mut self, register: Register) -> Result<(), IsaError> {
        if register.bits.len() != self.width {
            return Err(IsaError::RegisterWidth {
                name: register.name,
                actual: register.bits.len(),
                expected: self.width,
            });
        }
        self.registers
            .insert(register.name.to_uppercase(), register);
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, name: &str) -> Option<&Register> {
        self.registers.get(&name.to_uppercase())
    }

    /// Whether some register of this table is encoded as `bits`.
    pub fn contains_bits(&self, bits: &BitSlice<u8, Msb0>) -> bool {
        self.registers
            .values()
            .any(|register| register.bits.as_bitslice() == bits)
    }
}

/// Maps mnemonics to their instruction definitions.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    instructions: BTreeMap<String, InstructionProcessor>,
    /// Width in bits of one addressable storage unit.
    storage_unit: usize,
}

impl InstructionSet {
    pub fn new(storage_unit: usize) -> Self {
        InstructionSet {
            instructions: BTreeMap::new(),
            storage_unit,
        }
    }

    /// Adds an instruction, rejecting duplicate mnemonics, widths that are
    /// not whole storage units, and encodings that alias an existing instruction.
    pub fn insert(&mut self, instruction: InstructionProcessor) -> Result<(), IsaError> {
        let mnemonic = instruction.mnemonic().to_uppercase();
        if self.instructions.contains_key(&mnemonic) {
            return Err(IsaError::DuplicateMnemonic(mnemonic));
        }
        if self.storage_unit == 0 || instruction.width() % self.storage_unit != 0 {
            return Err(IsaError::UnalignedWidth {
                mnemonic,
                width: instruction.width(),
                unit: self.storage_unit,
            });
        }
        if let Some(existing) = self
            .instructions
            .values()
            .find(|existing| existing.aliases(&instruction))
        {
            return Err(IsaError::OpcodeAlias {
                first: existing.mnemonic().to_owned(),
                second: mnemonic,
            });
        }
        self.instructions.insert(mnemonic, instruction);
        Ok(())
    }

    pub fn get(&self, mnemonic: &str) -> Option<&InstructionProcessor> {
        self.instructions.get(&mnemonic.to_uppercase())
    }

    pub fn storage_unit(&self) -> usize {
        self.storage_unit
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionProcessor> {
        self.instructions.values()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, code: u128) -> InstructionProcessor {
        InstructionProcessor::new(Opcode::new(name, code, 5))
    }

    #[test]
    fn register_names_are_case_insensitive() {
        let table = RegisterTable::numbered("V", 8, 3);
        assert_eq!(table.get("v3").map(|r| r.name.as_str()), Some("V3"));
        assert!(table.contains_bits(&bits::from_unsigned(7, 3)));
        assert!(table.get("V8").is_none());
    }

    #[test]
    fn rejects_registers_of_the_wrong_width() {
        let mut table = RegisterTable::new(3);
        let err = table
            .insert(Register {
                name: "SP".to_owned(),
                bits: bits::from_unsigned(1, 4),
            })
            .unwrap_err();
        assert!(matches!(err, IsaError::RegisterWidth { actual: 4, expected: 3, .. }));
    }

    #[test]
    fn overloaded_opcodes_need_distinct_fixed_bits() {
        let mut set = InstructionSet::new(8);
        set.insert(
            op("ADD", 25)
                .operand("Rd", OperandProcessor::unsigned(9))
                .operand("alu_op", OperandProcessor::fixed(0, 2)),
        )
        .unwrap();
        set.insert(
            op("SUB", 25)
                .operand("Rd", OperandProcessor::unsigned(9))
                .operand("alu_op", OperandProcessor::fixed(1, 2)),
        )
        .unwrap();
        let err = set
            .insert(op("SLBI", 25).operand("imm", OperandProcessor::unsigned(11)))
            .unwrap_err();
        assert_eq!(
            err,
            IsaError::OpcodeAlias {
                first: "ADD".to_owned(),
                second: "SLBI".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_duplicate_and_unaligned_instructions() {
        let mut set = InstructionSet::new(8);
        set.insert(op("NOP", 1).operand("pad", OperandProcessor::zeros(11)))
            .unwrap();
        assert_eq!(
            set.insert(op("nop", 2).operand("pad", OperandProcessor::zeros(11))),
            Err(IsaError::DuplicateMnemonic("NOP".to_owned()))
        );
        assert!(matches!(
            set.insert(op("HALT", 0).operand("pad", OperandProcessor::zeros(10))),
            Err(IsaError::UnalignedWidth { width: 15, .. })
        ));
        assert_eq!(set.len(), 1);
        assert!(set.get("nop").is_some());
    }
}
