//! The built-in instruction set of the 16-bit CPU.
//!
//! Every instruction is one 16-bit word: a 5-bit opcode followed by its
//! operand fields. Memory is addressed in 8-bit storage units.

use std::sync::Arc;

use super::{
    InstructionProcessor, InstructionSet, IsaError, Opcode, OperandProcessor, RegisterTable,
};

pub const WORD_WIDTH: usize = 16;
pub const STORAGE_UNIT_WIDTH: usize = 8;
pub const OPCODE_WIDTH: usize = 5;
pub const REGISTER_WIDTH: usize = 3;

/// `$0` to `$7`.
pub fn general_purpose_registers() -> RegisterTable {
    RegisterTable::numbered("", 8, REGISTER_WIDTH)
}

/// `$V0` to `$V7`, used by the vector load.
pub fn vector_registers() -> RegisterTable {
    RegisterTable::numbered("V", 8, REGISTER_WIDTH)
}

fn op(name: &str, code: u128) -> InstructionProcessor {
    InstructionProcessor::new(Opcode::new(name, code, OPCODE_WIDTH))
}

pub fn instruction_set() -> Result<InstructionSet, IsaError> {
    let gp = Arc::new(general_purpose_registers());
    let vector = Arc::new(vector_registers());
    let reg = || OperandProcessor::register(&gp);
    let vreg = || OperandProcessor::register(&vector);
    let pad = || OperandProcessor::zeros(WORD_WIDTH - OPCODE_WIDTH);

    // Rd, Rs, imm5: arithmetic with an immediate and the memory accesses.
    let rri = |name: &str, code: u128| {
        op(name, code)
            .operand("Rd", reg())
            .operand("Rs", reg())
            .operand("imm", OperandProcessor::signed(5))
    };
    // Rs, Rt, Rd, alu: written as `Rd, Rs, Rt`.
    let rrr = |name: &str, code: u128, alu: u128| {
        op(name, code)
            .operand("Rs", reg())
            .operand("Rt", reg())
            .operand("Rd", reg())
            .operand("alu_op", OperandProcessor::fixed(alu, 2))
            .format(&["Rd", "Rs", "Rt", "alu_op"])
    };
    let branch = |name: &str, code: u128| {
        op(name, code)
            .operand("Rs", reg())
            .operand("disp", OperandProcessor::displacement(8))
    };
    let reg_imm8 = |name: &str, code: u128, imm: OperandProcessor| {
        op(name, code).operand("Rs", reg()).operand("imm", imm)
    };

    let instructions = [
        op("HALT", 0).operand("pad", pad()),
        op("NOP", 1).operand("pad", pad()),
        op("J", 4).operand("disp", OperandProcessor::displacement(11)),
        reg_imm8("JR", 5, OperandProcessor::signed(8)),
        reg_imm8("JALR", 6, OperandProcessor::signed(8)),
        rri("ADDI", 8),
        rri("SUBI", 9),
        branch("BEQZ", 12),
        branch("BNEZ", 13),
        branch("BLTZ", 14),
        branch("BGEZ", 15),
        rri("STT", 16),
        rri("LDO", 17),
        reg_imm8("SLBI", 18, OperandProcessor::unsigned(8)),
        rri("STU", 19),
        rri("LDS", 20),
        reg_imm8("LBI", 24, OperandProcessor::signed(8)),
        rrr("ADD", 25, 0)?,
        rrr("SUB", 25, 1)?,
        rrr("SEQ", 28, 0)?,
        rrr("SLT", 28, 1)?,
        rrr("SLE", 28, 2)?,
        rri("STS", 29),
        op("VLD", 30)
            .operand("Rd", vreg())
            .operand("Rs", vreg())
            .operand("imm", OperandProcessor::signed(5)),
        op("VDOT", 31)
            .operand("Rd", reg())
            .operand("Rs", reg())
            .operand("ac", OperandProcessor::unsigned(1))
            .operand("pad", OperandProcessor::zeros(4)),
    ];

    let mut set = InstructionSet::new(STORAGE_UNIT_WIDTH);
    for instruction in instructions {
        set.insert(instruction)?;
    }
    Ok(set)
}
