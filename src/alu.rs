//! ALU implementation

use crate::instruction::Instruction;

/// Performs an atomic ALU operation
/// Do signed arithmetic for good
pub fn alu(inst: &Instruction, op1: i32, op2: i32) -> i32 {
    match inst.controls.alu_op {
        ALUOp::ADD => op1.wrapping_add(op2),
        ALUOp::SUB => op1.wrapping_sub(op2),
        ALUOp::AND => op1 & op2,
        ALUOp::OR => op1 | op2,
        ALUOp::XOR => op1 ^ op2,
        // Branch ops evaluate to zero when the branch is taken
        ALUOp::BEQ => (op1 != op2) as i32,
        ALUOp::BNE => (op1 == op2) as i32,
        ALUOp::BLT => (op1 >= op2) as i32,
        ALUOp::BLTU => ((op1 as u32) >= (op2 as u32)) as i32,
        ALUOp::BGE => (op1 < op2) as i32,
        ALUOp::BGEU => ((op1 as u32) < (op2 as u32)) as i32,
        // Shift amounts use the low 5 bits of the source
        ALUOp::SLL => op1.wrapping_shl(op2 as u32),
        ALUOp::SRL => ((op1 as u32).wrapping_shr(op2 as u32)) as i32,
        ALUOp::SRA => op1.wrapping_shr(op2 as u32),
        ALUOp::SLT => (op1 < op2) as i32,
        ALUOp::SLTU => ((op1 as u32) < (op2 as u32)) as i32,
        ALUOp::MUL => op1.wrapping_mul(op2),
        ALUOp::MULH => (((op1 as i64).wrapping_mul(op2 as i64)) >> 32) as i32,
        ALUOp::MULHSU => (((op1 as i64).wrapping_mul((op2 as u32) as i64)) >> 32) as i32,
        ALUOp::MULHU => ((((op1 as u32) as u64).wrapping_mul((op2 as u32) as u64)) >> 32) as i32,
        ALUOp::DIV => {
            if op2 == 0 {
                -1
            } else {
                op1.wrapping_div(op2)
            }
        }
        ALUOp::DIVU => {
            if op2 == 0 {
                -1
            } else {
                ((op1 as u32) / (op2 as u32)) as i32
            }
        }
        ALUOp::REM => {
            if op2 == 0 {
                op1
            } else {
                op1.wrapping_rem(op2)
            }
        }
        ALUOp::REMU => {
            if op2 == 0 {
                op1
            } else {
                ((op1 as u32) % (op2 as u32)) as i32
            }
        }
    }
}

/// Selector for ALU src2 input
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUSrc {
    // From register
    #[default]
    REG,
    // From immediate
    IMM,
}

/// Set of ALU operations needed for rv32im
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUOp {
    // Arithmetic
    #[default]
    ADD,
    SUB,
    // Logical
    AND,
    OR,
    XOR,
    // Set
    SLT,
    SLTU,
    // Shift
    SLL,
    SRL,
    SRA,
    // Branch
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    // Multiply
    MUL,
    MULH,
    MULHSU,
    MULHU,
    // Divide
    DIV,
    DIVU,
    REM,
    REMU,
}
