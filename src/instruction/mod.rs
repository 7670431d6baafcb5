//! Instruction representation

use crate::alu::ALUOp;
use crate::alu::ALUSrc;

pub mod decode;

/// NOP: ADDI x0, x0, 0
pub(crate) const NOP: u32 = 0x13;

/// Wrapped instruction
#[derive(Clone, Copy, Debug)]
pub struct Instruction {
    /// Raw representation
    pub raw_inst: u32,
    /// Opcode
    pub opcode: Opcode,
    /// Format
    pub format: Format,
    /// Function
    pub function: Function,
    /// Subfields
    pub attributes: Attributes,
    /// Control signals
    pub controls: Controls,
}

impl Instruction {
    /// Decode a raw instruction word. Decoding never fails: encodings
    /// outside the supported set degrade to a no-op that advances PC.
    pub fn new(raw_inst: u32) -> Self {
        let opcode = decode::raw_to_opcode(raw_inst);
        let format = decode::opcode_to_format(opcode);
        let attributes = Attributes::default();
        let function = Function::default();
        let controls = Controls::default();

        let mut inst =
            Self { raw_inst, opcode, format, function, attributes, controls };

        decode::parse(&mut inst);
        inst
    }
}

/// rv32im opcode
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Opcode {
    Lui,
    AuiPc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    Op,
    OpImm,
    System,
    /// Anything else; executes as a plain PC advance
    Unknown,
}

/// rv32im instruction format
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
    Sys,
    None,
}

/// rv32im function (instruction?)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Function {
    LUI,
    AUIPC,
    JAL,
    JALR,
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    LB,
    LH,
    LW,
    LBU,
    LHU,
    SB,
    SH,
    SW,
    ADDI,
    SLTI,
    SLTIU,
    XORI,
    ORI,
    ANDI,
    SLLI,
    SRLI,
    SRAI,
    ADD,
    SUB,
    SLL,
    SLT,
    SLTU,
    XOR,
    SRL,
    SRA,
    OR,
    AND,
    MUL,
    MULH,
    MULHSU,
    MULHU,
    DIV,
    DIVU,
    REM,
    REMU,
    ECALL,
    EBREAK,
    /// Unrecognized encoding, executed as a no-op
    #[default]
    NOP,
}

/// Instruction attributes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attributes {
    // Take all you need
    pub opcode: Option<u32>,
    pub rs1: Option<u32>,
    pub rs2: Option<u32>,
    pub rd: Option<u32>,
    pub funct3: Option<u32>,
    pub funct7: Option<u32>,
    pub imm: Option<u32>,
}

/// Control signals
#[derive(Clone, Copy, Debug, Default)]
pub struct Controls {
    pub branch: bool,
    pub mem_read: bool,
    pub mem_write: bool,
    pub reg_write: bool,
    pub mem_step: u32,
    pub alu_op: ALUOp,
    pub alu_src: ALUSrc,
}
