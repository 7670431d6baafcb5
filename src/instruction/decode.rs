//! Decoding helper functions

use super::Attributes;
use super::Controls;
use super::Format;
use super::Function;
use super::Instruction;
use super::Opcode;

/// Extracts the sign-extended immediate from an instruction
fn get_imm_sign_extended(inst: &Instruction) -> Option<u32> {
    let shamt = match inst.opcode {
        Opcode::Lui | Opcode::AuiPc => 0,
        Opcode::Jal => 11,
        Opcode::Branch => 19,
        _ => 20,
    };

    inst.attributes.imm.map(|v| (((v as i32) << shamt) >> shamt) as u32)
}

/// Determines an instruction's mnemonic, e.g., JAL, XOR, or MULH.
/// Unsupported encodings map to NOP, which executes as a plain PC advance.
fn get_function(inst: &Instruction) -> Function {
    use Function::*;
    use Opcode::*;

    match inst.opcode {
        Lui => return LUI,
        AuiPc => return AUIPC,
        Jal => return JAL,
        Jalr => return JALR,
        System => {
            // EBREAK carries imm12 = 1, ECALL imm12 = 0
            return if inst.attributes.imm == Some(1) { EBREAK } else { ECALL };
        }
        Unknown => return NOP,
        _ => {}
    }

    let funct3 = match inst.attributes.funct3 {
        Some(funct3) => funct3,
        None => return NOP,
    };
    let funct7 = inst.attributes.funct7.unwrap_or(0);
    let funct7_bit = (inst.raw_inst & 0x40000000) >> 30;

    match (inst.opcode, funct3, funct7, funct7_bit) {
        (Branch, 0b000, _, _) => BEQ,
        (Branch, 0b001, _, _) => BNE,
        (Branch, 0b100, _, _) => BLT,
        (Branch, 0b101, _, _) => BGE,
        (Branch, 0b110, _, _) => BLTU,
        (Branch, 0b111, _, _) => BGEU,
        (Load, 0b000, _, _) => LB,
        (Load, 0b001, _, _) => LH,
        (Load, 0b010, _, _) => LW,
        (Load, 0b100, _, _) => LBU,
        (Load, 0b101, _, _) => LHU,
        (Store, 0b000, _, _) => SB,
        (Store, 0b001, _, _) => SH,
        (Store, 0b010, _, _) => SW,
        (OpImm, 0b000, _, _) => ADDI,
        (OpImm, 0b010, _, _) => SLTI,
        (OpImm, 0b011, _, _) => SLTIU,
        (OpImm, 0b100, _, _) => XORI,
        (OpImm, 0b110, _, _) => ORI,
        (OpImm, 0b111, _, _) => ANDI,
        (OpImm, 0b001, _, _) => SLLI,
        (OpImm, 0b101, _, 0b0) => SRLI,
        (OpImm, 0b101, _, 0b1) => SRAI,
        (Op, 0b000, 0x00, _) => ADD,
        (Op, 0b000, 0x20, _) => SUB,
        (Op, 0b001, 0x00, _) => SLL,
        (Op, 0b010, 0x00, _) => SLT,
        (Op, 0b011, 0x00, _) => SLTU,
        (Op, 0b100, 0x00, _) => XOR,
        (Op, 0b101, 0x00, _) => SRL,
        (Op, 0b101, 0x20, _) => SRA,
        (Op, 0b110, 0x00, _) => OR,
        (Op, 0b111, 0x00, _) => AND,
        (Op, 0b000, 0x01, _) => MUL,
        (Op, 0b001, 0x01, _) => MULH,
        (Op, 0b010, 0x01, _) => MULHSU,
        (Op, 0b011, 0x01, _) => MULHU,
        (Op, 0b100, 0x01, _) => DIV,
        (Op, 0b101, 0x01, _) => DIVU,
        (Op, 0b110, 0x01, _) => REM,
        (Op, 0b111, 0x01, _) => REMU,
        _ => NOP,
    }
}

pub fn get_controls(inst: &Instruction) -> Controls {
    use Function::*;
    use Opcode::*;

    use crate::alu::ALUOp;
    use crate::alu::ALUSrc;

    // Unsupported encodings must not touch registers or memory
    if matches!(inst.function, NOP | ECALL | EBREAK) {
        return Controls::default();
    }

    Controls {
        branch: matches!(inst.opcode, Branch | Jal | Jalr),
        mem_read: matches!(inst.opcode, Opcode::Load),
        mem_write: matches!(inst.opcode, Opcode::Store),
        reg_write: !matches!(inst.opcode, Branch | Store),
        mem_step: match inst.function {
            LB | LBU | SB => 1,
            LH | LHU | SH => 2,
            LW | SW => 4,
            _ => 0,
        },
        alu_op: match inst.function {
            LUI | AUIPC => ALUOp::ADD,
            JAL => ALUOp::BEQ,
            JALR => ALUOp::ADD,
            BEQ => ALUOp::BEQ,
            BNE => ALUOp::BNE,
            BLT => ALUOp::BLT,
            BGE => ALUOp::BGE,
            BLTU => ALUOp::BLTU,
            BGEU => ALUOp::BGEU,
            LB | LH | LW | LBU | LHU | SB | SH | SW => ALUOp::ADD,
            ADDI => ALUOp::ADD,
            SLTI => ALUOp::SLT,
            SLTIU => ALUOp::SLTU,
            XORI => ALUOp::XOR,
            ORI => ALUOp::OR,
            ANDI => ALUOp::AND,
            SLLI => ALUOp::SLL,
            SRLI => ALUOp::SRL,
            SRAI => ALUOp::SRA,
            ADD => ALUOp::ADD,
            SUB => ALUOp::SUB,
            SLL => ALUOp::SLL,
            SLT => ALUOp::SLT,
            SLTU => ALUOp::SLTU,
            XOR => ALUOp::XOR,
            SRL => ALUOp::SRL,
            SRA => ALUOp::SRA,
            OR => ALUOp::OR,
            AND => ALUOp::AND,
            MUL => ALUOp::MUL,
            MULH => ALUOp::MULH,
            MULHSU => ALUOp::MULHSU,
            MULHU => ALUOp::MULHU,
            DIV => ALUOp::DIV,
            DIVU => ALUOp::DIVU,
            REM => ALUOp::REM,
            REMU => ALUOp::REMU,
            ECALL | EBREAK | NOP => ALUOp::default(),
        },
        alu_src: match inst.opcode {
            Branch | Op | Jal => ALUSrc::REG,
            _ => ALUSrc::IMM,
        },
    }
}

/// Returns the opcode from a raw instruction
pub fn raw_to_opcode(raw_inst: u32) -> Opcode {
    let opcode = raw_inst & 0x7f_u32;
    match opcode {
        0x37 => Opcode::Lui,
        0x17 => Opcode::AuiPc,
        0x6f => Opcode::Jal,
        0x67 => Opcode::Jalr,
        0x63 => Opcode::Branch,
        0x03 => Opcode::Load,
        0x23 => Opcode::Store,
        0x33 => Opcode::Op,
        0x13 => Opcode::OpImm,
        0x73 => Opcode::System,
        _ => Opcode::Unknown,
    }
}

/// Returns the instruction format from an opcode
pub fn opcode_to_format(opcode: Opcode) -> Format {
    match opcode {
        Opcode::Lui => Format::U,
        Opcode::AuiPc => Format::U,
        Opcode::Jal => Format::J,
        Opcode::Jalr => Format::I,
        Opcode::Branch => Format::B,
        Opcode::Load => Format::I,
        Opcode::Store => Format::S,
        Opcode::Op => Format::R,
        Opcode::OpImm => Format::I,
        Opcode::System => Format::Sys,
        Opcode::Unknown => Format::None,
    }
}

/// Parses other stuff
pub fn parse(inst: &mut Instruction) {
    inst.attributes = match inst.format {
        Format::R => parse_format_r(inst.raw_inst),
        Format::I => parse_format_i(inst.raw_inst),
        Format::S => parse_format_s(inst.raw_inst),
        Format::B => parse_format_b(inst.raw_inst),
        Format::U => parse_format_u(inst.raw_inst),
        Format::J => parse_format_j(inst.raw_inst),
        Format::Sys => parse_format_sys(inst.raw_inst),
        Format::None => Attributes::default(),
    };
    inst.attributes.imm = get_imm_sign_extended(inst);
    inst.function = get_function(inst);
    inst.controls = get_controls(inst);
}

/// Parses attributes for an R-type instruction
fn parse_format_r(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: Some(get_rd(raw_inst)),
        funct3: Some(get_funct3(raw_inst)),
        funct7: Some(get_funct7(raw_inst)),
        imm: None,
    }
}

/// Parses attributes for an I-type instruction
fn parse_format_i(raw_inst: u32) -> Attributes {
    fn is_i_star(attributes: &Attributes) -> bool {
        attributes.opcode == Some(0x13)
            && (attributes.funct3 == Some(0b001)
                || attributes.funct3 == Some(0b101))
    }

    let mut attributes = Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: None,
        rd: Some(get_rd(raw_inst)),
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: None, // TBD
    };
    if !is_i_star(&attributes) {
        // I
        attributes.imm = Some((raw_inst & 0xfff00000) >> 20)
    } else {
        // I*
        // The shift amount happens to be the same as rs2
        attributes.imm = Some(get_rs2(raw_inst));
    }
    attributes
}

/// Parses attributes for an S-type instruction
fn parse_format_s(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: None,
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: Some(((raw_inst & 0xfe000000) >> 20) | ((raw_inst & 0xf80) >> 7)),
    }
}

/// Parses attributes for a B-type instruction
fn parse_format_b(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: Some(get_rs1(raw_inst)),
        rs2: Some(get_rs2(raw_inst)),
        rd: None,
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: Some(
            ((raw_inst & 0x80000000) >> 19)
                | ((raw_inst & 0x80) << 4)
                | ((raw_inst & 0x7e000000) >> 20)
                | ((raw_inst & 0xf00) >> 7),
        ),
    }
}

/// Parses attributes for a U-type instruction
fn parse_format_u(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: None,
        rs2: None,
        rd: Some(get_rd(raw_inst)),
        funct3: None,
        funct7: None,
        imm: Some(raw_inst & 0xfffff000),
    }
}

/// Parses attributes for a J-type instruction
fn parse_format_j(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: None,
        rs2: None,
        rd: Some(get_rd(raw_inst)),
        funct3: None,
        funct7: None,
        imm: Some(
            ((raw_inst & 0x80000000) >> 11)
                | (raw_inst & 0xff000)
                | ((raw_inst & 0x100000) >> 9)
                | ((raw_inst & 0x7fe00000) >> 20),
        ),
    }
}

/// Parses attributes for a System instruction
fn parse_format_sys(raw_inst: u32) -> Attributes {
    Attributes {
        opcode: Some(get_opcode(raw_inst)),
        rs1: None,
        rs2: None,
        rd: None,
        funct3: Some(get_funct3(raw_inst)),
        funct7: None,
        imm: Some((raw_inst & 0xfff00000) >> 20),
    }
}

/// Extracts opcode from a raw instruction
fn get_opcode(raw_inst: u32) -> u32 {
    raw_inst & 0x7f
}

/// Extracts funct3 from a raw instruction
fn get_funct3(raw_inst: u32) -> u32 {
    (raw_inst >> 12) & 0x7
}

/// Extracts the rs1 field from a raw instruction
fn get_rs1(raw_inst: u32) -> u32 {
    (raw_inst >> 15) & 0x1f
}

/// Extracts the rs2 field from a raw instruction
fn get_rs2(raw_inst: u32) -> u32 {
    (raw_inst >> 20) & 0x1f
}

/// Extracts the rd field from a raw instruction
fn get_rd(raw_inst: u32) -> u32 {
    (raw_inst >> 7) & 0x1f
}

/// Extracts the funct7 field from a raw instruction
fn get_funct7(raw_inst: u32) -> u32 {
    (raw_inst >> 25) & 0x7f
}
