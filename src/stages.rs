//! Primitive implementation of the execution stages

use crate::alu::{alu, ALUSrc};
use crate::cache::{AccessType, Cache};
use crate::cpu::CpuState;
use crate::error::CacheError;
use crate::instruction::{Function, Instruction};

/// IF: Fetch the instruction word through the cache
pub fn instruction_fetch(pc: u32, cache: &mut Cache) -> Result<u32, CacheError> {
    cache.access(pc, AccessType::Fetch, 4, 0)
}

/// ID: Instruction decode
pub fn instruction_decode(raw_inst: u32) -> Instruction {
    Instruction::new(raw_inst)
}

/// ID: Register read
pub fn register_read(inst: &Instruction, cpu: &CpuState) -> (i32, i32) {
    let rs1 = cpu.gpr[inst.attributes.rs1.unwrap_or(0) as usize].read() as i32;
    let rs2 = cpu.gpr[inst.attributes.rs2.unwrap_or(0) as usize].read() as i32;
    (rs1, rs2)
}

/// EX: Compute stuff
pub fn execute(cpu: &mut CpuState, inst: &Instruction, op1: i32, op2: i32) -> i32 {
    use ALUSrc::*;
    let op2 = match inst.controls.alu_src {
        REG => op2,
        IMM => inst.attributes.imm.unwrap_or(0) as i32,
    };
    if cpu.policy.verbose {
        eprintln!("[VERBOSE] Executing: {:?}", inst.function);
        eprintln!("[VERBOSE] op1: {:#010x}; op2: {:#010x}", op1, op2);
    }
    alu(inst, op1, op2)
}

/// MEM: Route loads and stores through the cache
pub fn memory_access(
    pc: u32,
    inst: &Instruction,
    cache: &mut Cache,
    exec_result: i32,
    op2: i32,
) -> Result<u32, CacheError> {
    let address = exec_result as u32;
    let mem_step = inst.controls.mem_step;

    if inst.controls.mem_write {
        cache.access(address, AccessType::Write, mem_step, op2 as u32)?;
    }

    let result = if inst.controls.mem_read {
        let loaded = cache.access(address, AccessType::Read, mem_step, 0)?;
        match inst.function {
            // LB and LH replicate the sign bit into the upper word
            Function::LB => loaded as u8 as i8 as i32 as u32,
            Function::LH => loaded as u16 as i16 as i32 as u32,
            _ => loaded,
        }
    } else {
        // Special cases: LUI, AUIPC, JAL, JALR
        let imm = inst.attributes.imm.unwrap_or(0) as i32;
        match inst.function {
            Function::LUI => imm as u32,
            Function::AUIPC => (pc as i32).wrapping_add(imm) as u32,
            Function::JAL | Function::JALR => pc.wrapping_add(4),
            _ => exec_result as u32,
        }
    };
    Ok(result)
}

/// WB: Write stuff back to the selected register
pub fn write_back(inst: &Instruction, cpu: &mut CpuState, wb_result: u32) {
    // If you need to write
    if inst.controls.reg_write {
        let rd = inst.attributes.rd.unwrap_or(0) as usize;
        // You don't write to x0
        if rd != 0 {
            cpu.gpr[rd].write(wb_result);
        }
    }
}
