//! Single-cycle emulator coupling the CPU with the cache

use crate::cache::Cache;
use crate::cpu::CpuState;
use crate::cpu::RunPolicy;
use crate::error::{MemoryError, SimulatorError, SimulatorResult};
use crate::instruction::Opcode;
use crate::memory::Memory;
use crate::snapshot::Snapshot;
use crate::stages::*;

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// PC reached the initial return address, or ECALL/EBREAK executed
    Halted,
    /// The instruction cap was reached
    Runaway,
}

enum StepResult {
    Continue,
    Halt,
}

/// One emulator instance: register state plus the cache, which in turn
/// owns the backing memory for the duration of the run
pub struct Emulator {
    pub cpu: CpuState,
    pub cache: Cache,
}

impl Emulator {
    pub fn make(policy: RunPolicy) -> Self {
        Self {
            cpu: CpuState::make(policy),
            cache: Cache::make(policy.replacement, Memory::make()),
        }
    }

    /// Seed PC, registers, and memory from a parsed snapshot.
    /// The loaded x1 becomes the halting return address.
    pub fn load(&mut self, snapshot: &Snapshot) -> Result<(), MemoryError> {
        self.cpu.pc.write(snapshot.pc);
        for (i, value) in snapshot.regs.iter().enumerate().skip(1) {
            self.cpu.gpr[i].write(*value);
        }
        self.cpu.initial_ra = snapshot.regs[1];

        for fragment in &snapshot.fragments {
            for (i, byte) in fragment.bytes.iter().enumerate() {
                let address = fragment
                    .addr
                    .checked_add(i as u32)
                    .ok_or(MemoryError::OutOfRange { address: fragment.addr })?;
                self.cache.memory.write_byte(address, *byte)?;
            }
        }
        Ok(())
    }

    /// Execute one instruction
    fn step(&mut self) -> SimulatorResult<StepResult> {
        let pc = self.cpu.pc.read();
        if self.cpu.policy.verbose {
            eprintln!("[VERBOSE] PC: {:#010x}", pc);
        }

        // IF
        let raw_inst = instruction_fetch(pc, &mut self.cache)
            .map_err(|source| SimulatorError::Fault { pc, source })?;
        // ID
        let inst = instruction_decode(raw_inst);
        self.cpu.update_inst_count(1);

        // ECALL and EBREAK halt on the spot, before any PC update
        if inst.opcode == Opcode::System {
            return Ok(StepResult::Halt);
        }

        self.cpu.pc.write(pc.wrapping_add(4));

        let (rs1, rs2) = register_read(&inst, &self.cpu);
        // EX
        let exec_result = execute(&mut self.cpu, &inst, rs1, rs2);
        // MEM
        let wb_result = memory_access(pc, &inst, &mut self.cache, exec_result, rs2)
            .map_err(|source| SimulatorError::Fault { pc, source })?;
        // WB
        write_back(&inst, &mut self.cpu, wb_result);

        // Update PC on branch (branch ALU ops evaluate to zero when taken)
        if inst.controls.branch
            && !(inst.opcode == Opcode::Branch && exec_result != 0)
        {
            let imm = inst.attributes.imm.unwrap_or(0) as i32;
            let new_pc = match inst.opcode {
                Opcode::Jalr => (exec_result as u32) & !1u32,
                _ => (pc as i32).wrapping_add(imm) as u32,
            };
            if self.cpu.policy.verbose {
                eprintln!(
                    "[VERBOSE] Branching from {:#010x} to: {:#010x}",
                    pc, new_pc
                );
            }
            self.cpu.pc.write(new_pc);
        }

        Ok(StepResult::Continue)
    }

    /// Run to completion, then flush dirty lines so the final memory
    /// image is consistent with the cache
    pub fn run(&mut self) -> SimulatorResult<RunOutcome> {
        let outcome = loop {
            if let StepResult::Halt = self.step()? {
                break RunOutcome::Halted;
            }
            if self.cpu.pc.read() == self.cpu.initial_ra {
                break RunOutcome::Halted;
            }
            if self.cpu.history.inst_count >= self.cpu.policy.max_instructions {
                break RunOutcome::Runaway;
            }
        };
        self.cache.flush()?;
        Ok(outcome)
    }
}
