//! Runs the same snapshot under both replacement policies and reports

use std::path::{Path, PathBuf};

use crate::cache::{CacheStats, ReplacementPolicy};
use crate::cpu::RunPolicy;
use crate::emulator::{Emulator, RunOutcome};
use crate::error::{MemoryError, SimulatorResult};
use crate::snapshot::{self, Snapshot, REGISTER_COUNT};

/// Output window request: file path, start address, byte count
pub struct OutputSpec {
    pub path: PathBuf,
    pub start_addr: u32,
    pub size: u32,
}

/// Load the snapshot, simulate it under LRU and under tree-pLRU on
/// independent emulators, print the comparison table, and optionally
/// write the LRU run's final state to an output snapshot.
pub fn run(input: &Path, output: Option<&OutputSpec>, verbose: bool) -> SimulatorResult<()> {
    let snapshot = Snapshot::load(input)?;

    let lru = run_policy(&snapshot, ReplacementPolicy::Lru, verbose)?;
    let plru = run_policy(&snapshot, ReplacementPolicy::TreePlru, verbose)?;

    print_report(&lru.cache.stats, &plru.cache.stats);

    // The pLRU run is for statistics only; its final memory is discarded
    if let Some(spec) = output {
        write_output(spec, &lru)?;
    }
    Ok(())
}

/// One full emulation with a fixed victim-selection policy
fn run_policy(
    snapshot: &Snapshot,
    replacement: ReplacementPolicy,
    verbose: bool,
) -> SimulatorResult<Emulator> {
    let policy = RunPolicy { verbose, replacement, ..Default::default() };
    let mut emulator = Emulator::make(policy);
    emulator.load(snapshot)?;

    if let RunOutcome::Runaway = emulator.run()? {
        eprintln!(
            "Warning: reached max instruction limit ({})",
            policy.max_instructions
        );
        eprintln!(
            "PC = {:#x}, initial_ra = {:#x}",
            emulator.cpu.pc.read(),
            emulator.cpu.initial_ra
        );
    }
    Ok(emulator)
}

/// Write the final registers, PC, and requested memory window
fn write_output(spec: &OutputSpec, emulator: &Emulator) -> SimulatorResult<()> {
    let mut window = Vec::with_capacity(spec.size as usize);
    for i in 0..spec.size {
        let address = spec
            .start_addr
            .checked_add(i)
            .ok_or(MemoryError::OutOfRange { address: spec.start_addr })?;
        window.push(emulator.cache.memory.read_byte(address)?);
    }

    let mut regs = [0u32; REGISTER_COUNT];
    for (i, reg) in emulator.cpu.gpr.iter().enumerate() {
        regs[i] = reg.read();
    }

    snapshot::write(
        &spec.path,
        emulator.cpu.pc.read(),
        &regs,
        spec.start_addr,
        &window,
    )?;
    Ok(())
}

/// Print the two-policy comparison table on stdout
fn print_report(lru: &CacheStats, plru: &CacheStats) {
    println!(
        "| replacement | hit_rate | instr_hit_rate | data_hit_rate | instr_access | instr_hit | data_access | data_hit |"
    );
    println!(
        "| :---------- | :-----: | -------------: | ------------: | -----------: | ---------: | ----------: | --------: |"
    );
    print_row("LRU", lru);
    print_row("bpLRU", plru);
}

fn print_row(name: &str, stats: &CacheStats) {
    if stats.total_access() == 0 {
        println!(
            "| {} | nan% | nan% | nan% | {:12} | {:12} | {:12} | {:12} |",
            name, 0, 0, 0, 0
        );
        return;
    }
    println!(
        "| {} | {:3.4}% | {:3.4}% | {:3.4}% | {:12} | {:12} | {:12} | {:12} |",
        name,
        stats.total_hit_rate().unwrap_or(0.0),
        stats.instr_hit_rate().unwrap_or(0.0),
        stats.data_hit_rate().unwrap_or(0.0),
        stats.instr_access,
        stats.instr_hit,
        stats.data_access(),
        stats.data_hit(),
    );
}

/// Numeric literal in the usual C notations: decimal, `0x` hex,
/// or octal with a leading zero
pub fn parse_u32_literal(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u32::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}
