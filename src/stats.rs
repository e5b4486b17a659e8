// This module implements the instruction counting pass. It visits every function of a
// module in declaration order, greets each one through the log facade, and records the
// number of instructions in every block, the number of instructions per opcode, and the
// module-wide total. Declarations are listed with zero blocks. The Display implementation
// renders a summary followed by an opcode table sorted by descending count.

//! Instruction statistics.

use std::fmt;

use hashbrown::HashMap;

use crate::ir::Module;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionStats {
    pub name: String,
    /// `(block name, instruction count)` in block order.
    pub blocks: Vec<(String, usize)>,
    pub instructions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleStats {
    pub module: String,
    pub functions: Vec<FunctionStats>,
    pub opcode_counts: HashMap<&'static str, usize>,
    pub total: usize,
}

impl ModuleStats {
    /// Opcode counts, most frequent first, ties by mnemonic.
    pub fn sorted_opcodes(&self) -> Vec<(&'static str, usize)> {
        let mut sorted: Vec<_> = self.opcode_counts.iter().map(|(k, v)| (*k, *v)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        sorted
    }
}

/// Count instructions per block and per opcode.
pub fn count_instructions(module: &Module) -> ModuleStats {
    let mut stats = ModuleStats {
        module: module.name().to_string(),
        ..Default::default()
    };

    for (_, func) in module.functions() {
        log::info!("Hello: {}", func.name());

        let mut func_stats = FunctionStats {
            name: func.name().to_string(),
            ..Default::default()
        };
        for (_, block) in func.blocks() {
            for &id in block.insts() {
                if let Some(data) = func.inst(id) {
                    *stats.opcode_counts.entry(data.inst.opcode().name()).or_insert(0) += 1;
                }
            }
            func_stats.blocks.push((block.name().to_string(), block.len()));
            func_stats.instructions += block.len();
        }

        stats.total += func_stats.instructions;
        stats.functions.push(func_stats);
    }

    stats
}

impl fmt::Display for ModuleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instruction Statistics for '{}':", self.module)?;
        for func in &self.functions {
            writeln!(
                f,
                "  @{}: {} block(s), {} instruction(s)",
                func.name,
                func.blocks.len(),
                func.instructions
            )?;
            for (block, count) in &func.blocks {
                writeln!(f, "    %{block}: {count}")?;
            }
        }

        if !self.opcode_counts.is_empty() {
            writeln!(f, "  Opcode breakdown:")?;
            for (opcode, count) in self.sorted_opcodes() {
                writeln!(f, "    {opcode:<8}{count:>6}")?;
            }
        }
        writeln!(f, "  Total instructions: {}", self.total)
    }
}
