//! In-memory SSA intermediate representation.
//!
//! A [`Module`] owns [`Function`]s, a function owns its [`Block`]s and an
//! arena of instructions, and a block lists the instructions it executes in
//! order. Everything refers to everything else through small `Copy` handles
//! ([`FuncId`], [`BlockId`], [`InstId`], [`Value`]) instead of pointers, so a
//! module can be built incrementally and then shared immutably by the
//! verifier and the interpreter.
//!
//! # Text form
//!
//! ```text
//! ; ModuleID = 'MySecondModule'
//!
//! define i32 @gcd(i32 %x, i32 %y) {
//! entry:
//!   %tmp = icmp eq i32 %x, %y
//!   br i1 %tmp, label %return, label %cond_false
//! ...
//! }
//! ```

use hashbrown::{HashMap, HashSet};

use crate::error::{BuildError, BuildResult};

pub mod builder;
pub mod instruction;
pub mod parser;
pub mod printer;
pub mod types;

pub use builder::Builder;
pub use instruction::{BinaryOp, Instruction, IntPredicate, OpInfo, Opcode};
pub use parser::parse_module;
pub use printer::write_module;
pub use types::{IntConst, Type};

/// Handle to a function within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub u32);

/// Handle to a block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

/// Handle to an instruction within its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An operand: a function argument, the result of an instruction, or an
/// immediate constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Argument(u32),
    Result(InstId),
    Constant(IntConst),
}

impl Value {
    pub fn i32(value: i32) -> Self {
        Value::Constant(IntConst::i32(value))
    }

    pub fn bool(value: bool) -> Self {
        Value::Constant(IntConst::bool(value))
    }

    pub fn constant(ty: Type, value: i64) -> Self {
        Value::Constant(IntConst::new(ty, value))
    }
}

/// Formal parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A basic block: instruction handles in execution order.
#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    insts: Vec<InstId>,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

/// An instruction together with its display name and owning block.
#[derive(Debug, Clone)]
pub struct InstData {
    pub inst: Instruction,
    pub name: Option<String>,
    pub block: BlockId,
}

/// Characters that may appear in a name, quoted if need be.
fn is_printable_name_char(ch: char) -> bool {
    ch != '"' && !ch.is_control()
}

/// A function: signature, blocks and the instruction arena they index.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Param>,
    ret: Type,
    entry: Option<BlockId>,
    blocks: Vec<Block>,
    insts: Vec<InstData>,
    /// Names in use by parameters, blocks and values.
    used_names: HashSet<String>,
    /// Next numeric suffix to try for a base name.
    name_suffixes: HashMap<String, u32>,
}

impl Function {
    fn new(name: &str, params: &[(&str, Type)], ret: Type) -> Self {
        let mut func = Self {
            name: name.to_string(),
            params: Vec::with_capacity(params.len()),
            ret,
            entry: None,
            blocks: Vec::new(),
            insts: Vec::new(),
            used_names: HashSet::new(),
            name_suffixes: HashMap::new(),
        };
        for (idx, (param_name, ty)) in params.iter().enumerate() {
            let base = if param_name.is_empty() {
                format!("arg{idx}")
            } else {
                param_name.to_string()
            };
            let name = func.unique_name(&base).unwrap_or(base);
            func.params.push(Param { name, ty: *ty });
        }
        func
    }

    /// Reserve a name unique within the function. Clashes get a numeric
    /// suffix (`tmp`, `tmp1`, `tmp2`, ...). Empty names stay anonymous and
    /// names starting with a digit are prefixed so they cannot be confused
    /// with the printer's numbering of anonymous values. Quotes and control
    /// characters cannot be printed inside a quoted name and become `_`.
    fn unique_name(&mut self, base: &str) -> Option<String> {
        if base.is_empty() {
            return None;
        }
        let mut base: String = base
            .chars()
            .map(|c| if is_printable_name_char(c) { c } else { '_' })
            .collect();
        if base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert(0, '_');
        }

        if self.used_names.insert(base.clone()) {
            return Some(base);
        }

        let suffix = self.name_suffixes.entry(base.clone()).or_insert(1);
        loop {
            let candidate = format!("{base}{suffix}");
            *suffix += 1;
            if self.used_names.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Argument placeholder for parameter `index`.
    pub fn param(&self, index: usize) -> Option<Value> {
        (index < self.params.len()).then_some(Value::Argument(index as u32))
    }

    pub fn param_named(&self, name: &str) -> Option<Value> {
        self.params
            .iter()
            .position(|p| p.name == name)
            .map(|idx| Value::Argument(idx as u32))
    }

    pub fn return_type(&self) -> Type {
        self.ret
    }

    /// A function without blocks has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry
    }

    pub fn set_entry_block(&mut self, block: BlockId) -> BuildResult<()> {
        self.check_block(block)?;
        self.entry = Some(block);
        Ok(())
    }

    /// Append a new empty block. The first block becomes the entry block.
    pub fn add_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let base = if name.is_empty() {
            format!("bb{}", id.0)
        } else {
            name.to_string()
        };
        let name = self.unique_name(&base).unwrap_or(base);
        self.blocks.push(Block {
            name,
            insts: Vec::new(),
        });
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| (BlockId(idx as u32), block))
    }

    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(|idx| BlockId(idx as u32))
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn inst(&self, id: InstId) -> Option<&InstData> {
        self.insts.get(id.index())
    }

    /// Last instruction of a block, if it is a terminator.
    pub fn terminator(&self, block: BlockId) -> Option<&Instruction> {
        let last = *self.block(block)?.insts.last()?;
        let inst = &self.insts[last.index()].inst;
        inst.is_terminator().then_some(inst)
    }

    /// Successors named by the block's terminator.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(Instruction::successors)
            .unwrap_or_default()
    }

    /// Type of a value in the context of this function, if the value is valid.
    pub fn value_type(&self, value: Value) -> Option<Type> {
        match value {
            Value::Argument(idx) => self.params.get(idx as usize).map(|p| p.ty),
            Value::Result(id) => self.inst(id).and_then(|data| data.inst.result_type()),
            Value::Constant(c) => Some(c.ty()),
        }
    }

    /// Display name of an argument or instruction result.
    pub fn value_name(&self, value: Value) -> Option<&str> {
        match value {
            Value::Argument(idx) => self.params.get(idx as usize).map(|p| p.name.as_str()),
            Value::Result(id) => self.inst(id).and_then(|data| data.name.as_deref()),
            Value::Constant(_) => None,
        }
    }

    fn check_block(&self, block: BlockId) -> BuildResult<()> {
        if block.index() < self.blocks.len() {
            Ok(())
        } else {
            Err(BuildError::UnknownBlock {
                function: self.name.clone(),
                block: block.0,
            })
        }
    }

    fn alloc_inst(&mut self, inst: Instruction, name: &str, block: BlockId) -> InstId {
        let name = if inst.defines_value() {
            self.unique_name(name)
        } else {
            None
        };
        let id = InstId(self.insts.len() as u32);
        self.insts.push(InstData { inst, name, block });
        id
    }

    /// Append an instruction to the end of a block without any terminator
    /// check. The builder layers the checks on top.
    pub(crate) fn push_inst(
        &mut self,
        block: BlockId,
        inst: Instruction,
        name: &str,
    ) -> BuildResult<InstId> {
        self.check_block(block)?;
        let id = self.alloc_inst(inst, name, block);
        self.blocks[block.index()].insts.push(id);
        Ok(id)
    }

    /// Insert an instruction directly before `before`, in the same block.
    pub(crate) fn insert_inst_before(
        &mut self,
        before: InstId,
        inst: Instruction,
        name: &str,
    ) -> BuildResult<InstId> {
        let block = self
            .inst(before)
            .map(|data| data.block)
            .ok_or_else(|| BuildError::UnknownInstruction {
                function: self.name.clone(),
                inst: before.0,
            })?;
        let id = self.alloc_inst(inst, name, block);
        let insts = &mut self.blocks[block.index()].insts;
        let pos = insts
            .iter()
            .position(|&i| i == before)
            .unwrap_or(insts.len());
        insts.insert(pos, id);
        Ok(id)
    }
}

/// A named collection of functions with unique names.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    by_name: HashMap<String, FuncId>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            functions: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a function. It has no body until blocks are added.
    pub fn add_function(
        &mut self,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> BuildResult<FuncId> {
        if name.is_empty() || !name.chars().all(is_printable_name_char) {
            return Err(BuildError::InvalidName(name.to_string()));
        }
        if self.by_name.contains_key(name) {
            return Err(BuildError::DuplicateFunction(name.to_string()));
        }
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(Function::new(name, params, ret));
        self.by_name.insert(name.to_string(), id);
        log::debug!("declared function @{} in module '{}'", name, self.name);
        Ok(id)
    }

    /// Append a block to a function.
    pub fn create_block(&mut self, func: FuncId, name: &str) -> BuildResult<BlockId> {
        Ok(self.function_mut(func)?.add_block(name))
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn function_mut(&mut self, id: FuncId) -> BuildResult<&mut Function> {
        self.functions
            .get_mut(id.index())
            .ok_or(BuildError::UnknownFunction(id.0))
    }

    pub fn function_named(&self, name: &str) -> Option<&Function> {
        self.lookup(name).and_then(|id| self.function(id))
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .map(|(idx, func)| (FuncId(idx as u32), func))
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_function_rejected() {
        let mut module = Module::new("test");
        module.add_function("f", &[], Type::I32).unwrap();
        let err = module.add_function("f", &[], Type::I32).unwrap_err();
        assert_eq!(err, BuildError::DuplicateFunction("f".to_string()));
    }

    #[test]
    fn test_registry_lookup() {
        let mut module = Module::new("test");
        let f = module.add_function("f", &[("a", Type::I32)], Type::I32).unwrap();
        let g = module.add_function("g", &[], Type::I1).unwrap();

        assert_eq!(module.lookup("f"), Some(f));
        assert_eq!(module.lookup("g"), Some(g));
        assert_eq!(module.lookup("h"), None);
        assert_eq!(module.function_named("g").unwrap().return_type(), Type::I1);
        assert_eq!(module.functions().count(), 2);
    }

    #[test]
    fn test_first_block_is_entry() {
        let mut module = Module::new("test");
        let f = module.add_function("f", &[], Type::I32).unwrap();
        assert!(module.function(f).unwrap().is_declaration());

        let entry = module.create_block(f, "entry").unwrap();
        let other = module.create_block(f, "other").unwrap();
        let func = module.function(f).unwrap();
        assert_eq!(func.entry_block(), Some(entry));
        assert_ne!(entry, other);
        assert_eq!(func.block_by_name("other"), Some(other));
    }

    #[test]
    fn test_block_names_are_uniqued() {
        let mut module = Module::new("test");
        let f = module.add_function("f", &[("x", Type::I32)], Type::I32).unwrap();
        let a = module.create_block(f, "loop").unwrap();
        let b = module.create_block(f, "loop").unwrap();
        let c = module.create_block(f, "x").unwrap();
        let d = module.create_block(f, "").unwrap();
        let func = module.function(f).unwrap();
        assert_eq!(func.block(a).unwrap().name(), "loop");
        assert_eq!(func.block(b).unwrap().name(), "loop1");
        assert_eq!(func.block(c).unwrap().name(), "x1");
        assert_eq!(func.block(d).unwrap().name(), "bb3");
    }

    #[test]
    fn test_unprintable_names() {
        let mut module = Module::new("test");
        for bad in ["", "a\"b", "line\nbreak"] {
            let err = module.add_function(bad, &[], Type::I32).unwrap_err();
            assert_eq!(err, BuildError::InvalidName(bad.to_string()));
        }

        let f = module.add_function("f", &[("say \"hi\"", Type::I32)], Type::I32).unwrap();
        let block = module.create_block(f, "tab\there").unwrap();
        let func = module.function(f).unwrap();
        assert_eq!(func.params()[0].name, "say _hi_");
        assert_eq!(func.block(block).unwrap().name(), "tab_here");
    }

    #[test]
    fn test_params() {
        let mut module = Module::new("test");
        let f = module
            .add_function("f", &[("x", Type::I32), ("c", Type::I1)], Type::I32)
            .unwrap();
        let func = module.function(f).unwrap();
        assert_eq!(func.param(0), Some(Value::Argument(0)));
        assert_eq!(func.param(2), None);
        assert_eq!(func.param_named("c"), Some(Value::Argument(1)));
        assert_eq!(func.value_type(Value::Argument(1)), Some(Type::I1));
        assert_eq!(func.value_name(Value::Argument(0)), Some("x"));
        assert_eq!(func.value_type(Value::Argument(5)), None);
    }

    #[test]
    fn test_unknown_handles() {
        let mut module = Module::new("test");
        assert_eq!(
            module.create_block(FuncId(3), "entry").unwrap_err(),
            BuildError::UnknownFunction(3)
        );
        let f = module.add_function("f", &[], Type::I32).unwrap();
        let err = module
            .function_mut(f)
            .unwrap()
            .set_entry_block(BlockId(0))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownBlock { block: 0, .. }));
    }
}
