//! Textual rendering of modules.
//!
//! The output is LLVM-flavoured and is also the persisted form of a module:
//! [`write_module`] stores it and [`super::parse_module`] reads it back.
//! Anonymous values are numbered `%0`, `%1`, ... in block order. Dangling
//! handles are rendered as `<bad ...>` instead of failing, so a malformed
//! module can still be printed next to its diagnostics.

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::path::Path;

use hashbrown::HashMap;

use super::parser::is_name_char;
use super::{BlockId, Function, InstId, Instruction, Module, Type, Value};

/// Write the text form of `module` to `path`.
pub fn write_module(module: &Module, path: impl AsRef<Path>) -> std::io::Result<()> {
    let path = path.as_ref();
    log::debug!("writing module '{}' to {}", module.name(), path.display());
    std::fs::write(path, module.to_string())
}

/// A name as it appears after `%`, `@` or before a label's `:`. Names the
/// lexer would split or misread are wrapped in double quotes.
fn quoted(name: &str) -> Cow<'_, str> {
    let plain = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(is_name_char);
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{name}\""))
    }
}

struct FunctionPrinter<'f> {
    func: &'f Function,
    anonymous: HashMap<InstId, u32>,
}

impl<'f> FunctionPrinter<'f> {
    fn new(func: &'f Function) -> Self {
        let mut anonymous = HashMap::new();
        for (_, block) in func.blocks() {
            for &id in block.insts() {
                let data = &func.insts[id.index()];
                if data.inst.defines_value() && data.name.is_none() {
                    let slot = anonymous.len() as u32;
                    anonymous.insert(id, slot);
                }
            }
        }
        Self { func, anonymous }
    }

    fn value(&self, value: Value) -> String {
        match value {
            Value::Argument(idx) => match self.func.params.get(idx as usize) {
                Some(param) => format!("%{}", quoted(&param.name)),
                None => format!("<bad arg {idx}>"),
            },
            Value::Result(id) => match self.func.inst(id) {
                Some(data) => match (&data.name, self.anonymous.get(&id)) {
                    (Some(name), _) => format!("%{}", quoted(name)),
                    (None, Some(slot)) => format!("%{slot}"),
                    (None, None) => format!("<bad inst {}>", id.0),
                },
                None => format!("<bad inst {}>", id.0),
            },
            Value::Constant(c) => c.to_string(),
        }
    }

    fn ty(&self, value: Value) -> String {
        self.func
            .value_type(value)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    fn typed(&self, value: Value) -> String {
        format!("{} {}", self.ty(value), self.value(value))
    }

    fn label(&self, block: BlockId) -> String {
        match self.func.block(block) {
            Some(b) => format!("label %{}", quoted(b.name())),
            None => format!("label <bad block {}>", block.0),
        }
    }

    /// Operand type for two-operand instructions: the first operand whose
    /// type is known.
    fn pair_type(&self, lhs: Value, rhs: Value) -> Type {
        self.func
            .value_type(lhs)
            .or_else(|| self.func.value_type(rhs))
            .unwrap_or(Type::I32)
    }

    fn instruction(&self, id: InstId) -> String {
        let data = &self.func.insts[id.index()];
        let mut line = String::new();
        if data.inst.defines_value() {
            let _ = write!(line, "{} = ", self.value(Value::Result(id)));
        }

        let _ = match &data.inst {
            Instruction::Const(c) => write!(line, "const {} {}", c.ty(), c),
            Instruction::Binary { op, lhs, rhs } => write!(
                line,
                "{} {} {}, {}",
                op.mnemonic(),
                self.pair_type(*lhs, *rhs),
                self.value(*lhs),
                self.value(*rhs)
            ),
            Instruction::ICmp { pred, lhs, rhs } => write!(
                line,
                "icmp {} {} {}, {}",
                pred.mnemonic(),
                self.pair_type(*lhs, *rhs),
                self.value(*lhs),
                self.value(*rhs)
            ),
            Instruction::Call { callee, args, ret } => {
                let args: Vec<_> = args.iter().map(|a| self.typed(*a)).collect();
                write!(line, "call {} @{}({})", ret, quoted(callee), args.join(", "))
            }
            Instruction::CondBr {
                cond,
                then_dest,
                else_dest,
            } => write!(
                line,
                "br {}, {}, {}",
                self.typed(*cond),
                self.label(*then_dest),
                self.label(*else_dest)
            ),
            Instruction::Br { dest } => write!(line, "br {}", self.label(*dest)),
            Instruction::Ret { value } => write!(line, "ret {}", self.typed(*value)),
        };
        line
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self
            .params
            .iter()
            .map(|p| format!("{} %{}", p.ty, quoted(&p.name)))
            .collect();

        if self.is_declaration() {
            let name = quoted(&self.name);
            return writeln!(f, "declare {} @{}({})", self.ret, name, params.join(", "));
        }

        let name = quoted(&self.name);
        writeln!(f, "define {} @{}({}) {{", self.ret, name, params.join(", "))?;

        let printer = FunctionPrinter::new(self);

        // The entry block is printed first so the text form keeps it.
        let mut order: Vec<BlockId> = self.entry.into_iter().collect();
        order.extend(self.blocks().map(|(id, _)| id).filter(|id| Some(*id) != self.entry));

        for (pos, id) in order.into_iter().enumerate() {
            let Some(block) = self.block(id) else {
                continue;
            };
            if pos > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", quoted(block.name()))?;
            for &inst in block.insts() {
                writeln!(f, "  {}", printer.instruction(inst))?;
            }
        }

        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name())?;
        for (_, func) in self.functions() {
            writeln!(f)?;
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
