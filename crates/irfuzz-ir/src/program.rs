//! Program structure: modules, functions and basic blocks.

use crate::context::{Constant, Context};
use crate::dominance::DominatorTree;
use crate::instruction::{InstId, Instruction};
use irfuzz_core::Type;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::instruction::{BlockId, Value};

/// Position of an instruction inside a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstRef {
    pub function: usize,
    pub block: usize,
    pub index: usize,
}

/// A basic block is a sequence of instructions ending in exactly one terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|inst| inst.is_terminator())
    }

    /// Returns true if the block ends in a terminator and has no other
    pub fn is_well_terminated(&self) -> bool {
        match self.instructions.split_last() {
            Some((last, rest)) => {
                last.is_terminator() && rest.iter().all(|inst| !inst.is_terminator())
            }
            None => false,
        }
    }
}

/// A function contains multiple basic blocks. A function without blocks is
/// a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub blocks: Vec<BasicBlock>,
    #[serde(skip)]
    next_inst: u32,
    #[serde(skip)]
    next_block: u32,
}

impl Function {
    /// Create a function with a single empty entry block
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        let mut func = Self::declaration(name, params, ret);
        func.add_block();
        func
    }

    pub fn declaration(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            blocks: Vec::new(),
            next_inst: 0,
            next_block: 0,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a new empty block
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn get_block(&self, index: usize) -> Option<&BasicBlock> {
        self.blocks.get(index)
    }

    pub fn get_block_mut(&mut self, index: usize) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(index)
    }

    /// Append `inst` to a block, assigning it a fresh id
    pub fn push_instruction(&mut self, block: usize, inst: Instruction) -> InstId {
        let index = self.blocks[block].len();
        self.insert_instruction(block, index, inst)
    }

    /// Insert `inst` before position `index` of a block, assigning it a fresh id
    pub fn insert_instruction(&mut self, block: usize, index: usize, mut inst: Instruction) -> InstId {
        let id = InstId(self.next_inst);
        self.next_inst += 1;
        inst.id = id;
        self.blocks[block].instructions.insert(index, inst);
        id
    }

    pub fn remove_instruction(&mut self, block: usize, index: usize) -> Instruction {
        self.blocks[block].instructions.remove(index)
    }

    /// Locate an instruction by id, returning `(block, index)`
    pub fn find_instruction(&self, id: InstId) -> Option<(usize, usize)> {
        self.blocks.iter().enumerate().find_map(|(b, block)| {
            block
                .instructions
                .iter()
                .position(|inst| inst.id == id)
                .map(|i| (b, i))
        })
    }

    pub fn instruction(&self, id: InstId) -> Option<&Instruction> {
        self.find_instruction(id)
            .map(|(b, i)| &self.blocks[b].instructions[i])
    }

    /// Rewrite every operand equal to `old` into `new`, returning the number of rewrites
    pub fn replace_all_uses(&mut self, old: Value, new: Value) -> usize {
        let mut count = 0;
        for operand in self
            .blocks
            .iter_mut()
            .flat_map(|b| b.instructions.iter_mut())
            .flat_map(|inst| inst.operands.iter_mut())
        {
            if *operand == old {
                *operand = new;
                count += 1;
            }
        }
        count
    }

    /// Recompute the id counters from the current contents. Needed after
    /// deserialization, which does not carry them.
    pub fn reindex(&mut self) {
        self.next_block = self.blocks.iter().map(|b| b.id.0.saturating_add(1)).max().unwrap_or(0);
        self.next_inst = self
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .map(|inst| inst.id.0.saturating_add(1))
            .max()
            .unwrap_or(0);
    }

    /// Count total instructions in the function
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }
}

/// A module-level variable. Its value is its (pointer-typed) address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
}

/// A complete program unit
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    context: Arc<Context>,
}

impl Module {
    pub fn new(name: impl Into<String>, context: Arc<Context>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
            context,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn add_function(&mut self, function: Function) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn add_global(&mut self, name: impl Into<String>) -> Value {
        self.globals.push(Global { name: name.into() });
        Value::Global((self.globals.len() - 1) as u32)
    }

    pub fn get_function(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    pub fn get_function_mut(&mut self, index: usize) -> Option<&mut Function> {
        self.functions.get_mut(index)
    }

    /// Count total instructions in the module
    pub fn total_instructions(&self) -> usize {
        self.functions.iter().map(|f| f.instruction_count()).sum()
    }

    /// Intern a constant in this module's context
    pub fn constant(&self, constant: Constant) -> Value {
        Value::Const(self.context.intern(constant))
    }

    pub fn instruction(&self, at: InstRef) -> Option<&Instruction> {
        self.functions
            .get(at.function)?
            .blocks
            .get(at.block)?
            .instructions
            .get(at.index)
    }

    pub fn instruction_mut(&mut self, at: InstRef) -> Option<&mut Instruction> {
        self.functions
            .get_mut(at.function)?
            .blocks
            .get_mut(at.block)?
            .instructions
            .get_mut(at.index)
    }

    /// Type of `value` as seen from inside function `function`
    pub fn value_type(&self, function: usize, value: &Value) -> Option<Type> {
        match value {
            Value::Inst(id) => self.functions.get(function)?.instruction(*id).map(|i| i.ty),
            Value::Arg(index) => self.functions.get(function)?.params.get(*index as usize).copied(),
            Value::Global(index) => self.globals.get(*index as usize).map(|_| Type::Ptr),
            Value::Const(id) => self.context.constant(*id).map(|c| c.ty()),
            Value::Undef(ty) => Some(*ty),
        }
    }

    /// All non-constant values visible right before position `index` of a
    /// block: arguments, globals, results of instructions in strictly
    /// dominating blocks, and results of earlier instructions in the block.
    pub fn visible_values(&self, function: usize, block: usize, index: usize) -> Vec<(Value, Type)> {
        let Some(func) = self.functions.get(function) else {
            return Vec::new();
        };
        let dom = DominatorTree::compute(func);

        let mut values: Vec<(Value, Type)> = func
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| (Value::Arg(i as u32), *ty))
            .collect();
        values.extend((0..self.globals.len()).map(|g| (Value::Global(g as u32), Type::Ptr)));

        for (b, bb) in func.blocks.iter().enumerate() {
            let limit = if b == block {
                index.min(bb.len())
            } else if dom.strictly_dominates(b, block) {
                bb.len()
            } else {
                continue;
            };
            values.extend(
                bb.instructions[..limit]
                    .iter()
                    .filter(|inst| inst.has_result())
                    .map(|inst| (Value::Inst(inst.id), inst.ty)),
            );
        }
        values
    }
}
