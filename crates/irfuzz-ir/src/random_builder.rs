//! Randomness and value synthesis shared by all mutation strategies.

use crate::context::{Constant, Context};
use crate::instruction::Value;
use crate::operations::SourcePred;
use crate::program::{BasicBlock, InstRef, Module};
use irfuzz_core::Type;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;

/// Seeded source of random choices and new IR values.
///
/// One builder is created per mutation. Every random decision made while
/// mutating flows through its generator, so a seed replays the same edit.
pub struct RandomIrBuilder {
    rng: ChaCha8Rng,
    allowed_types: Vec<Type>,
}

impl RandomIrBuilder {
    pub fn new(seed: u64, allowed_types: Vec<Type>) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            allowed_types,
        }
    }

    pub fn allowed_types(&self) -> &[Type] {
        &self.allowed_types
    }

    /// Uniform draw from `range`, `None` if the range is empty
    pub fn uniform_draw(&mut self, range: Range<u64>) -> Option<u64> {
        (!range.is_empty()).then(|| self.rng.gen_range(range))
    }

    /// Uniform index into a collection of `len` elements
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    pub fn pick_allowed_type(&mut self) -> Option<Type> {
        self.allowed_types.choose(&mut self.rng).copied()
    }

    /// Index before which a new instruction may go. Never past the terminator.
    pub fn pick_insertion_point(&mut self, block: &BasicBlock) -> Option<usize> {
        self.choose_index(block.len())
    }

    /// A value of type `ty` visible right before `at`
    pub fn pick_visible_value(&mut self, module: &Module, at: InstRef, ty: Type) -> Option<Value> {
        let candidates: Vec<Value> = module
            .visible_values(at.function, at.block, at.index)
            .into_iter()
            .filter(|(_, t)| *t == ty)
            .map(|(value, _)| value)
            .collect();
        self.choose(&candidates).copied()
    }

    /// Create a new value of type `ty`: an interesting constant or `undef`
    pub fn materialize_value(&mut self, context: &Context, ty: Type) -> Option<Value> {
        if ty.is_void() || !ty.is_valid() {
            return None;
        }
        let constants = interesting_constants(ty, &mut self.rng);
        // One extra slot for undef
        let pick = self.rng.gen_range(0..=constants.len());
        Some(match constants.get(pick) {
            Some(constant) => Value::Const(context.intern(*constant)),
            None => Value::Undef(ty),
        })
    }

    /// Pick a visible value satisfying `pred`, creating a new one if none is
    /// visible. Returns `None` if no value of a suitable type can be made.
    pub fn find_or_create_source(
        &mut self,
        module: &Module,
        at: InstRef,
        current: &[Type],
        pred: SourcePred,
    ) -> Option<(Value, Type)> {
        let candidates: Vec<(Value, Type)> = module
            .visible_values(at.function, at.block, at.index)
            .into_iter()
            .filter(|(_, ty)| pred.matches(current, *ty))
            .collect();
        if let Some(source) = self.choose(&candidates) {
            return Some(*source);
        }
        self.new_source(module.context(), current, pred)
    }

    pub fn new_source(
        &mut self,
        context: &Context,
        current: &[Type],
        pred: SourcePred,
    ) -> Option<(Value, Type)> {
        let ty = match pred {
            SourcePred::AnyType => self.pick_allowed_type()?,
            _ => {
                let types = pred.make_types(current, &self.allowed_types);
                *self.choose(&types)?
            }
        };
        self.materialize_value(context, ty).map(|value| (value, ty))
    }

    /// Make a later instruction of the block use `value` in place of one of
    /// its operands of the same type. Returns false if no operand fits.
    pub fn connect_to_sink(&mut self, module: &mut Module, at: InstRef, value: Value, ty: Type) -> bool {
        let Some(block) = module
            .get_function(at.function)
            .and_then(|f| f.get_block(at.block))
        else {
            return false;
        };

        let mut sinks = Vec::new();
        for (index, inst) in block.instructions.iter().enumerate().skip(at.index) {
            for (slot, operand) in inst.operands.iter().enumerate() {
                if *operand != value && module.value_type(at.function, operand) == Some(ty) {
                    sinks.push((index, slot));
                }
            }
        }

        let Some(&(index, slot)) = self.choose(&sinks) else {
            return false;
        };
        if let Some(block) = module
            .get_function_mut(at.function)
            .and_then(|f| f.get_block_mut(at.block))
        {
            block.instructions[index].operands[slot] = value;
        }
        true
    }
}

/// Boundary values worth feeding a compiler, plus one random value
fn interesting_constants(ty: Type, rng: &mut ChaCha8Rng) -> Vec<Constant> {
    match ty {
        Type::Int(bits) if ty.is_valid() => {
            let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
            vec![
                Constant::int(bits, 0),
                Constant::int(bits, 1),
                Constant::int(bits, mask),
                Constant::int(bits, mask >> 1),
                Constant::int(bits, 1u64 << (bits - 1)),
                Constant::int(bits, 1u64 << (bits / 2)),
                Constant::int(bits, rng.gen::<u64>()),
            ]
        }
        Type::Float => vec![
            Constant::float(0.0),
            Constant::float(-0.0),
            Constant::float(1.0),
            Constant::float(f32::MAX),
            Constant::float(f32::MIN_POSITIVE),
            Constant::float(f32::INFINITY),
            Constant::float(f32::NAN),
        ],
        Type::Double => vec![
            Constant::double(0.0),
            Constant::double(-0.0),
            Constant::double(1.0),
            Constant::double(f64::MAX),
            Constant::double(f64::MIN_POSITIVE),
            Constant::double(f64::INFINITY),
            Constant::double(f64::NAN),
        ],
        Type::Ptr => vec![Constant::NullPtr],
        _ => Vec::new(),
    }
}
