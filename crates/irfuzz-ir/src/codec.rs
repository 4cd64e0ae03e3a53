//! Fuzzer-friendly byte encoding for modules.
//!
//! Modules are encoded with bincode. Constants are written to a module-local
//! table in first-use order, so the bytes do not depend on the interning
//! history of the context the module lives in.

use crate::context::{ConstId, Constant, Context};
use crate::instruction::Value;
use crate::program::{Function, Global, Module};
use crate::validation::verify_module;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Encoding format version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModuleRecord {
    version: u32,
    name: String,
    constants: Vec<Constant>,
    globals: Vec<Global>,
    functions: Vec<Function>,
}

fn options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(limit)
}

fn map_constants<F>(functions: &mut [Function], mut f: F) -> Option<()>
where
    F: FnMut(ConstId) -> Option<ConstId>,
{
    for operand in functions
        .iter_mut()
        .flat_map(|func| func.blocks.iter_mut())
        .flat_map(|block| block.instructions.iter_mut())
        .flat_map(|inst| inst.operands.iter_mut())
    {
        if let Value::Const(id) = operand {
            *id = f(*id)?;
        }
    }
    Some(())
}

fn encode(module: &Module) -> Option<Vec<u8>> {
    let context = module.context();
    let mut constants = Vec::new();
    let mut local_ids: HashMap<ConstId, ConstId> = HashMap::new();
    let mut functions = module.functions.clone();

    map_constants(&mut functions, |id| {
        if let Some(local) = local_ids.get(&id) {
            return Some(*local);
        }
        let local = ConstId(constants.len() as u32);
        constants.push(context.constant(id)?);
        local_ids.insert(id, local);
        Some(local)
    })?;

    let record = ModuleRecord {
        version: FORMAT_VERSION,
        name: module.name.clone(),
        constants,
        globals: module.globals.clone(),
        functions,
    };
    options(u64::MAX).serialize(&record).ok()
}

impl Module {
    /// Size of the encoding produced by [`write_module`], or `None` if the
    /// module refers to constants missing from its context
    pub fn encoded_size(&self) -> Option<usize> {
        encode(self).map(|bytes| bytes.len())
    }
}

/// Decode a module, interning its constants into `context`.
///
/// Returns `None` on any malformed input. The context is only touched once
/// decoding has fully succeeded.
pub fn parse_module(data: &[u8], context: &Arc<Context>) -> Option<Module> {
    let record: ModuleRecord = match options(data.len() as u64).deserialize(data) {
        Ok(record) => record,
        Err(err) => {
            trace!("Rejecting malformed module: {}", err);
            return None;
        }
    };
    if record.version != FORMAT_VERSION {
        trace!("Rejecting module with format version {}", record.version);
        return None;
    }

    if let Some(constant) = record.constants.iter().find(|c| !c.is_canonical()) {
        trace!("Rejecting module with non-canonical constant {:?}", constant);
        return None;
    }

    let mut functions = record.functions;
    let table_len = record.constants.len();
    map_constants(&mut functions, |id| ((id.0 as usize) < table_len).then_some(id))?;

    let global_ids: Vec<ConstId> = record
        .constants
        .iter()
        .map(|constant| context.intern(*constant))
        .collect();
    map_constants(&mut functions, |id| global_ids.get(id.0 as usize).copied())?;
    for func in &mut functions {
        func.reindex();
    }

    let mut module = Module::new(record.name, Arc::clone(context));
    module.globals = record.globals;
    module.functions = functions;
    Some(module)
}

/// Encode `module` into `dest`, returning the number of bytes written.
///
/// When the encoding exceeds `max_size` (or `dest`) nothing is written and `0`
/// is returned. This is indistinguishable from an encoding failure.
pub fn write_module(module: &Module, dest: &mut [u8], max_size: usize) -> usize {
    let Some(bytes) = encode(module) else {
        return 0;
    };
    if bytes.len() > max_size.min(dest.len()) {
        trace!("Encoded module of {} bytes exceeds {}", bytes.len(), max_size);
        return 0;
    }
    dest[..bytes.len()].copy_from_slice(&bytes);
    bytes.len()
}

/// Parse a module and reject it unless it verifies
pub fn parse_and_verify(data: &[u8], context: &Arc<Context>) -> Option<Module> {
    let module = parse_module(data, context)?;
    match verify_module(&module) {
        Ok(()) => Some(module),
        Err(err) => {
            warn!("Module failed verification: {}", err);
            None
        }
    }
}
