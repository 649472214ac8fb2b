//! Extraction of pointer-relevant facts from an IR module.
//!
//! The adapter is pure classification: it walks every function once,
//! resolves operands to [`ValueRef`]s, and emits one [`PointerFact`] per
//! pointer-relevant instruction. It performs no analysis and never
//! mutates the module. Non-pointer instructions are simply not emitted.
//!
//! Pointer flows the classification cannot express (a pointer-typed
//! `Other` instruction, say) are `UnsupportedConstruct` errors. In strict
//! mode the first one aborts adaptation; otherwise they are collected in
//! [`ModuleFacts::skipped`] and the caller accepts the soundness caveat.

use crate::analysis::{AllocSite, ValueRef};
use crate::ir;
use crate::{Error, Result};
use log::warn;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Configuration for fact extraction.
#[derive(Clone, Debug)]
pub struct AdapterOptions {
    /// Abort on the first unsupported construct instead of skipping it.
    pub strict: bool,
    /// Direct callees treated as heap allocators, one abstract object per
    /// call site.
    pub allocator_names: BTreeSet<String>,
}

impl Default for AdapterOptions {
    fn default() -> AdapterOptions {
        AdapterOptions {
            strict: false,
            allocator_names: ["malloc", "calloc", "realloc"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

/// The target of a call fact.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallTarget {
    /// Callee known statically.
    Direct(String),
    /// Call through a pointer value; candidates are resolved by the
    /// builder from the module's address-taken set.
    Indirect(ValueRef),
}

/// One pointer-relevant fact, ready for constraint emission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PointerFact {
    /// An `alloca`: `value` holds the address of a fresh stack object.
    AddrOfStack {
        value: ValueRef,
        site: AllocSite,
        allocated: ir::Type,
    },
    /// A global declaration: the global's name-as-operand holds the
    /// address of the global's storage.
    AddrOfGlobal {
        value: ValueRef,
        site: AllocSite,
        ty: ir::Type,
    },
    /// An address-taken function: the symbol-as-operand holds the
    /// function's address.
    AddrOfFunction { value: ValueRef, site: AllocSite },
    /// An allocator call site: the result holds the address of a fresh
    /// heap object.
    AddrOfHeap { value: ValueRef, site: AllocSite },
    /// `dst = src`
    Copy { dst: ValueRef, src: ValueRef },
    /// `dst = *address`
    Load { dst: ValueRef, address: ValueRef },
    /// `*address = value`
    Store { address: ValueRef, value: ValueRef },
    /// A call; argument slots that carry no pointer are `None` so
    /// positional pairing with formals survives filtering.
    Call {
        result: Option<ValueRef>,
        target: CallTarget,
        arguments: Vec<Option<ValueRef>>,
    },
}

/// The pointer-relevant shape of a function, for call wiring.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    parameters: Vec<String>,
    pointer_parameters: Vec<bool>,
    returns_pointer: bool,
}

impl Signature {
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Whether the parameter at `index` may carry a pointer.
    pub fn parameter_is_pointer(&self, index: usize) -> bool {
        self.pointer_parameters.get(index).copied().unwrap_or(false)
    }

    pub fn returns_pointer(&self) -> bool {
        self.returns_pointer
    }
}

/// Everything the adapter extracted from one module.
#[derive(Clone, Debug, Default)]
pub struct ModuleFacts {
    facts: Vec<PointerFact>,
    signatures: FxHashMap<String, Signature>,
    address_taken: BTreeSet<String>,
    value_types: FxHashMap<ValueRef, ir::Type>,
    skipped: Vec<Error>,
}

impl ModuleFacts {
    pub fn facts(&self) -> &[PointerFact] {
        &self.facts
    }

    pub fn signature(&self, function: &str) -> Option<&Signature> {
        self.signatures.get(function)
    }

    /// Functions whose address is taken anywhere in the module.
    pub fn address_taken(&self) -> &BTreeSet<String> {
        &self.address_taken
    }

    /// The declared type of a value, where the adapter saw one.
    pub fn value_type(&self, value: &ValueRef) -> Option<&ir::Type> {
        self.value_types.get(value)
    }

    /// Constructs skipped in best-effort mode. Non-empty means the result
    /// under-approximates: some pointer flow was dropped.
    pub fn skipped(&self) -> &[Error] {
        &self.skipped
    }
}

/// Extract pointer-relevant facts from `module`.
pub fn adapt(module: &ir::Module, options: &AdapterOptions) -> Result<ModuleFacts> {
    let mut adapter = Adapter {
        options,
        facts: ModuleFacts::default(),
    };
    adapter.adapt_module(module)?;
    Ok(adapter.facts)
}

struct Adapter<'a> {
    options: &'a AdapterOptions,
    facts: ModuleFacts,
}

impl<'a> Adapter<'a> {
    fn adapt_module(&mut self, module: &ir::Module) -> Result<()> {
        for function in module.functions() {
            let mut parameters = Vec::new();
            let mut pointer_parameters = Vec::new();
            for parameter in function.parameters() {
                parameters.push(parameter.name().to_string());
                pointer_parameters.push(parameter.ty().is_pointer_bearing());
            }
            self.facts.signatures.insert(
                function.name().to_string(),
                Signature {
                    parameters,
                    pointer_parameters,
                    returns_pointer: function.return_type().is_pointer_bearing(),
                },
            );
        }

        for global in module.globals() {
            self.adapt_global(global)?;
        }
        for function in module.functions() {
            self.adapt_function(function)?;
        }

        // One address-of fact per address-taken function, after the walk
        // has found every taking occurrence.
        for name in self.facts.address_taken.clone() {
            self.facts.facts.push(PointerFact::AddrOfFunction {
                value: ValueRef::function(&name),
                site: AllocSite::function(&name),
            });
        }
        Ok(())
    }

    fn adapt_global(&mut self, global: &ir::Global) -> Result<()> {
        let value = ValueRef::global(global.name());
        self.facts
            .value_types
            .insert(value.clone(), ir::Type::pointer(global.ty().clone()));
        self.facts.facts.push(PointerFact::AddrOfGlobal {
            value: value.clone(),
            site: AllocSite::global(global.name()),
            ty: global.ty().clone(),
        });

        // A pointer-typed initializer is a store into the storage that
        // happened before the program ran.
        if let Some(initializer) = global.initializer() {
            if global.ty().is_pointer_bearing() {
                match initializer {
                    ir::Operand::Null => {}
                    ir::Operand::Global(name) => {
                        self.facts.facts.push(PointerFact::Store {
                            address: value,
                            value: ValueRef::global(name),
                        });
                    }
                    ir::Operand::Function(name) => {
                        self.facts.address_taken.insert(name.clone());
                        self.facts.facts.push(PointerFact::Store {
                            address: value,
                            value: ValueRef::function(name),
                        });
                    }
                    ir::Operand::Local(name) => {
                        self.unsupported(
                            "<global>",
                            format!(
                                "initializer of @{} references local %{}",
                                global.name(),
                                name
                            ),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn adapt_function(&mut self, function: &ir::Function) -> Result<()> {
        // Declared types of every name defined in this function, for
        // pointer-relevance checks on bare operands.
        let mut local_types: FxHashMap<&str, ir::Type> = FxHashMap::default();
        for parameter in function.parameters() {
            local_types.insert(parameter.name(), parameter.ty().clone());
            if parameter.ty().is_pointer_bearing() {
                self.facts.value_types.insert(
                    ValueRef::local(function.name(), parameter.name()),
                    parameter.ty().clone(),
                );
            }
        }
        if function.return_type().is_pointer_bearing() {
            self.facts.value_types.insert(
                ValueRef::ret(function.name()),
                function.return_type().clone(),
            );
        }
        for instruction in function.instructions() {
            if let (Some(result), Some(ty)) = (instruction.result(), instruction.result_type()) {
                local_types.insert(result, ty);
            }
        }

        for (index, instruction) in function.instructions().iter().enumerate() {
            self.adapt_instruction(function, index, instruction, &local_types)?;
        }
        Ok(())
    }

    fn adapt_instruction(
        &mut self,
        function: &ir::Function,
        index: usize,
        instruction: &ir::Instruction,
        local_types: &FxHashMap<&str, ir::Type>,
    ) -> Result<()> {
        let name = function.name();
        match instruction {
            ir::Instruction::Alloca { result, allocated } => {
                let value = ValueRef::local(name, result);
                self.facts
                    .value_types
                    .insert(value.clone(), ir::Type::pointer(allocated.clone()));
                self.facts.facts.push(PointerFact::AddrOfStack {
                    value,
                    site: AllocSite::stack(name, result),
                    allocated: allocated.clone(),
                });
            }
            ir::Instruction::Load { result, ty, address } => {
                if !ty.is_pointer_bearing() {
                    return Ok(());
                }
                let dst = ValueRef::local(name, result);
                self.facts.value_types.insert(dst.clone(), ty.clone());
                if let Some(address) = self.resolve(name, address, local_types)? {
                    self.facts.facts.push(PointerFact::Load { dst, address });
                }
            }
            ir::Instruction::Store { value, address } => {
                if !self.operand_is_pointer(value, local_types) {
                    return Ok(());
                }
                let value = self.resolve(name, value, local_types)?;
                let address = self.resolve(name, address, local_types)?;
                if let (Some(value), Some(address)) = (value, address) {
                    self.facts.facts.push(PointerFact::Store { address, value });
                }
            }
            ir::Instruction::Assign { result, ty, value }
            | ir::Instruction::Gep {
                result,
                ty,
                base: value,
            } => {
                if !ty.is_pointer_bearing() {
                    return Ok(());
                }
                let dst = ValueRef::local(name, result);
                self.facts.value_types.insert(dst.clone(), ty.clone());
                if let Some(src) = self.resolve(name, value, local_types)? {
                    self.facts.facts.push(PointerFact::Copy { dst, src });
                }
            }
            ir::Instruction::Call {
                result,
                ty,
                target,
                arguments,
            } => {
                self.adapt_call(
                    function,
                    index,
                    result.as_deref(),
                    ty,
                    target,
                    arguments,
                    local_types,
                )?;
            }
            ir::Instruction::Return { value } => {
                let value = match value {
                    Some(value) => value,
                    None => return Ok(()),
                };
                if !function.return_type().is_pointer_bearing() {
                    return Ok(());
                }
                if let Some(src) = self.resolve(name, value, local_types)? {
                    self.facts.facts.push(PointerFact::Copy {
                        dst: ValueRef::ret(name),
                        src,
                    });
                }
            }
            ir::Instruction::Other {
                mnemonic,
                result: _,
                ty,
                operands,
            } => {
                let pointer_relevant = ty.is_pointer_bearing()
                    || operands
                        .iter()
                        .any(|operand| self.operand_is_pointer(operand, local_types));
                if pointer_relevant {
                    self.unsupported(
                        name,
                        format!("cannot classify pointer flow through '{}'", mnemonic),
                    )?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn adapt_call(
        &mut self,
        function: &ir::Function,
        index: usize,
        result: Option<&str>,
        ty: &ir::Type,
        target: &ir::Operand,
        arguments: &[ir::Operand],
        local_types: &FxHashMap<&str, ir::Type>,
    ) -> Result<()> {
        let name = function.name();

        // Allocator call sites become heap objects instead of calls.
        if let ir::Operand::Function(callee) = target {
            if self.options.allocator_names.contains(callee) {
                if let Some(result) = result {
                    let value = ValueRef::local(name, result);
                    self.facts
                        .value_types
                        .insert(value.clone(), ty.clone());
                    self.facts.facts.push(PointerFact::AddrOfHeap {
                        value,
                        site: AllocSite::heap(name, index),
                    });
                }
                return Ok(());
            }
        }

        let call_target = match target {
            ir::Operand::Function(callee) => CallTarget::Direct(callee.clone()),
            other => match self.resolve(name, other, local_types)? {
                Some(value) => CallTarget::Indirect(value),
                None => {
                    return self.unsupported(
                        name,
                        format!("call through unresolvable target {}", other),
                    );
                }
            },
        };

        let result = if ty.is_pointer_bearing() {
            result.map(|result| {
                let value = ValueRef::local(name, result);
                self.facts.value_types.insert(value.clone(), ty.clone());
                value
            })
        } else {
            None
        };

        let mut resolved_arguments = Vec::with_capacity(arguments.len());
        for argument in arguments {
            if self.operand_is_pointer(argument, local_types) {
                resolved_arguments.push(self.resolve(name, argument, local_types)?);
            } else {
                resolved_arguments.push(None);
            }
        }

        self.facts.facts.push(PointerFact::Call {
            result,
            target: call_target,
            arguments: resolved_arguments,
        });
        Ok(())
    }

    /// Resolve an operand to the value it denotes. `None` for null and
    /// for non-pointer operands with no pointer to contribute.
    fn resolve(
        &mut self,
        function: &str,
        operand: &ir::Operand,
        local_types: &FxHashMap<&str, ir::Type>,
    ) -> Result<Option<ValueRef>> {
        match operand {
            ir::Operand::Local(name) => {
                if local_types.contains_key(name.as_str()) {
                    Ok(Some(ValueRef::local(function, name)))
                } else {
                    Err(Error::MalformedModule(format!(
                        "function {} uses undefined local %{}",
                        function, name
                    )))
                }
            }
            ir::Operand::Global(name) => Ok(Some(ValueRef::global(name))),
            ir::Operand::Function(name) => {
                self.facts.address_taken.insert(name.clone());
                Ok(Some(ValueRef::function(name)))
            }
            ir::Operand::Null => Ok(None),
        }
    }

    /// Whether an operand may carry a pointer.
    fn operand_is_pointer(
        &self,
        operand: &ir::Operand,
        local_types: &FxHashMap<&str, ir::Type>,
    ) -> bool {
        match operand {
            ir::Operand::Local(name) => local_types
                .get(name.as_str())
                .map(ir::Type::is_pointer_bearing)
                .unwrap_or(false),
            // A global or function operand is itself an address.
            ir::Operand::Global(_) | ir::Operand::Function(_) => true,
            ir::Operand::Null => false,
        }
    }

    /// Record or raise an unsupported construct, per `strict`.
    fn unsupported(&mut self, function: &str, reason: String) -> Result<()> {
        let error = Error::UnsupportedConstruct {
            function: function.to_string(),
            reason,
        };
        if self.options.strict {
            return Err(error);
        }
        warn!("skipping construct: {}", error);
        self.facts.skipped.push(error);
        Ok(())
    }
}
