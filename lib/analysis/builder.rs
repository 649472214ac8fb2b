//! Translation of pointer facts into the constraint graph.
//!
//! One constraint per non-call fact, per the inclusion-based mapping:
//! address-of facts seed points-to sets, loads and stores become
//! dereference edges, everything else is a copy. Calls expand into copy
//! edges for actual→formal and return→result flow; an indirect call
//! conservatively targets every address-taken function in the module.

use crate::analysis::adapter::{CallTarget, ModuleFacts, PointerFact, Signature};
use crate::analysis::{
    AllocSite, Constraint, ConstraintGraph, NodeTable, ValueRef,
};
use crate::ir;
use crate::Result;
use log::debug;

/// A fully built constraint system, ready to solve.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSystem {
    nodes: NodeTable,
    graph: ConstraintGraph,
}

impl ConstraintSystem {
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    pub(crate) fn into_parts(self) -> (NodeTable, ConstraintGraph) {
        (self.nodes, self.graph)
    }
}

/// Build the constraint system for an adapted module.
pub fn build(facts: &ModuleFacts) -> Result<ConstraintSystem> {
    let mut builder = Builder {
        facts,
        nodes: NodeTable::new(),
        constraints: Vec::new(),
    };

    for fact in facts.facts() {
        builder.emit(fact);
    }

    let mut graph = ConstraintGraph::new();
    graph.grow(builder.nodes.len());
    for constraint in &builder.constraints {
        graph.add_constraint(*constraint)?;
    }
    debug!(
        "built constraint graph: {} nodes, {} constraints",
        builder.nodes.len(),
        builder.constraints.len()
    );

    Ok(ConstraintSystem {
        nodes: builder.nodes,
        graph,
    })
}

struct Builder<'a> {
    facts: &'a ModuleFacts,
    nodes: NodeTable,
    constraints: Vec<Constraint>,
}

impl<'a> Builder<'a> {
    fn value(&mut self, value: &ValueRef) -> crate::analysis::NodeId {
        let ty = self.facts.value_type(value).cloned();
        self.nodes.value_node(value, ty.as_ref())
    }

    fn object(&mut self, site: &AllocSite, ty: Option<&ir::Type>) -> crate::analysis::NodeId {
        self.nodes.object_node(site, ty)
    }

    fn emit(&mut self, fact: &PointerFact) {
        match fact {
            PointerFact::AddrOfStack {
                value,
                site,
                allocated,
            } => {
                let dst = self.value(value);
                let object = self.object(site, Some(allocated));
                self.constraints.push(Constraint::AddrOf { dst, object });
            }
            PointerFact::AddrOfGlobal { value, site, ty } => {
                let dst = self.value(value);
                let object = self.object(site, Some(ty));
                self.constraints.push(Constraint::AddrOf { dst, object });
            }
            PointerFact::AddrOfFunction { value, site } => {
                let dst = self.value(value);
                let object = self.object(site, None);
                self.constraints.push(Constraint::AddrOf { dst, object });
            }
            PointerFact::AddrOfHeap { value, site } => {
                let dst = self.value(value);
                let object = self.object(site, None);
                self.constraints.push(Constraint::AddrOf { dst, object });
            }
            PointerFact::Copy { dst, src } => {
                let dst = self.value(dst);
                let src = self.value(src);
                self.constraints.push(Constraint::Copy { dst, src });
            }
            PointerFact::Load { dst, address } => {
                let dst = self.value(dst);
                let src = self.value(address);
                self.constraints.push(Constraint::Load { dst, src });
            }
            PointerFact::Store { address, value } => {
                let dst = self.value(address);
                let src = self.value(value);
                self.constraints.push(Constraint::Store { dst, src });
            }
            PointerFact::Call {
                result,
                target,
                arguments,
            } => self.emit_call(result.as_ref(), target, arguments),
        }
    }

    fn emit_call(
        &mut self,
        result: Option<&ValueRef>,
        target: &CallTarget,
        arguments: &[Option<ValueRef>],
    ) {
        let candidates: Vec<(String, Signature)> = match target {
            CallTarget::Direct(callee) => match self.facts.signature(callee) {
                Some(signature) => vec![(callee.clone(), signature.clone())],
                None => {
                    // External function: its effects are outside the
                    // module, so no constraints are emitted for it.
                    debug!("direct call to external function {}", callee);
                    Vec::new()
                }
            },
            // Candidate set for an indirect call: every function whose
            // address is taken anywhere in the module.
            CallTarget::Indirect(_) => self
                .facts
                .address_taken()
                .iter()
                .filter_map(|callee| {
                    self.facts
                        .signature(callee)
                        .map(|signature| (callee.clone(), signature.clone()))
                })
                .collect(),
        };

        for (callee, signature) in candidates {
            // Actual → formal, clamped to the shorter arity.
            let pairs = arguments.len().min(signature.parameters().len());
            for index in 0..pairs {
                let argument = match &arguments[index] {
                    Some(argument) => argument,
                    None => continue,
                };
                if !signature.parameter_is_pointer(index) {
                    continue;
                }
                let formal = ValueRef::local(&callee, &signature.parameters()[index]);
                let dst = self.value(&formal);
                let src = self.value(argument);
                self.constraints.push(Constraint::Copy { dst, src });
            }

            // Return → result.
            if let Some(result) = result {
                if signature.returns_pointer() {
                    let ret = ValueRef::ret(&callee);
                    let dst = self.value(result);
                    let src = self.value(&ret);
                    self.constraints.push(Constraint::Copy { dst, src });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::adapter::{adapt, AdapterOptions};
    use crate::ir::{Function, Instruction, Module, Operand, Parameter, Type};

    #[test]
    fn one_constraint_per_simple_fact() {
        let mut function = Function::new("main", Vec::new(), Type::Void);
        function.push(Instruction::alloca("x", Type::integer(32)));
        function.push(Instruction::assign(
            "p",
            Type::pointer(Type::integer(32)),
            Operand::local("x"),
        ));
        let mut module = Module::new("test");
        module.add_function(function);

        let facts = adapt(&module, &AdapterOptions::default()).unwrap();
        let system = build(&facts).unwrap();
        // alloca result, its object, and %p.
        assert_eq!(system.nodes().len(), 3);
        assert_eq!(system.nodes().object_count(), 1);
    }

    #[test]
    fn indirect_call_targets_every_address_taken_function() {
        let int_ptr = Type::pointer(Type::integer(32));
        let fn_ty = Type::function(Type::Void, vec![int_ptr.clone()]);

        let mut module = Module::new("test");
        for callee in ["f", "g"] {
            let function = Function::new(
                callee,
                vec![Parameter::new("a", int_ptr.clone())],
                Type::Void,
            );
            module.add_function(function);
        }

        let mut main = Function::new("main", Vec::new(), Type::Void);
        main.push(Instruction::assign(
            "fp",
            Type::pointer(fn_ty.clone()),
            Operand::function("f"),
        ));
        main.push(Instruction::assign(
            "fp2",
            Type::pointer(fn_ty),
            Operand::function("g"),
        ));
        main.push(Instruction::alloca("x", Type::integer(32)));
        main.push(Instruction::call(
            None::<&str>,
            Type::Void,
            Operand::local("fp"),
            vec![Operand::local("x")],
        ));
        module.add_function(main);

        let facts = adapt(&module, &AdapterOptions::default()).unwrap();
        let system = build(&facts).unwrap();

        // Both formals must exist and receive the actual.
        for callee in ["f", "g"] {
            let formal = system
                .nodes()
                .value_id(&ValueRef::local(callee, "a"))
                .expect("formal interned");
            let actual = system
                .nodes()
                .value_id(&ValueRef::local("main", "x"))
                .unwrap();
            assert!(system.graph().copy_successors(actual).contains(&formal));
        }
    }
}
