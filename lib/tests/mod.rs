use crate::analysis::{
    self, AllocSite, AnalysisOptions, CancelToken, PointsToAnalysis, SolverOptions, ValueRef,
};
use crate::ir::{Function, Global, Instruction, Module, Operand, Parameter, Type};
use crate::Error;


#[test]
fn scenario_alloca_store_load() {
    let module = simple_0::scenario_module();
    let solution = analysis::points_to_analysis(&module).unwrap();

    let x = solution
        .object_node_id(&AllocSite::stack("main", "x"))
        .unwrap();
    let p_slot = solution
        .object_node_id(&AllocSite::stack("main", "p"))
        .unwrap();
    let g = solution.object_node_id(&AllocSite::global("g")).unwrap();
    let q = solution
        .value_node_id(&ValueRef::local("main", "q"))
        .unwrap();

    // *p = &x, so p's slot holds x, and q = *p recovers it.
    assert!(solution.points_to(p_slot).unwrap().contains(x));
    assert!(solution.points_to(q).unwrap().contains(x));
    // store %x, @g flows into the global's storage too.
    assert!(solution.points_to(g).unwrap().contains(x));

    // The reverse index agrees.
    assert!(solution.pointed_by(x).unwrap().contains(&p_slot));
    assert!(solution.pointed_by(x).unwrap().contains(&q));

    let statistics = solution.statistics();
    assert_eq!(
        statistics.node_count,
        statistics.value_count + statistics.object_count
    );
    assert!(statistics.points_to_edge_count >= 3);
}

#[test]
fn copy_chain_is_sound() {
    // p = &x; q = p  =>  pts(q) ⊇ {x}
    let int = Type::integer(32);
    let int_ptr = Type::pointer(int.clone());

    let mut main = Function::new("main", Vec::new(), Type::Void);
    main.push(Instruction::alloca("x", int));
    main.push(Instruction::assign("p", int_ptr.clone(), Operand::local("x")));
    main.push(Instruction::assign("q", int_ptr, Operand::local("p")));

    let mut module = Module::new("copies");
    module.add_function(main);

    let solution = analysis::points_to_analysis(&module).unwrap();
    let x = solution
        .object_node_id(&AllocSite::stack("main", "x"))
        .unwrap();
    let q = solution
        .value_node_id(&ValueRef::local("main", "q"))
        .unwrap();
    assert!(solution.points_to(q).unwrap().contains(x));
}

#[test]
fn indirect_call_is_sound() {
    // fp may be f or g; a call through fp must wire both candidates'
    // parameter and return flow.
    let int = Type::integer(32);
    let int_ptr = Type::pointer(int.clone());
    let fn_ty = Type::function(int_ptr.clone(), vec![int_ptr.clone()]);
    let fn_ptr = Type::pointer(fn_ty);

    let mut module = Module::new("indirect");
    for callee in ["f", "g"] {
        let mut function = Function::new(
            callee,
            vec![Parameter::new("a", int_ptr.clone())],
            int_ptr.clone(),
        );
        function.push(Instruction::ret(Some(Operand::local("a"))));
        module.add_function(function);
    }

    let mut main = Function::new("main", Vec::new(), Type::Void);
    main.push(Instruction::alloca("x", int));
    main.push(Instruction::alloca("cond_slot", fn_ptr.clone()));
    // Both targets reach the slot; the loaded fp may be either.
    main.push(Instruction::store(
        Operand::function("f"),
        Operand::local("cond_slot"),
    ));
    main.push(Instruction::store(
        Operand::function("g"),
        Operand::local("cond_slot"),
    ));
    main.push(Instruction::load("fp", fn_ptr, Operand::local("cond_slot")));
    main.push(Instruction::call(
        Some("r"),
        int_ptr,
        Operand::local("fp"),
        vec![Operand::local("x")],
    ));
    module.add_function(main);

    let solution = analysis::points_to_analysis(&module).unwrap();
    let x = solution
        .object_node_id(&AllocSite::stack("main", "x"))
        .unwrap();

    for callee in ["f", "g"] {
        let formal = solution
            .value_node_id(&ValueRef::local(callee, "a"))
            .unwrap();
        assert!(
            solution.points_to(formal).unwrap().contains(x),
            "formal of {} misses x",
            callee
        );
    }

    // Both candidates return their parameter, so the call result sees x.
    let r = solution
        .value_node_id(&ValueRef::local("main", "r"))
        .unwrap();
    assert!(solution.points_to(r).unwrap().contains(x));
}

#[test]
fn may_alias_tracks_overlap() {
    let int = Type::integer(32);
    let int_ptr = Type::pointer(int.clone());

    let mut main = Function::new("main", Vec::new(), Type::Void);
    main.push(Instruction::alloca("x", int.clone()));
    main.push(Instruction::alloca("y", int));
    main.push(Instruction::assign("p", int_ptr.clone(), Operand::local("x")));
    main.push(Instruction::assign("q", int_ptr.clone(), Operand::local("x")));
    main.push(Instruction::assign("r", int_ptr, Operand::local("y")));

    let mut module = Module::new("alias");
    module.add_function(main);

    let solution = analysis::points_to_analysis(&module).unwrap();
    let p = solution
        .value_node_id(&ValueRef::local("main", "p"))
        .unwrap();
    let q = solution
        .value_node_id(&ValueRef::local("main", "q"))
        .unwrap();
    let r = solution
        .value_node_id(&ValueRef::local("main", "r"))
        .unwrap();

    assert!(solution.may_alias(p, q).unwrap());
    assert!(solution.may_alias(q, p).unwrap());
    assert!(!solution.may_alias(p, r).unwrap());
}

#[test]
fn global_initializer_flows_into_storage() {
    let int = Type::integer(32);
    let int_ptr = Type::pointer(int.clone());

    let mut module = Module::new("globals");
    module.add_global(Global::new("h", int, None));
    module.add_global(Global::new("g", int_ptr, Some(Operand::global("h"))));
    module.add_function(Function::new("main", Vec::new(), Type::Void));

    let solution = analysis::points_to_analysis(&module).unwrap();
    let g = solution.object_node_id(&AllocSite::global("g")).unwrap();
    let h = solution.object_node_id(&AllocSite::global("h")).unwrap();
    assert!(solution.points_to(g).unwrap().contains(h));
}

#[test]
fn heap_sites_are_distinct_objects() {
    let byte_ptr = Type::pointer(Type::integer(8));

    let mut main = Function::new("main", Vec::new(), Type::Void);
    main.push(Instruction::call(
        Some("p"),
        byte_ptr.clone(),
        Operand::function("malloc"),
        vec![Operand::Null],
    ));
    main.push(Instruction::call(
        Some("q"),
        byte_ptr,
        Operand::function("malloc"),
        vec![Operand::Null],
    ));

    let mut module = Module::new("heap");
    module.add_function(main);

    let solution = analysis::points_to_analysis(&module).unwrap();
    let p = solution
        .value_node_id(&ValueRef::local("main", "p"))
        .unwrap();
    let q = solution
        .value_node_id(&ValueRef::local("main", "q"))
        .unwrap();

    assert_eq!(solution.points_to(p).unwrap().len(), 1);
    assert_eq!(solution.points_to(q).unwrap().len(), 1);
    // One abstract object per call site, so the two never alias.
    assert!(!solution.may_alias(p, q).unwrap());
}

#[test]
fn queries_fail_until_solved() {
    let module = simple_0::scenario_module();
    let mut analysis = PointsToAnalysis::new(&module, AnalysisOptions::default()).unwrap();
    assert!(matches!(analysis.solution(), Err(Error::NotSolved)));

    analysis.solve().unwrap();
    assert!(analysis.solution().is_ok());
}

#[test]
fn canceled_run_exposes_no_results() {
    let module = simple_0::scenario_module();
    let cancel = CancelToken::new();
    cancel.cancel();

    let options = AnalysisOptions {
        solver: SolverOptions {
            cancel: Some(cancel),
            ..SolverOptions::default()
        },
        ..AnalysisOptions::default()
    };
    let mut analysis = PointsToAnalysis::new(&module, options).unwrap();
    assert_eq!(analysis.solve(), Err(Error::Canceled));
    assert!(matches!(analysis.solution(), Err(Error::NotSolved)));
    assert!(matches!(analysis.into_solution(), Err(Error::NotSolved)));
}

#[test]
fn budget_exhaustion_aborts_the_run() {
    let module = simple_0::scenario_module();
    let options = AnalysisOptions {
        solver: SolverOptions {
            max_steps: Some(1),
            ..SolverOptions::default()
        },
        ..AnalysisOptions::default()
    };
    let mut analysis = PointsToAnalysis::new(&module, options).unwrap();
    assert_eq!(
        analysis.solve(),
        Err(Error::BudgetExhausted { steps: 1 })
    );
    assert!(matches!(analysis.solution(), Err(Error::NotSolved)));
}

#[test]
fn solution_round_trips_through_json() {
    let module = simple_0::scenario_module();
    let solution = analysis::points_to_analysis(&module).unwrap();

    let json = serde_json::to_string(&solution).unwrap();
    let restored: analysis::Solution = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.statistics(), solution.statistics());
    let q = solution
        .value_node_id(&ValueRef::local("main", "q"))
        .unwrap();
    assert_eq!(
        restored.points_to(q).unwrap(),
        solution.points_to(q).unwrap()
    );
}
