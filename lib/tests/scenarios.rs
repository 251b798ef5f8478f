mod common;

use common::*;
use jweave::jvm::class_file::{ClassFile, Version};
use jweave::jvm::class_graph::{ClassGraph, ClassGraphArenas, JavaLibrary};
use jweave::jvm::code::{BranchInstruction, CodeItem, Instruction, InvokeType};
use jweave::jvm::{ClassAccessFlags, FieldType, MethodAccessFlags};
use jweave::weaver::pointcut::{CflowCounters, Resolver};
use jweave::weaver::shadow::{find_shadows, ShadowKind};
use jweave::weaver::syntax::{parse_pointcut, parse_type_patterns};
use jweave::weaver::{
    fallback_order, sort_by_precedence, weave, AdviceKind, MatchValue, Outcome, PartialOrder,
    PrecedenceRules, ResolvedAspects, Settings, Severity,
};

#[test]
fn unrelated_target_is_never_matched() {
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = JavaLibrary::add_to_graph(&graph);
    let settings = Settings::default();

    library_class(&graph, java.object, "app/B", ClassAccessFlags::PUBLIC);
    let c = library_class(&graph, java.object, "app/C", ClassAccessFlags::PUBLIC);
    let work = library_method(&graph, c, "work", vec![], None, MethodAccessFlags::PUBLIC);
    let original = vec![
        CodeItem::Instruction(Instruction::ALoad(0)),
        CodeItem::Instruction(Instruction::Invoke(InvokeType::Virtual, work.as_ref())),
        CodeItem::Branch(BranchInstruction::Return),
    ];
    let a = read_class(
        &graph,
        "app/A",
        vec![],
        vec![MethodSpec {
            name: "run",
            descriptor: void_descriptor(vec![FieldType::object(binary_name("app/C"))]),
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            max_locals: 1,
            items: original.clone(),
        }],
    );

    let pointcut = "call(* *(..)) && within(app.A) && target(app.B)";
    let tracing = aspect(&graph, &java, "app/Tracing", &[(AdviceKind::Before, "log", pointcut)]);

    // The call shadow is ruled out on its shape alone
    let mut counters = CflowCounters::new(settings.cflow_counter_prefix.clone(), java.cflow_counter.class);
    let resolved = Resolver::new(&graph, &[], &mut counters)
        .resolve(tracing.class, &parse_pointcut(pointcut).unwrap(), &[])
        .unwrap();
    let shadows = find_shadows(&a, &graph, &java);
    let call = shadows
        .iter()
        .find(|shadow| shadow.kind == ShadowKind::MethodCall)
        .expect("call shadow");
    assert_eq!(resolved.fast_match(&call.shape()), MatchValue::Never);

    let output = weave(&graph, &java, &settings, vec![a], &[tracing], None);
    assert_eq!(output.types[0].outcome, Outcome::Unchanged);
    let body = &output.types[0].class.methods[0].code_impl.as_ref().unwrap().items;
    assert_eq!(body, &original);

    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].severity, Severity::Lint);
    assert_eq!(
        output.diagnostics[0].message,
        "before advice app.Tracing.log has not been applied"
    );
}

/// `app/Main.run()` calling the static `app/Service.work()`
fn call_site<'g>(graph: &ClassGraph<'g>, java: &JavaLibrary<'g>) -> (jweave::jvm::model::Class<'g>, CodeItem) {
    let service = library_class(graph, java.object, "app/Service", ClassAccessFlags::PUBLIC);
    let work = library_method(
        graph,
        service,
        "work",
        vec![],
        None,
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    );
    let call = CodeItem::Instruction(Instruction::Invoke(InvokeType::Static, work.as_ref()));
    let main = read_class(
        graph,
        "app/Main",
        vec![],
        vec![MethodSpec {
            name: "run",
            descriptor: void_descriptor(vec![]),
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            max_locals: 0,
            items: vec![call.clone(), CodeItem::Branch(BranchInstruction::Return)],
        }],
    );
    (main, call)
}

fn invoke_static(method: jweave::jvm::class_graph::MethodId<'_>) -> CodeItem {
    CodeItem::Instruction(Instruction::Invoke(InvokeType::Static, method.as_ref()))
}

#[test]
fn lower_precedence_advice_is_closer_to_the_join_point() {
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = JavaLibrary::add_to_graph(&graph);
    let settings = Settings::default();
    let (main, call) = call_site(&graph, &java);

    let pointcut = "call(* app.Service.work())";
    let ordering = aspect(
        &graph,
        &java,
        "app/Ordering",
        &[
            (AdviceKind::AfterReturning, "adv1", pointcut),
            (AdviceKind::AfterReturning, "adv2", pointcut),
        ],
    );
    let (adv1, adv2) = (ordering.advice[0].method, ordering.advice[1].method);

    // The later `after` advice has precedence, so it sorts last
    let mut diagnostics = vec![];
    let resolved = ResolvedAspects::resolve(
        &graph,
        &java,
        &settings,
        std::slice::from_ref(&ordering),
        &mut diagnostics,
    );
    assert!(diagnostics.is_empty());
    let rules = PrecedenceRules {
        declared: &resolved.precedence,
    };
    assert_eq!(
        rules.compare(&resolved.advice[0], &resolved.advice[1]),
        PartialOrder::Less
    );
    let order = sort_by_precedence(
        &resolved.advice,
        |a, b| rules.compare(a, b),
        |a, b| fallback_order(a, b),
    )
    .unwrap();
    assert_eq!(order, vec![0, 1]);

    // ... and wraps the other one
    let output = weave(&graph, &java, &settings, vec![main], &[ordering], None);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let woven = output.types.into_iter().next().unwrap();
    assert_eq!(woven.outcome, Outcome::Woven);
    assert_eq!(
        woven.class.methods[0].code_impl.as_ref().unwrap().items,
        vec![
            call,
            invoke_static(adv1),
            invoke_static(adv2),
            CodeItem::Branch(BranchInstruction::Return),
        ]
    );

    let bytes = woven
        .class
        .serialize(settings.output_version)
        .unwrap()
        .to_bytes()
        .unwrap();
    let reparsed = ClassFile::parse(&bytes).unwrap();
    assert_eq!(reparsed.version, Version::JAVA5);
    assert_eq!(reparsed.methods.len(), 1);
}

#[test]
fn earlier_before_advice_runs_first() {
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = JavaLibrary::add_to_graph(&graph);
    let (main, call) = call_site(&graph, &java);

    let pointcut = "call(* app.Service.work())";
    let ordering = aspect(
        &graph,
        &java,
        "app/Ordering",
        &[
            (AdviceKind::Before, "first", pointcut),
            (AdviceKind::Before, "second", pointcut),
        ],
    );
    let (first, second) = (ordering.advice[0].method, ordering.advice[1].method);

    let output = weave(&graph, &java, &Settings::default(), vec![main], &[ordering], None);
    assert_eq!(
        output.types[0].class.methods[0].code_impl.as_ref().unwrap().items,
        vec![
            invoke_static(first),
            invoke_static(second),
            call,
            CodeItem::Branch(BranchInstruction::Return),
        ]
    );
}

#[test]
fn circular_precedence_is_reported() {
    // Plain comparator: A < B, B < C, C < A
    let table = [('A', 'B'), ('B', 'C'), ('C', 'A')];
    let compare = |a: &char, b: &char| {
        if table.contains(&(*a, *b)) {
            PartialOrder::Less
        } else if table.contains(&(*b, *a)) {
            PartialOrder::Greater
        } else {
            PartialOrder::Incomparable
        }
    };
    let cycle = sort_by_precedence(&['A', 'B', 'C'], compare, |a, b| a.cmp(b)).unwrap_err();
    let mut members = cycle.members.clone();
    members.sort_unstable();
    assert_eq!(members, vec![0, 1, 2]);

    // The same cycle between aspects, through `declare precedence`
    let arenas = ClassGraphArenas::new();
    let graph = ClassGraph::new(&arenas);
    let java = JavaLibrary::add_to_graph(&graph);
    let (main, call) = call_site(&graph, &java);
    let pointcut = "call(* app.Service.work())";
    let mut a = aspect(&graph, &java, "app/A", &[(AdviceKind::Before, "advise", pointcut)]);
    let b = aspect(&graph, &java, "app/B", &[(AdviceKind::Before, "advise", pointcut)]);
    let c = aspect(&graph, &java, "app/C", &[(AdviceKind::Before, "advise", pointcut)]);
    a.precedence = vec![
        parse_type_patterns("app.B, app.A").unwrap(),
        parse_type_patterns("app.C, app.B").unwrap(),
        parse_type_patterns("app.A, app.C").unwrap(),
    ];

    let output = weave(&graph, &java, &Settings::default(), vec![main], &[a, b, c], None);
    assert_eq!(output.types[0].outcome, Outcome::Failed);
    assert_eq!(
        output.types[0].class.methods[0].code_impl.as_ref().unwrap().items,
        vec![call, CodeItem::Branch(BranchInstruction::Return)]
    );
    let errors: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    for member in &["app.A.advise", "app.B.advise", "app.C.advise"] {
        assert!(errors[0].message.contains(member), "{}", errors[0].message);
    }
}
