use super::{AnnotationArg, ArgTest, CflowCounters, IfTest, Pointcut, TypeTest};
use crate::jvm::class_graph::{ClassGraph, ClassId, MethodId};
use crate::jvm::{BinaryName, FieldType, Name};
use crate::weaver::patterns::{
    ClassNamePattern, ElementPattern, ExactElement, NameSegment, ParamPattern, TypePattern,
};
use crate::weaver::syntax::PointcutExpr;
use crate::weaver::DeclarationError;
use std::collections::HashMap;

/// Parameter of an advice or named pointcut
#[derive(Clone, PartialEq, Debug)]
pub struct Formal<'g> {
    pub name: String,
    pub typ: FieldType<ClassId<'g>>,
}

/// Named pointcut that other pointcuts can refer to
#[derive(Clone, Debug)]
pub struct PointcutDefinition<'g> {
    /// Aspect declaring the pointcut
    pub aspect: ClassId<'g>,
    pub name: String,
    pub formals: Vec<Formal<'g>>,
    pub expr: PointcutExpr,

    /// Static `boolean` method implementing `if()` (called with the formals)
    pub condition: Option<MethodId<'g>>,
}

/// What a formal name stands for while resolving
#[derive(Clone, Debug)]
enum Scoped<'g> {
    /// Expose the value in this slot
    Bind {
        slot: usize,
        typ: FieldType<ClassId<'g>>,
    },

    /// Only test the type of the value
    Test(FieldType<ClassId<'g>>),
}

type Scope<'g> = HashMap<String, Scoped<'g>>;

/// Resolves pointcut expressions against named pointcuts and the class graph
pub struct Resolver<'a, 'g> {
    class_graph: &'a ClassGraph<'g>,
    definitions: &'a [PointcutDefinition<'g>],
    counters: &'a mut CflowCounters<'g>,
}

/// State of resolving one top-level pointcut
struct Context<'g> {
    /// Aspect on which cflow counters are allocated
    aspect: ClassId<'g>,

    /// Aspect whose pointcuts unqualified references refer to
    lookup_aspect: ClassId<'g>,

    /// Condition method of the named pointcut being inlined, with its arguments
    condition: Option<(MethodId<'g>, Vec<(String, Scoped<'g>)>)>,

    slot_names: Vec<String>,
    bound: Vec<bool>,
    in_disjunction: bool,
    in_cflow: bool,

    /// Named pointcuts currently being inlined
    references: Vec<String>,
}

impl<'g> Context<'g> {
    fn bind(&mut self, slot: usize) -> Result<(), DeclarationError> {
        let name = self.slot_names[slot].clone();
        if self.in_cflow {
            return Err(DeclarationError::BindingInCflow(name));
        }
        if self.in_disjunction || self.bound[slot] {
            return Err(DeclarationError::AmbiguousBinding(name));
        }
        self.bound[slot] = true;
        Ok(())
    }
}

impl<'a, 'g> Resolver<'a, 'g> {
    pub fn new(
        class_graph: &'a ClassGraph<'g>,
        definitions: &'a [PointcutDefinition<'g>],
        counters: &'a mut CflowCounters<'g>,
    ) -> Resolver<'a, 'g> {
        Resolver {
            class_graph,
            definitions,
            counters,
        }
    }

    /// Resolve the pointcut of an advice declared in `aspect`
    ///
    /// Formal `i` ends up in slot `i` of the exposed state, and every formal must be bound.
    pub fn resolve(
        &mut self,
        aspect: ClassId<'g>,
        expr: &PointcutExpr,
        formals: &[Formal<'g>],
    ) -> Result<Pointcut<'g>, DeclarationError> {
        let scope: Scope<'g> = formals
            .iter()
            .enumerate()
            .map(|(slot, formal)| {
                let scoped = Scoped::Bind {
                    slot,
                    typ: formal.typ,
                };
                (formal.name.clone(), scoped)
            })
            .collect();
        let mut cx = Context {
            aspect,
            lookup_aspect: aspect,
            condition: None,
            slot_names: formals.iter().map(|f| f.name.clone()).collect(),
            bound: vec![false; formals.len()],
            in_disjunction: false,
            in_cflow: false,
            references: vec![],
        };
        let pointcut = self.resolve_expr(expr, &scope, &mut cx)?;
        if let Some(unbound) = cx.bound.iter().position(|bound| !bound) {
            return Err(DeclarationError::UnboundFormal(formals[unbound].name.clone()));
        }
        Ok(pointcut)
    }

    fn resolve_expr(
        &mut self,
        expr: &PointcutExpr,
        scope: &Scope<'g>,
        cx: &mut Context<'g>,
    ) -> Result<Pointcut<'g>, DeclarationError> {
        Ok(match expr {
            PointcutExpr::Kinded { kind, signature } => Pointcut::Kinded {
                kind: *kind,
                signature: signature.clone(),
            },
            PointcutExpr::Handler(typ) => Pointcut::Handler(typ.clone()),
            PointcutExpr::StaticInitialization(typ) => {
                Pointcut::StaticInitialization(typ.clone())
            }
            PointcutExpr::Within(typ) => Pointcut::Within(typ.clone()),
            PointcutExpr::WithinCode(signature) => Pointcut::WithinCode(signature.clone()),
            PointcutExpr::This(typ) => Pointcut::This(self.type_test(typ, scope, cx)?),
            PointcutExpr::Target(typ) => Pointcut::Target(self.type_test(typ, scope, cx)?),
            PointcutExpr::Args(params) => {
                let ellipses = params
                    .iter()
                    .filter(|param| matches!(param, ParamPattern::Ellipsis))
                    .count();
                if ellipses > 1 {
                    return Err(DeclarationError::Invalid(String::from(
                        "args() can have at most one `..`",
                    )));
                }
                let mut tests = vec![];
                for param in params {
                    tests.push(match param {
                        ParamPattern::Ellipsis => ArgTest::Ellipsis,
                        ParamPattern::Type(typ) => ArgTest::Test(self.type_test(typ, scope, cx)?),
                    });
                }
                Pointcut::Args(tests)
            }
            PointcutExpr::Annotation {
                designator,
                annotation,
            } => {
                if let Some(name) = simple_name(annotation) {
                    if scope.contains_key(name) {
                        return Err(DeclarationError::UnsupportedBinding(format!(
                            "{}({})",
                            designator.keyword(),
                            name
                        )));
                    }
                }
                Pointcut::Annotation {
                    designator: *designator,
                    annotation: self.resolve_class(annotation, cx)?,
                }
            }
            PointcutExpr::AnnotationArgs(params) => {
                let mut args = vec![];
                for param in params {
                    args.push(match param {
                        ParamPattern::Ellipsis => AnnotationArg::Ellipsis,
                        ParamPattern::Type(typ) if typ.is_any() => AnnotationArg::Any,
                        ParamPattern::Type(typ) => {
                            if let Some(name) = formal_name(typ) {
                                if scope.contains_key(name) {
                                    return Err(DeclarationError::UnsupportedBinding(format!(
                                        "@args({})",
                                        name
                                    )));
                                }
                            }
                            match typ {
                                TypePattern::Element {
                                    element: ElementPattern::Class(class),
                                    include_subtypes: false,
                                    dimensions: 0,
                                } => AnnotationArg::Annotation(self.resolve_class(class, cx)?),
                                _ => return Err(DeclarationError::UnknownType(typ.to_string())),
                            }
                        }
                    });
                }
                Pointcut::AnnotationArgs(args)
            }
            PointcutExpr::Cflow { inner, below } => {
                let in_cflow = std::mem::replace(&mut cx.in_cflow, true);
                let inner = self.resolve_expr(inner, scope, cx);
                cx.in_cflow = in_cflow;
                let inner = inner?;
                let counter = self.counters.allocate(self.class_graph, cx.aspect);
                Pointcut::Cflow {
                    inner: Box::new(inner),
                    below: *below,
                    counter,
                }
            }
            PointcutExpr::If(Some(value)) => Pointcut::If(IfTest::Constant(*value)),
            PointcutExpr::If(None) => self.resolve_condition(cx)?,
            PointcutExpr::And(left, right) => {
                let left = self.resolve_expr(left, scope, cx)?;
                let right = self.resolve_expr(right, scope, cx)?;
                Pointcut::And(Box::new(left), Box::new(right))
            }
            PointcutExpr::Or(left, right) => {
                let in_disjunction = std::mem::replace(&mut cx.in_disjunction, true);
                let resolved = self
                    .resolve_expr(left, scope, cx)
                    .and_then(|left| Ok((left, self.resolve_expr(right, scope, cx)?)));
                cx.in_disjunction = in_disjunction;
                let (left, right) = resolved?;
                Pointcut::Or(Box::new(left), Box::new(right))
            }
            PointcutExpr::Not(inner) => {
                let in_disjunction = std::mem::replace(&mut cx.in_disjunction, true);
                let inner = self.resolve_expr(inner, scope, cx);
                cx.in_disjunction = in_disjunction;
                Pointcut::Not(Box::new(inner?))
            }
            PointcutExpr::Reference {
                aspect,
                name,
                arguments,
            } => self.resolve_reference(aspect.as_ref(), name, arguments, scope, cx)?,
        })
    }

    fn resolve_reference(
        &mut self,
        aspect: Option<&ClassNamePattern>,
        name: &str,
        arguments: &[TypePattern],
        scope: &Scope<'g>,
        cx: &mut Context<'g>,
    ) -> Result<Pointcut<'g>, DeclarationError> {
        let definitions = self.definitions;
        let definition = find_definition(definitions, aspect, name, cx.lookup_aspect)
            .ok_or_else(|| DeclarationError::UnresolvedPointcutName(name.to_owned()))?;

        let qualified = format!("{}.{}", definition.aspect.name.java_name(), definition.name);
        if let Some(start) = cx.references.iter().position(|r| r == &qualified) {
            let mut cycle = cx.references[start..].to_vec();
            cycle.push(qualified);
            return Err(DeclarationError::CircularPointcut(cycle));
        }
        if arguments.len() != definition.formals.len() {
            return Err(DeclarationError::ArgumentCount {
                pointcut: qualified,
                expected: definition.formals.len(),
                found: arguments.len(),
            });
        }

        // Formals of the definition stand for whatever the arguments stand for here
        let mut inner_scope: Scope<'g> = HashMap::new();
        let mut condition_args = vec![];
        for (formal, argument) in definition.formals.iter().zip(arguments) {
            let scoped = match formal_name(argument).and_then(|name| scope.get(name)) {
                Some(scoped) => scoped.clone(),
                None if argument.is_any() => Scoped::Test(formal.typ),
                None => Scoped::Test(self.resolve_type(argument, cx)?),
            };
            condition_args.push((formal.name.clone(), scoped.clone()));
            inner_scope.insert(formal.name.clone(), scoped);
        }

        cx.references.push(qualified);
        let lookup_aspect = std::mem::replace(&mut cx.lookup_aspect, definition.aspect);
        let condition = std::mem::replace(
            &mut cx.condition,
            definition.condition.map(|method| (method, condition_args)),
        );
        let resolved = self.resolve_expr(&definition.expr, &inner_scope, cx);
        cx.condition = condition;
        cx.lookup_aspect = lookup_aspect;
        cx.references.pop();
        resolved
    }

    /// `if()`: call the condition method of the enclosing named pointcut
    ///
    /// Every parameter of the method has to be bound by a designator to the left of the `if()`.
    fn resolve_condition(&mut self, cx: &mut Context<'g>) -> Result<Pointcut<'g>, DeclarationError> {
        let (method, arguments) = match &cx.condition {
            Some(condition) => condition,
            None => {
                return Err(DeclarationError::Invalid(String::from(
                    "if() is only allowed in a named pointcut with a condition method",
                )))
            }
        };
        if !method.is_static() || method.descriptor.return_type != Some(FieldType::boolean()) {
            return Err(DeclarationError::Invalid(format!(
                "condition {} must be a static boolean method",
                method.name
            )));
        }
        let mut formals = vec![];
        for (name, scoped) in arguments {
            match scoped {
                Scoped::Bind { .. } if cx.in_cflow => {
                    return Err(DeclarationError::BindingInCflow(name.clone()))
                }
                Scoped::Bind { slot, .. } if cx.bound[*slot] => formals.push(*slot),
                Scoped::Bind { .. } => return Err(DeclarationError::UnboundFormal(name.clone())),
                Scoped::Test(_) => {
                    return Err(DeclarationError::UnsupportedBinding(format!(
                        "if() needs `{}` to be bound",
                        name
                    )))
                }
            }
        }
        Ok(Pointcut::If(IfTest::Call {
            method: *method,
            formals,
        }))
    }

    fn type_test(
        &mut self,
        pattern: &TypePattern,
        scope: &Scope<'g>,
        cx: &mut Context<'g>,
    ) -> Result<TypeTest<'g>, DeclarationError> {
        if let Some(scoped) = formal_name(pattern).and_then(|name| scope.get(name)) {
            return Ok(match scoped {
                Scoped::Bind { slot, typ } => {
                    cx.bind(*slot)?;
                    TypeTest::Bind {
                        formal: *slot,
                        typ: *typ,
                    }
                }
                Scoped::Test(typ) => TypeTest::Type(*typ),
            });
        }
        if pattern.is_any() {
            return Ok(TypeTest::Any);
        }
        Ok(TypeTest::Type(self.resolve_type(pattern, cx)?))
    }

    /// Exact type named by a pattern
    fn resolve_type(
        &self,
        pattern: &TypePattern,
        cx: &Context<'g>,
    ) -> Result<FieldType<ClassId<'g>>, DeclarationError> {
        let exact = pattern
            .exact()
            .ok_or_else(|| DeclarationError::UnknownType(pattern.to_string()))?;
        let mut typ = match &exact.element {
            ExactElement::Primitive(base) => FieldType::Base(*base),
            ExactElement::Class(class) => FieldType::object(self.resolve_class(class, cx)?),
        };
        for _ in 0..exact.dimensions {
            typ = FieldType::array(typ);
        }
        Ok(typ)
    }

    /// Look up a class by name
    ///
    /// Qualified names are taken as they are (a missing class is fine). Simple names are tried in
    /// the package of the aspect, then in `java.lang`, then against every known class.
    fn resolve_class(
        &self,
        pattern: &ClassNamePattern,
        cx: &Context<'g>,
    ) -> Result<ClassId<'g>, DeclarationError> {
        let unknown = || DeclarationError::UnknownType(pattern.to_string());
        let exact = pattern.exact_name().ok_or_else(unknown)?;
        if !pattern.is_simple() {
            let name = BinaryName::from_string(exact).map_err(|_| unknown())?;
            return Ok(self.class_graph.lookup_or_missing(&name));
        }

        let package = cx.lookup_aspect.name.package();
        let mut candidates = vec![];
        if !package.is_empty() {
            candidates.push(format!("{}/{}", package, exact));
        }
        candidates.push(format!("java/lang/{}", exact));
        candidates.push(exact.clone());
        for candidate in candidates {
            if let Ok(name) = BinaryName::from_string(candidate) {
                if let Some(class) = self.class_graph.lookup_class(&name) {
                    if !class.is_missing() {
                        return Ok(class);
                    }
                }
            }
        }

        let mut matching = self
            .class_graph
            .classes()
            .into_iter()
            .filter(|class| !class.is_missing() && class.name.simple_name() == exact);
        match (matching.next(), matching.next()) {
            (Some(class), None) => Ok(class),
            _ => Err(unknown()),
        }
    }
}

/// Definition a reference refers to
///
/// Unqualified references look in the aspect and its super-aspects first (nearest first), then
/// fall back to a definition with that name in any aspect, provided there is only one.
fn find_definition<'a, 'g>(
    definitions: &'a [PointcutDefinition<'g>],
    aspect: Option<&ClassNamePattern>,
    name: &str,
    lookup_aspect: ClassId<'g>,
) -> Option<&'a PointcutDefinition<'g>> {
    let named = move || definitions.iter().filter(move |d| d.name == name);
    if let Some(aspect) = aspect {
        return named().find(|d| aspect.matches(&d.aspect.name));
    }
    for class in lookup_aspect.all_supertypes() {
        if let Some(definition) = named().find(|d| d.aspect == class) {
            return Some(definition);
        }
    }
    let mut anywhere = named();
    match (anywhere.next(), anywhere.next()) {
        (Some(definition), None) => Some(definition),
        _ => None,
    }
}

/// Name of a formal, if the pattern could be one
fn formal_name(pattern: &TypePattern) -> Option<&str> {
    match pattern {
        TypePattern::Element {
            element: ElementPattern::Class(class),
            include_subtypes: false,
            dimensions: 0,
        } => simple_name(class),
        _ => None,
    }
}

fn simple_name(class: &ClassNamePattern) -> Option<&str> {
    match class.segments.as_slice() {
        [NameSegment::Name(name)] if name.is_exact() => Some(name.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{
        ClassData, ClassGraphArenas, ClassOrigin, JavaLibrary, MethodData,
    };
    use crate::jvm::{ClassAccessFlags, MethodAccessFlags, MethodDescriptor, UnqualifiedName};
    use crate::weaver::syntax::parse_pointcut;

    fn class<'g>(graph: &ClassGraph<'g>, java: &JavaLibrary<'g>, name: &str) -> ClassId<'g> {
        graph.add_class(ClassData::new(
            BinaryName::from_string(name.to_owned()).unwrap(),
            ClassOrigin::Woven,
            Some(java.object),
            vec![],
            ClassAccessFlags::PUBLIC,
        ))
    }

    fn definition<'g>(
        aspect: ClassId<'g>,
        name: &str,
        formals: Vec<Formal<'g>>,
        source: &str,
    ) -> PointcutDefinition<'g> {
        PointcutDefinition {
            aspect,
            name: name.to_owned(),
            formals,
            expr: parse_pointcut(source).unwrap(),
            condition: None,
        }
    }

    fn counters<'g>(java: &JavaLibrary<'g>) -> CflowCounters<'g> {
        CflowCounters::new(UnqualifiedName::CFLOW_COUNTER_PREFIX, java.cflow_counter.class)
    }

    fn resolve_source<'g>(
        resolver: &mut Resolver<'_, 'g>,
        aspect: ClassId<'g>,
        source: &str,
        formals: &[Formal<'g>],
    ) -> Result<Pointcut<'g>, DeclarationError> {
        resolver.resolve(aspect, &parse_pointcut(source).unwrap(), formals)
    }

    #[test]
    fn references_are_inlined() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let aspect = class(&graph, &java, "app/Tracing");
        let service = class(&graph, &java, "app/Service");
        let mut counters = counters(&java);

        let definitions = vec![definition(
            aspect,
            "calls",
            vec![Formal {
                name: String::from("s"),
                typ: FieldType::object(java.object),
            }],
            "call(* *(..)) && target(s)",
        )];
        let mut resolver = Resolver::new(&graph, &definitions, &mut counters);

        let formals = vec![Formal {
            name: String::from("svc"),
            typ: FieldType::object(service),
        }];
        let resolved = resolver
            .resolve(aspect, &parse_pointcut("calls(svc)").unwrap(), &formals)
            .unwrap();
        match resolved {
            Pointcut::And(_, right) => assert_eq!(
                *right,
                Pointcut::Target(TypeTest::Bind {
                    formal: 0,
                    typ: FieldType::object(service)
                })
            ),
            other => panic!("unexpected {}", other),
        }

        // Passing a type instead of a formal turns the binding into a test
        let resolved = resolver
            .resolve(aspect, &parse_pointcut("calls(Service)").unwrap(), &[])
            .unwrap();
        match resolved {
            Pointcut::And(_, right) => {
                assert_eq!(*right, Pointcut::Target(TypeTest::Type(FieldType::object(service))))
            }
            other => panic!("unexpected {}", other),
        }

        // A wildcard keeps the declared type of the formal
        let resolved = resolver
            .resolve(aspect, &parse_pointcut("calls(*)").unwrap(), &[])
            .unwrap();
        match resolved {
            Pointcut::And(_, right) => assert_eq!(
                *right,
                Pointcut::Target(TypeTest::Type(FieldType::object(java.object)))
            ),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn declaration_errors() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let aspect = class(&graph, &java, "app/Tracing");
        let mut counters = counters(&java);
        let definitions = vec![
            definition(aspect, "a", vec![], "b() || within(*)"),
            definition(aspect, "b", vec![], "a()"),
        ];
        let mut resolver = Resolver::new(&graph, &definitions, &mut counters);
        let x = || {
            vec![Formal {
                name: String::from("x"),
                typ: FieldType::int(),
            }]
        };

        assert_eq!(
            resolve_source(&mut resolver, aspect, "missing()", &[]),
            Err(DeclarationError::UnresolvedPointcutName(String::from("missing")))
        );
        assert!(matches!(
            resolve_source(&mut resolver, aspect, "a()", &[]),
            Err(DeclarationError::CircularPointcut(cycle)) if cycle.len() == 3
        ));
        assert_eq!(
            resolve_source(&mut resolver, aspect, "execution(* *(..))", &x()),
            Err(DeclarationError::UnboundFormal(String::from("x")))
        );
        assert_eq!(
            resolve_source(&mut resolver, aspect, "args(x) || args(*, x)", &x()),
            Err(DeclarationError::AmbiguousBinding(String::from("x")))
        );
        assert_eq!(
            resolve_source(&mut resolver, aspect, "args(x) && args(x)", &x()),
            Err(DeclarationError::AmbiguousBinding(String::from("x")))
        );
        assert_eq!(
            resolve_source(&mut resolver, aspect, "cflow(args(x))", &x()),
            Err(DeclarationError::BindingInCflow(String::from("x")))
        );
        assert!(matches!(
            resolve_source(&mut resolver, aspect, "@annotation(x)", &x()),
            Err(DeclarationError::UnsupportedBinding(_))
        ));
        assert!(matches!(
            resolve_source(&mut resolver, aspect, "target(Nowhere)", &[]),
            Err(DeclarationError::UnknownType(_))
        ));
        assert!(matches!(
            resolve_source(&mut resolver, aspect, "target(java.util.List+)", &[]),
            Err(DeclarationError::UnknownType(_))
        ));
        assert!(matches!(
            resolve_source(&mut resolver, aspect, "if()", &[]),
            Err(DeclarationError::Invalid(_))
        ));
    }

    #[test]
    fn conditions_and_counters() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let aspect = class(&graph, &java, "app/Tracing");
        let check = graph.add_method(MethodData {
            class: aspect,
            name: UnqualifiedName::from_string(String::from("positive")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::int()],
                return_type: Some(FieldType::boolean()),
            },
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            annotations: vec![],
        });
        let int_formal = |name: &str| Formal {
            name: name.to_owned(),
            typ: FieldType::int(),
        };
        let mut positive =
            definition(aspect, "positive", vec![int_formal("n")], "args(n) && if()");
        positive.condition = Some(check);
        let mut early = definition(aspect, "early", vec![int_formal("n")], "if() && args(n)");
        early.condition = Some(check);
        let definitions = vec![positive, early];

        let mut counters = counters(&java);
        let mut resolver = Resolver::new(&graph, &definitions, &mut counters);
        let formals = vec![int_formal("v")];

        let resolved = resolver
            .resolve(aspect, &parse_pointcut("positive(v)").unwrap(), &formals)
            .unwrap();
        assert_eq!(
            resolved,
            Pointcut::And(
                Box::new(Pointcut::Args(vec![ArgTest::Test(TypeTest::Bind {
                    formal: 0,
                    typ: FieldType::int()
                })])),
                Box::new(Pointcut::If(IfTest::Call {
                    method: check,
                    formals: vec![0]
                })),
            )
        );
        assert_eq!(
            resolver.resolve(aspect, &parse_pointcut("early(v)").unwrap(), &formals),
            Err(DeclarationError::UnboundFormal(String::from("n")))
        );

        let first = resolver
            .resolve(aspect, &parse_pointcut("cflow(execution(* *(..)))").unwrap(), &[])
            .unwrap();
        let second = resolver
            .resolve(aspect, &parse_pointcut("cflowbelow(within(*))").unwrap(), &[])
            .unwrap();
        let counter = |pointcut: &Pointcut<'_>| pointcut.cflow_entries()[0].counter.name.clone();
        assert_eq!(counter(&first).as_str(), "ajc$cflowCounter$0");
        assert_eq!(counter(&second).as_str(), "ajc$cflowCounter$1");
        assert_eq!(counters.on(aspect).count(), 2);
    }
}
