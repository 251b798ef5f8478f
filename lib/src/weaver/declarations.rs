use crate::jvm::class_graph::{
    AnnotationData, Assignable, ClassGraph, ClassId, JavaLibrary, MethodId,
};
use crate::jvm::{
    BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
    Name, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::RefId;
use crate::weaver::advice::{Advice, AdviceAction, AdviceArg, AdviceKind};
use crate::weaver::patterns::TypePattern;
use crate::weaver::pointcut::{CflowCounters, Formal, PointcutDefinition, Resolver};
use crate::weaver::syntax::{parse_pointcut, parse_type_patterns, PointcutExpr};
use crate::weaver::{DeclarationError, Diagnostic, Settings, SourceLocation};
use log::debug;

/// Aspect: named pointcuts, advice, and precedence declarations on an aspect class
///
/// Abstract aspects are never woven themselves, but concrete aspects extending them inherit
/// their advice and named pointcuts.
#[derive(Clone, Debug)]
pub struct Aspect<'g> {
    pub class: ClassId<'g>,
    pub pointcuts: Vec<PointcutDeclaration<'g>>,

    /// Advice, in declaration order
    pub advice: Vec<AdviceDeclaration<'g>>,

    /// `declare precedence` lists, highest precedence first
    pub precedence: Vec<Vec<TypePattern>>,
}

#[derive(Clone, Debug)]
pub struct PointcutDeclaration<'g> {
    pub name: String,
    pub formals: Vec<Formal<'g>>,

    /// Missing for abstract pointcuts, which concrete sub-aspects have to define
    pub expression: Option<PointcutExpr>,

    /// Method implementing `if()`
    pub condition: Option<MethodId<'g>>,
}

#[derive(Clone, Debug)]
pub struct AdviceDeclaration<'g> {
    pub kind: AdviceKind,

    /// Method holding the advice body
    pub method: MethodId<'g>,

    /// Names of the method parameters
    pub arg_names: Vec<String>,
    pub pointcut: PointcutExpr,

    /// Parameter receiving the returned value (only `after returning`)
    pub returning: Option<String>,

    /// Parameter receiving the exception (only `after throwing`)
    pub throwing: Option<String>,
}

impl<'g> Aspect<'g> {
    /// Read the declarations of an `@Aspect` annotated class
    ///
    /// Returns `None` for classes that aren't aspects. Malformed declarations are skipped and
    /// reported, the rest of the aspect is still usable.
    pub fn from_annotations(
        class_graph: &ClassGraph<'g>,
        class: ClassId<'g>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Aspect<'g>> {
        if !class.has_annotation(&BinaryName::ASPECT) {
            return None;
        }
        let mut aspect = Aspect {
            class,
            pointcuts: vec![],
            advice: vec![],
            precedence: vec![],
        };

        if let Some(annotation) = class.annotation(&BinaryName::DECLARE_PRECEDENCE) {
            let source = annotation
                .string_element(UnqualifiedName::VALUE.as_str())
                .unwrap_or("");
            match parse_type_patterns(source) {
                Ok(list) => aspect.precedence.push(list),
                Err(error) => diagnostics.push(Diagnostic::error(
                    DeclarationError::Syntax {
                        pointcut: source.to_owned(),
                        error,
                    }
                    .to_string(),
                    SourceLocation::class(class.name.as_str()),
                )),
            }
        }

        for method in class.0.methods.iter() {
            let method = RefId(method);
            let pointcut = method
                .annotations
                .iter()
                .find(|a| a.type_name == BinaryName::POINTCUT);
            let result = if let Some(annotation) = pointcut {
                pointcut_declaration(class_graph, method, annotation)
                    .map(|pointcut| aspect.pointcuts.push(pointcut))
            } else if let Some((kind, annotation)) = advice_annotation(&method.annotations) {
                advice_declaration(kind, method, annotation)
                    .map(|advice| aspect.advice.push(advice))
            } else {
                Ok(())
            };
            if let Err(error) = result {
                diagnostics.push(Diagnostic::error(error.to_string(), member_location(method)));
            }
        }
        Some(aspect)
    }

    pub fn is_abstract(&self) -> bool {
        self.class.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }
}

fn advice_annotation(annotations: &[AnnotationData]) -> Option<(AdviceKind, &AnnotationData)> {
    annotations.iter().find_map(|annotation| {
        let kind = if annotation.type_name == BinaryName::BEFORE {
            AdviceKind::Before
        } else if annotation.type_name == BinaryName::AFTER_RETURNING {
            AdviceKind::AfterReturning
        } else if annotation.type_name == BinaryName::AFTER_THROWING {
            AdviceKind::AfterThrowing
        } else if annotation.type_name == BinaryName::AFTER {
            AdviceKind::After
        } else {
            return None;
        };
        Some((kind, annotation))
    })
}

/// Parameter names, either from `argNames` or nothing if there are no parameters
fn arg_names(
    method: MethodId<'_>,
    annotation: &AnnotationData,
) -> Result<Vec<String>, DeclarationError> {
    let element = annotation.string_array_element(UnqualifiedName::ARGNAMES.as_str());
    let names: Vec<String> = match element {
        Some(names) => names
            .iter()
            .flat_map(|names| names.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect(),
        None => vec![],
    };
    let expected = method.descriptor.parameters.len();
    if names.len() != expected {
        return Err(DeclarationError::Invalid(format!(
            "{} has {} parameters but argNames names {}",
            method.name.as_str(),
            expected,
            names.len()
        )));
    }
    Ok(names)
}

fn parse(source: &str) -> Result<PointcutExpr, DeclarationError> {
    parse_pointcut(source).map_err(|error| DeclarationError::Syntax {
        pointcut: source.to_owned(),
        error,
    })
}

fn pointcut_declaration<'g>(
    class_graph: &ClassGraph<'g>,
    method: MethodId<'g>,
    annotation: &AnnotationData,
) -> Result<PointcutDeclaration<'g>, DeclarationError> {
    let names = arg_names(method, annotation)?;
    let formals = names
        .into_iter()
        .zip(&method.descriptor.parameters)
        .map(|(name, typ)| Formal {
            name,
            typ: class_graph.resolve_field_type(typ),
        })
        .collect();
    let source = annotation
        .string_element(UnqualifiedName::VALUE.as_str())
        .unwrap_or("");
    let expression = if source.trim().is_empty() {
        if !method.access_flags.contains(MethodAccessFlags::ABSTRACT) {
            return Err(DeclarationError::Invalid(format!(
                "pointcut {} has no expression but isn't abstract",
                method.name.as_str()
            )));
        }
        None
    } else {
        Some(parse(source)?)
    };
    let condition = if method.descriptor.return_type == Some(FieldType::boolean()) {
        Some(method)
    } else {
        None
    };
    Ok(PointcutDeclaration {
        name: method.name.as_str().to_owned(),
        formals,
        expression,
        condition,
    })
}

fn advice_declaration<'g>(
    kind: AdviceKind,
    method: MethodId<'g>,
    annotation: &AnnotationData,
) -> Result<AdviceDeclaration<'g>, DeclarationError> {
    if method.descriptor.return_type.is_some() {
        return Err(DeclarationError::Invalid(format!(
            "{} advice {} must return void",
            kind,
            method.name.as_str()
        )));
    }
    let value = annotation.string_element(UnqualifiedName::VALUE.as_str());
    let source = match kind {
        AdviceKind::AfterReturning | AdviceKind::AfterThrowing => annotation
            .string_element(UnqualifiedName::POINTCUT.as_str())
            .filter(|pointcut| !pointcut.trim().is_empty())
            .or(value),
        _ => value,
    };
    let source = source.ok_or_else(|| {
        DeclarationError::Invalid(format!(
            "{} advice {} has no pointcut",
            kind,
            method.name.as_str()
        ))
    })?;

    let arg_names = arg_names(method, annotation)?;
    let extra = |element: &UnqualifiedName| -> Result<Option<String>, DeclarationError> {
        match annotation.string_element(element.as_str()).map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) if arg_names.iter().any(|arg| arg == name) => Ok(Some(name.to_owned())),
            Some(name) => Err(DeclarationError::Invalid(format!(
                "`{}` names no parameter of {}",
                name,
                method.name.as_str()
            ))),
        }
    };
    let returning = match kind {
        AdviceKind::AfterReturning => extra(&UnqualifiedName::RETURNING)?,
        _ => None,
    };
    let throwing = match kind {
        AdviceKind::AfterThrowing => extra(&UnqualifiedName::THROWING)?,
        _ => None,
    };

    Ok(AdviceDeclaration {
        kind,
        method,
        arg_names,
        pointcut: parse(source)?,
        returning,
        throwing,
    })
}

pub(crate) fn member_location(method: MethodId<'_>) -> SourceLocation {
    SourceLocation {
        member: Some(format!(
            "{}{}",
            method.name.as_str(),
            method.descriptor.render()
        )),
        ..SourceLocation::class(method.class.name.as_str())
    }
}

/// Everything weaving needs from the aspects, with pointcuts resolved
pub struct ResolvedAspects<'g> {
    /// Advice of every concrete aspect, followed by the cflow entries their pointcuts need
    pub advice: Vec<Advice<'g>>,

    /// `declare precedence` lists, each with the aspect declaring it
    pub precedence: Vec<(ClassId<'g>, Vec<TypePattern>)>,

    /// Cflow counter fields added to aspects
    pub counters: CflowCounters<'g>,
}

impl<'g> ResolvedAspects<'g> {
    /// Resolve the pointcuts of all advice
    ///
    /// Advice whose declaration doesn't resolve is dropped and reported.
    pub fn resolve(
        class_graph: &ClassGraph<'g>,
        java: &JavaLibrary<'g>,
        settings: &Settings,
        aspects: &[Aspect<'g>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ResolvedAspects<'g> {
        let definitions: Vec<PointcutDefinition<'g>> = aspects
            .iter()
            .flat_map(|aspect| {
                aspect.pointcuts.iter().filter_map(move |pointcut| {
                    Some(PointcutDefinition {
                        aspect: aspect.class,
                        name: pointcut.name.clone(),
                        formals: pointcut.formals.clone(),
                        expr: pointcut.expression.clone()?,
                        condition: pointcut.condition,
                    })
                })
            })
            .collect();
        let mut counters = CflowCounters::new(
            settings.cflow_counter_prefix.clone(),
            java.cflow_counter.class,
        );

        let mut advice = vec![];
        let mut cflow_entries = vec![];
        for aspect in aspects.iter().filter(|aspect| !aspect.is_abstract()) {
            let mut order = 0;
            for declaration in inherited_advice(aspect, aspects) {
                let resolved = {
                    let mut resolver = Resolver::new(class_graph, &definitions, &mut counters);
                    resolve_advice(
                        &mut resolver,
                        class_graph,
                        java,
                        aspect.class,
                        declaration,
                        order,
                    )
                };
                order += 1;
                match resolved {
                    Ok(resolved) => {
                        for entry in resolved.pointcut.cflow_entries() {
                            cflow_entries.push(Advice::cflow_entry(
                                aspect.class,
                                entry.inner.clone(),
                                entry.counter,
                                entry.below,
                                0,
                            ));
                        }
                        debug!("resolved {}: {}", resolved.describe(), resolved.pointcut);
                        advice.push(resolved);
                    }
                    Err(error) => diagnostics.push(Diagnostic::error(
                        error.to_string(),
                        member_location(declaration.method),
                    )),
                }
            }
        }
        for (order, mut entry) in cflow_entries.into_iter().enumerate() {
            entry.declaration_order = advice.len() + order;
            advice.push(entry);
        }

        let precedence = aspects
            .iter()
            .flat_map(|aspect| {
                aspect
                    .precedence
                    .iter()
                    .map(move |list| (aspect.class, list.clone()))
            })
            .collect();
        ResolvedAspects {
            advice,
            precedence,
            counters,
        }
    }
}

/// Advice of the aspect and of the abstract aspects it extends, most general aspect first
fn inherited_advice<'a, 'g>(
    aspect: &'a Aspect<'g>,
    aspects: &'a [Aspect<'g>],
) -> Vec<&'a AdviceDeclaration<'g>> {
    let mut chain = vec![aspect];
    let mut next = aspect.class.superclass;
    while let Some(class) = next {
        if let Some(super_aspect) = aspects.iter().find(|a| a.class == class && a.is_abstract()) {
            chain.push(super_aspect);
        }
        next = class.superclass;
    }
    chain
        .into_iter()
        .rev()
        .flat_map(|aspect| aspect.advice.iter())
        .collect()
}

fn resolve_advice<'g>(
    resolver: &mut Resolver<'_, 'g>,
    class_graph: &ClassGraph<'g>,
    java: &JavaLibrary<'g>,
    aspect: ClassId<'g>,
    declaration: &AdviceDeclaration<'g>,
    declaration_order: usize,
) -> Result<Advice<'g>, DeclarationError> {
    let method = declaration.method;
    let mut formals = vec![];
    let mut args = vec![];
    let mut extra_formal = None;
    for (name, typ) in declaration.arg_names.iter().zip(&method.descriptor.parameters) {
        let typ = class_graph.resolve_field_type(typ);
        if declaration.returning.as_ref() == Some(name) {
            args.push(AdviceArg::Returned);
            extra_formal = Some(typ);
        } else if declaration.throwing.as_ref() == Some(name) {
            match typ {
                FieldType::Ref(RefType::Object(class))
                    if class.is_assignable(&java.throwable) == Some(true) => {}
                _ => {
                    return Err(DeclarationError::Invalid(format!(
                        "`{}` must be a Throwable",
                        name
                    )))
                }
            }
            args.push(AdviceArg::Thrown);
            extra_formal = Some(typ);
        } else {
            args.push(AdviceArg::Formal(formals.len()));
            formals.push(Formal {
                name: name.clone(),
                typ,
            });
        }
    }

    let pointcut = resolver.resolve(aspect, &declaration.pointcut, &formals)?;

    let aspect_of = if method.is_static() {
        None
    } else {
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::object(aspect.name.clone())),
        };
        match aspect.declared_method(&UnqualifiedName::ASPECTOF, &descriptor) {
            Some(aspect_of) if aspect_of.is_static() => Some(aspect_of),
            _ => {
                return Err(DeclarationError::MissingAspectOf(aspect.name.java_name()))
            }
        }
    };

    Ok(Advice {
        aspect,
        kind: declaration.kind,
        pointcut,
        action: AdviceAction::Invoke {
            method,
            args,
            aspect_of,
        },
        formals: formals.len(),
        extra_formal,
        declaration_order,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{
        AnnotationValue, ClassData, ClassGraphArenas, ClassOrigin, MethodData,
    };
    use crate::jvm::ConstantData;
    use crate::weaver::pointcut::Pointcut;

    fn annotation(name: BinaryName, elements: &[(&str, &str)]) -> AnnotationData {
        let mut annotation = AnnotationData::new(name, false);
        for (element, value) in elements {
            annotation.elements.push((
                element.to_string(),
                AnnotationValue::Constant(ConstantData::String(value.to_string())),
            ));
        }
        annotation
    }

    fn aspect_class<'g>(
        graph: &ClassGraph<'g>,
        java: &JavaLibrary<'g>,
        name: &str,
        superclass: Option<ClassId<'g>>,
        access_flags: ClassAccessFlags,
        annotations: Vec<AnnotationData>,
    ) -> ClassId<'g> {
        let mut data = ClassData::new(
            BinaryName::from_string(name.to_owned()).unwrap(),
            ClassOrigin::Woven,
            Some(superclass.unwrap_or(java.object)),
            vec![],
            access_flags,
        );
        data.annotations = annotations;
        graph.add_class(data)
    }

    fn method<'g>(
        graph: &ClassGraph<'g>,
        class: ClassId<'g>,
        name: &str,
        parameters: Vec<FieldType<BinaryName>>,
        return_type: Option<FieldType<BinaryName>>,
        access_flags: MethodAccessFlags,
        annotations: Vec<AnnotationData>,
    ) -> MethodId<'g> {
        graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
            descriptor: MethodDescriptor {
                parameters,
                return_type,
            },
            access_flags,
            annotations,
        })
    }

    fn aspect_of<'g>(graph: &ClassGraph<'g>, class: ClassId<'g>) {
        method(
            graph,
            class,
            "aspectOf",
            vec![],
            Some(FieldType::object(class.name.clone())),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![],
        );
    }

    #[test]
    fn read_annotated_aspect() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let tracing = aspect_class(
            &graph,
            &java,
            "app/Tracing",
            None,
            ClassAccessFlags::PUBLIC,
            vec![
                annotation(BinaryName::ASPECT, &[]),
                annotation(BinaryName::DECLARE_PRECEDENCE, &[("value", "app.Tracing, *")]),
            ],
        );
        aspect_of(&graph, tracing);
        method(
            &graph,
            tracing,
            "services",
            vec![FieldType::object(BinaryName::STRING)],
            None,
            MethodAccessFlags::PUBLIC,
            vec![annotation(
                BinaryName::POINTCUT,
                &[("value", "call(* app.Service.*(..)) && args(name)"), ("argNames", "name")],
            )],
        );
        method(
            &graph,
            tracing,
            "log",
            vec![FieldType::object(BinaryName::STRING)],
            None,
            MethodAccessFlags::PUBLIC,
            vec![annotation(BinaryName::BEFORE, &[("value", "services(n)"), ("argNames", "n")])],
        );
        method(
            &graph,
            tracing,
            "done",
            vec![FieldType::object(BinaryName::OBJECT)],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![annotation(
                BinaryName::AFTER_RETURNING,
                &[
                    ("pointcut", "call(* app.Service.*(..))"),
                    ("returning", "result"),
                    ("argNames", "result"),
                ],
            )],
        );
        method(
            &graph,
            tracing,
            "broken",
            vec![],
            None,
            MethodAccessFlags::PUBLIC,
            vec![annotation(BinaryName::AFTER, &[("value", "call(* *(..)")])],
        );

        let mut diagnostics = vec![];
        let aspect = Aspect::from_annotations(&graph, tracing, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].location.member.as_deref() == Some("broken()V"));
        assert_eq!(aspect.pointcuts.len(), 1);
        assert_eq!(aspect.advice.len(), 2);
        assert_eq!(aspect.advice[1].kind, AdviceKind::AfterReturning);
        assert_eq!(aspect.advice[1].returning.as_deref(), Some("result"));
        assert_eq!(aspect.precedence.len(), 1);

        let settings = Settings::default();
        let resolved = ResolvedAspects::resolve(&graph, &java, &settings, &[aspect], &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(resolved.advice.len(), 2);
        assert!(matches!(
            &resolved.advice[0].action,
            AdviceAction::Invoke { aspect_of: Some(_), args, .. } if args == &[AdviceArg::Formal(0)]
        ));
        assert!(matches!(
            &resolved.advice[1].action,
            AdviceAction::Invoke { aspect_of: None, args, .. } if args == &[AdviceArg::Returned]
        ));
        assert_eq!(resolved.advice[1].formals, 0);
        assert_eq!(resolved.precedence.len(), 1);
    }

    #[test]
    fn not_an_aspect() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let plain = aspect_class(&graph, &java, "app/Plain", None, ClassAccessFlags::PUBLIC, vec![]);
        let mut diagnostics = vec![];
        assert!(Aspect::from_annotations(&graph, plain, &mut diagnostics).is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn declaration_problems() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let checks = aspect_class(
            &graph,
            &java,
            "app/Checks",
            None,
            ClassAccessFlags::PUBLIC,
            vec![annotation(BinaryName::ASPECT, &[])],
        );

        // Instance advice without `aspectOf()`
        method(
            &graph,
            checks,
            "instance",
            vec![],
            None,
            MethodAccessFlags::PUBLIC,
            vec![annotation(BinaryName::BEFORE, &[("value", "execution(* *(..))")])],
        );

        // Parameters without names
        method(
            &graph,
            checks,
            "unnamed",
            vec![FieldType::int()],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![annotation(BinaryName::BEFORE, &[("value", "args(x)")])],
        );

        // Throwing something that isn't an exception
        method(
            &graph,
            checks,
            "thrown",
            vec![FieldType::object(BinaryName::STRING)],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![annotation(
                BinaryName::AFTER_THROWING,
                &[("value", "call(* *(..))"), ("throwing", "e"), ("argNames", "e")],
            )],
        );

        // Cflow gets its entry advice
        method(
            &graph,
            checks,
            "nested",
            vec![],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![annotation(
                BinaryName::BEFORE,
                &[("value", "call(* *(..)) && cflowbelow(execution(* app.Main.main(..)))")],
            )],
        );

        let mut diagnostics = vec![];
        let aspect = Aspect::from_annotations(&graph, checks, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("argNames"));

        let resolved =
            ResolvedAspects::resolve(&graph, &java, &Settings::default(), &[aspect], &mut diagnostics);
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics[1].message.contains("aspectOf"));
        assert!(diagnostics[2].message.contains("Throwable"));

        assert_eq!(resolved.advice.len(), 2);
        assert!(resolved.advice[1].is_cflow_entry(true));
        assert!(matches!(resolved.advice[1].pointcut, Pointcut::Kinded { .. }));
        assert_eq!(resolved.advice[1].declaration_order, 1);
        assert_eq!(resolved.counters.all().len(), 1);
    }

    #[test]
    fn abstract_aspects() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let base = aspect_class(
            &graph,
            &java,
            "app/Base",
            None,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
            vec![annotation(BinaryName::ASPECT, &[])],
        );
        method(
            &graph,
            base,
            "scope",
            vec![],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            vec![annotation(BinaryName::POINTCUT, &[])],
        );
        method(
            &graph,
            base,
            "enter",
            vec![],
            None,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            vec![annotation(BinaryName::BEFORE, &[("value", "scope()")])],
        );
        let concrete = aspect_class(
            &graph,
            &java,
            "app/Concrete",
            Some(base),
            ClassAccessFlags::PUBLIC,
            vec![annotation(BinaryName::ASPECT, &[])],
        );
        method(
            &graph,
            concrete,
            "scope",
            vec![],
            None,
            MethodAccessFlags::PUBLIC,
            vec![annotation(BinaryName::POINTCUT, &[("value", "within(app.*)")])],
        );

        let mut diagnostics = vec![];
        let aspects = vec![
            Aspect::from_annotations(&graph, base, &mut diagnostics).unwrap(),
            Aspect::from_annotations(&graph, concrete, &mut diagnostics).unwrap(),
        ];
        let resolved =
            ResolvedAspects::resolve(&graph, &java, &Settings::default(), &aspects, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(resolved.advice.len(), 1);
        assert_eq!(resolved.advice[0].aspect, concrete);
        assert!(matches!(resolved.advice[0].pointcut, Pointcut::Within(_)));
    }
}
