use crate::jvm::class_graph::{Assignable, ClassGraph, ClassId, FieldId, JavaLibrary, MethodId};
use crate::jvm::{FieldType, Name, RefType};
use crate::weaver::patterns::TypePattern;
use crate::weaver::pointcut::{type_check, Pointcut};
use crate::weaver::residue::{Expr, Slot, Test, Var};
use crate::weaver::shadow::Shadow;
use crate::weaver::{Error, ExposedState, MatchValue, PartialOrder};
use std::cmp::Ordering;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AdviceKind {
    Before,

    /// After the join point completes normally
    AfterReturning,

    /// After the join point throws
    AfterThrowing,

    /// After the join point, however it completes
    After,
}

impl AdviceKind {
    pub fn is_after(self) -> bool {
        !matches!(self, AdviceKind::Before)
    }

    pub fn name(self) -> &'static str {
        match self {
            AdviceKind::Before => "before",
            AdviceKind::AfterReturning => "after returning",
            AdviceKind::AfterThrowing => "after throwing",
            AdviceKind::After => "after",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an argument to an advice method comes from
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AdviceArg {
    /// Formal of the pointcut (index into the exposed state)
    Formal(usize),

    /// Value returned by the join point
    Returned,

    /// Exception thrown by the join point
    Thrown,
}

/// What gets spliced in when advice applies
#[derive(Clone, Debug)]
pub enum AdviceAction<'g> {
    /// Call the advice method
    Invoke {
        method: MethodId<'g>,
        args: Vec<AdviceArg>,

        /// `aspectOf()`, for advice methods that aren't static
        aspect_of: Option<MethodId<'g>>,
    },

    /// Count entries into the join points of a `cflow` (or `cflowbelow`)
    CflowEntry { counter: FieldId<'g>, below: bool },
}

/// Advice ready to be matched against shadows
#[derive(Clone, Debug)]
pub struct Advice<'g> {
    /// Aspect the advice belongs to
    pub aspect: ClassId<'g>,

    pub kind: AdviceKind,
    pub pointcut: Pointcut<'g>,
    pub action: AdviceAction<'g>,

    /// Number of formals the pointcut binds
    pub formals: usize,

    /// Type of the `returning` or `throwing` parameter
    pub extra_formal: Option<FieldType<ClassId<'g>>>,

    /// Position among the advice of the aspect, in declaration order
    pub declaration_order: usize,
}

/// Advice that applies to a shadow
#[derive(Clone, Debug)]
pub struct AdviceMatch<'g> {
    /// Index of the advice in the list being woven
    pub advice: usize,

    /// `Yes` or `Maybe`
    pub value: MatchValue,

    /// Test guarding the advice (`Literal(true)` for `Yes`)
    pub test: Test<'g>,

    /// Arguments of the advice method (empty for cflow entries)
    pub args: Vec<Expr<'g>>,

    /// Exceptions the advice reacts to (only for `after throwing`)
    pub catch_type: Option<ClassId<'g>>,
}

impl<'g> Advice<'g> {
    /// Cflow bookkeeping for the inner pointcut of a `cflow` in some other advice's pointcut
    pub fn cflow_entry(
        aspect: ClassId<'g>,
        inner: Pointcut<'g>,
        counter: FieldId<'g>,
        below: bool,
        declaration_order: usize,
    ) -> Advice<'g> {
        Advice {
            aspect,
            kind: AdviceKind::After,
            pointcut: inner,
            action: AdviceAction::CflowEntry { counter, below },
            formals: 0,
            extra_formal: None,
            declaration_order,
        }
    }

    pub fn is_cflow_entry(&self, below: bool) -> bool {
        matches!(self.action, AdviceAction::CflowEntry { below: b, .. } if b == below)
    }

    /// Match the advice against a shadow
    ///
    /// `None` means the advice definitely doesn't apply.
    pub fn match_shadow(
        &self,
        index: usize,
        shadow: &Shadow<'g>,
        class_graph: &ClassGraph<'g>,
        java: &JavaLibrary<'g>,
    ) -> Result<Option<AdviceMatch<'g>>, Error> {
        if self.pointcut.fast_match(&shadow.shape()).always_false() {
            return Ok(None);
        }
        let mut state = ExposedState::new(self.formals);
        let (mut value, mut test) = self.pointcut.match_shadow(shadow, &mut state, class_graph, java)?;
        if value.always_false() {
            return Ok(None);
        }

        // `after returning` only sees values of the declared type
        let mut catch_type = None;
        match (self.kind, self.extra_formal) {
            (AdviceKind::AfterReturning, Some(returning)) => {
                let returned = match shadow.return_type {
                    Some(typ) => typ,
                    None => return Ok(None),
                };
                let var = Var {
                    slot: Slot::Returned,
                    typ: returned,
                };
                let (returned_value, returned_test) = type_check(java, var, returning);
                value = value.and(returned_value);
                if value.always_false() {
                    return Ok(None);
                }
                if returned_value == MatchValue::Maybe {
                    test = conjoin(test, returned_test);
                }
            }
            (AdviceKind::AfterThrowing, Some(FieldType::Ref(RefType::Object(thrown)))) => {
                catch_type = Some(thrown);
            }
            (AdviceKind::AfterThrowing, None) => {
                catch_type = Some(java.throwable);
            }
            _ => (),
        }

        let args = match &self.action {
            AdviceAction::Invoke { args, .. } => args
                .iter()
                .map(|arg| self.argument(*arg, shadow, &state, catch_type))
                .collect::<Result<Vec<_>, Error>>()?,
            AdviceAction::CflowEntry { .. } => vec![],
        };

        Ok(Some(AdviceMatch {
            advice: index,
            value,
            test,
            args,
            catch_type,
        }))
    }

    fn argument(
        &self,
        arg: AdviceArg,
        shadow: &Shadow<'g>,
        state: &ExposedState<'g>,
        catch_type: Option<ClassId<'g>>,
    ) -> Result<Expr<'g>, Error> {
        match arg {
            AdviceArg::Formal(formal) => state.get(formal).cloned().ok_or_else(|| {
                Error::Internal(format!("formal {} unbound after matching {}", formal, shadow))
            }),
            AdviceArg::Returned => match shadow.return_type {
                Some(typ) => Ok(Expr::Var(Var {
                    slot: Slot::Returned,
                    typ,
                })),
                None => Err(Error::Internal(format!("{} returns nothing", shadow))),
            },
            AdviceArg::Thrown => match catch_type {
                Some(class) => Ok(Expr::Var(Var {
                    slot: Slot::Thrown,
                    typ: FieldType::object(class),
                })),
                None => Err(Error::Internal(format!(
                    "{} advice can't see a thrown exception",
                    self.kind
                ))),
            },
        }
    }

    /// Short description for diagnostics (`before advice tracing/Trace.log`)
    pub fn describe(&self) -> String {
        match &self.action {
            AdviceAction::Invoke { method, .. } => format!(
                "{} advice {}.{}",
                self.kind,
                self.aspect.name.java_name(),
                method.name.as_str()
            ),
            AdviceAction::CflowEntry { counter, below } => format!(
                "{} entry {}.{}",
                if *below { "cflowbelow" } else { "cflow" },
                self.aspect.name.java_name(),
                counter.name.as_str()
            ),
        }
    }
}

fn conjoin<'g>(left: Test<'g>, right: Test<'g>) -> Test<'g> {
    match left {
        Test::Literal(true) => right,
        left => Test::and(left, right),
    }
}

/// Pairwise precedence between advice
///
/// `Greater` means the first advice has higher precedence, so it runs first on the way in and
/// last on the way out.
pub struct PrecedenceRules<'a, 'g> {
    /// `declare precedence` lists, each with the aspect declaring it
    pub declared: &'a [(ClassId<'g>, Vec<TypePattern>)],
}

impl<'a, 'g> PrecedenceRules<'a, 'g> {
    pub fn compare(&self, a: &Advice<'g>, b: &Advice<'g>) -> PartialOrder {
        // Counting cflow entries goes around everything else, counting cflowbelow entries inside
        match (a.is_cflow_entry(false), b.is_cflow_entry(false)) {
            (true, false) => return PartialOrder::Greater,
            (false, true) => return PartialOrder::Less,
            _ => (),
        }
        match (a.is_cflow_entry(true), b.is_cflow_entry(true)) {
            (true, false) => return PartialOrder::Less,
            (false, true) => return PartialOrder::Greater,
            _ => (),
        }

        if a.aspect == b.aspect {
            let a_is_later = a.declaration_order > b.declaration_order;
            let later_wins = a.kind.is_after() || b.kind.is_after();
            return if a.declaration_order == b.declaration_order {
                PartialOrder::Incomparable
            } else if a_is_later == later_wins {
                PartialOrder::Greater
            } else {
                PartialOrder::Less
            };
        }
        self.compare_aspects(a.aspect, b.aspect)
    }

    pub fn compare_aspects(&self, a: ClassId<'g>, b: ClassId<'g>) -> PartialOrder {
        // Every list naming both aspects must agree
        let mut declared: Option<PartialOrder> = None;
        for (_, list) in self.declared {
            if let (Some(a_pos), Some(b_pos)) = (list_position(list, a), list_position(list, b)) {
                let answer = match a_pos.cmp(&b_pos) {
                    Ordering::Less => PartialOrder::Greater,
                    Ordering::Greater => PartialOrder::Less,
                    Ordering::Equal => continue,
                };
                match declared {
                    Some(previous) if previous != answer => return PartialOrder::Conflicting,
                    _ => declared = Some(answer),
                }
            }
        }
        if let Some(answer) = declared {
            answer
        } else if a.is_assignable(&b) == Some(true) {
            PartialOrder::Greater
        } else if b.is_assignable(&a) == Some(true) {
            PartialOrder::Less
        } else {
            PartialOrder::Incomparable
        }
    }
}

/// Tie-break between advice that precedence doesn't order
pub fn fallback_order(a: &Advice<'_>, b: &Advice<'_>) -> Ordering {
    a.aspect
        .name
        .cmp(&b.aspect.name)
        .then(a.declaration_order.cmp(&b.declaration_order))
}

/// Position of an aspect in a precedence list
///
/// A plain `*` only takes the aspects that no other entry names.
fn list_position(list: &[TypePattern], aspect: ClassId<'_>) -> Option<usize> {
    let typ = FieldType::object(aspect);
    let named = list
        .iter()
        .position(|pattern| !pattern.is_any() && pattern.matches(Some(&typ)));
    named.or_else(|| list.iter().position(TypePattern::is_any))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{ClassData, ClassGraphArenas, ClassOrigin, MethodData};
    use crate::jvm::{
        BinaryName, ClassAccessFlags, MethodAccessFlags, MethodDescriptor, UnqualifiedName,
    };
    use crate::weaver::pointcut::{CflowCounters, IfTest};
    use crate::weaver::syntax::parse_type_patterns;

    fn aspect<'g>(graph: &ClassGraph<'g>, name: &str, superclass: ClassId<'g>) -> ClassId<'g> {
        graph.add_class(ClassData::new(
            BinaryName::from_string(name.to_owned()).unwrap(),
            ClassOrigin::Woven,
            Some(superclass),
            vec![],
            ClassAccessFlags::PUBLIC,
        ))
    }

    fn advice<'g>(
        graph: &ClassGraph<'g>,
        aspect: ClassId<'g>,
        kind: AdviceKind,
        declaration_order: usize,
    ) -> Advice<'g> {
        let method = graph.add_method(MethodData {
            class: aspect,
            name: UnqualifiedName::from_string(format!("advice{}", declaration_order)).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC,
            annotations: vec![],
        });
        Advice {
            aspect,
            kind,
            pointcut: Pointcut::If(IfTest::Constant(true)),
            action: AdviceAction::Invoke {
                method,
                args: vec![],
                aspect_of: None,
            },
            formals: 0,
            extra_formal: None,
            declaration_order,
        }
    }

    #[test]
    fn within_an_aspect() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let tracing = aspect(&graph, "app/Tracing", java.object);
        let rules = PrecedenceRules { declared: &[] };

        let before1 = advice(&graph, tracing, AdviceKind::Before, 0);
        let before2 = advice(&graph, tracing, AdviceKind::Before, 1);
        let after3 = advice(&graph, tracing, AdviceKind::After, 2);
        assert_eq!(rules.compare(&before1, &before2), PartialOrder::Greater);
        assert_eq!(rules.compare(&before2, &before1), PartialOrder::Less);
        assert_eq!(rules.compare(&after3, &before1), PartialOrder::Greater);
        assert_eq!(rules.compare(&before2, &after3), PartialOrder::Less);

        let mut counters = CflowCounters::new(
            UnqualifiedName::from_string(String::from("counter$")).unwrap(),
            java.cflow_counter.class,
        );
        let entry = Advice::cflow_entry(
            tracing,
            Pointcut::If(IfTest::Constant(true)),
            counters.allocate(&graph, tracing),
            false,
            3,
        );
        let entry_below = Advice::cflow_entry(
            tracing,
            Pointcut::If(IfTest::Constant(true)),
            counters.allocate(&graph, tracing),
            true,
            4,
        );
        assert_eq!(rules.compare(&entry, &before1), PartialOrder::Greater);
        assert_eq!(rules.compare(&entry_below, &after3), PartialOrder::Less);
        assert_eq!(rules.compare(&entry, &entry_below), PartialOrder::Greater);
        assert_eq!(fallback_order(&before1, &before2), Ordering::Less);
    }

    #[test]
    fn between_aspects() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let base = aspect(&graph, "app/Base", java.object);
        let derived = aspect(&graph, "app/Derived", base);
        let logging = aspect(&graph, "app/Logging", java.object);
        let security = aspect(&graph, "app/Security", java.object);

        let declared = vec![(
            security,
            parse_type_patterns("app.Security, *, app.Logging").unwrap(),
        )];
        let rules = PrecedenceRules {
            declared: &declared,
        };
        assert_eq!(rules.compare_aspects(security, logging), PartialOrder::Greater);
        assert_eq!(rules.compare_aspects(base, logging), PartialOrder::Greater);
        assert_eq!(rules.compare_aspects(logging, base), PartialOrder::Less);
        assert_eq!(rules.compare_aspects(derived, base), PartialOrder::Greater);

        let none = PrecedenceRules { declared: &[] };
        assert_eq!(none.compare_aspects(security, logging), PartialOrder::Incomparable);
        assert_eq!(none.compare_aspects(base, derived), PartialOrder::Less);
    }

    #[test]
    fn contradictory_lists_conflict() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let first = aspect(&graph, "app/A", java.object);
        let second = aspect(&graph, "app/B", java.object);
        let other = aspect(&graph, "app/C", java.object);

        let declared = vec![
            (first, parse_type_patterns("app.A, app.B").unwrap()),
            (second, parse_type_patterns("app.B, app.A, app.C").unwrap()),
        ];
        let rules = PrecedenceRules {
            declared: &declared,
        };
        assert_eq!(rules.compare_aspects(first, second), PartialOrder::Conflicting);
        assert_eq!(rules.compare_aspects(second, first), PartialOrder::Conflicting);
        assert_eq!(rules.compare_aspects(first, other), PartialOrder::Greater);

        // Lists that agree are fine
        let agreeing = vec![
            (first, parse_type_patterns("app.A, app.B").unwrap()),
            (second, parse_type_patterns("app.A, app.B").unwrap()),
        ];
        let rules = PrecedenceRules {
            declared: &agreeing,
        };
        assert_eq!(rules.compare_aspects(first, second), PartialOrder::Greater);
    }
}
