use super::{AnnotationArg, ArgTest, IfTest, Pointcut, TypeTest};
use crate::jvm::class_graph::{narrowing, Assignable, ClassGraph, ClassId, JavaLibrary, Narrowing};
use crate::jvm::{ClassAccessFlags, FieldType, RefType};
use crate::weaver::residue::{Expr, Slot, Test, Var};
use crate::weaver::shadow::{Shadow, ShadowKind, ShadowShape, ShadowSignature};
use crate::weaver::syntax::AnnotationDesignator;
use crate::weaver::{Error, ExposedState, MatchValue};

/// Match outcome along with the residual test deciding a `Maybe`
///
/// The test is `Literal(true)` for `Yes` and `Literal(false)` for `No`.
pub(crate) type Matched<'g> = (MatchValue, Test<'g>);

fn decided<'g>(value: bool) -> Matched<'g> {
    (MatchValue::from_bool(value), Test::Literal(value))
}

fn maybe(test: Test<'_>) -> Matched<'_> {
    (MatchValue::Maybe, test)
}

/// Conjunction of two outcomes, without adding `true` conjuncts to the test
fn conjoin<'g>((left, left_test): Matched<'g>, (right, right_test): Matched<'g>) -> Matched<'g> {
    match (left, right) {
        (MatchValue::No, _) | (_, MatchValue::No) => decided(false),
        (MatchValue::Yes, _) => (right, right_test),
        (_, MatchValue::Yes) => (left, left_test),
        _ => maybe(Test::and(left_test, right_test)),
    }
}

fn disjoin<'g>((left, left_test): Matched<'g>, (right, right_test): Matched<'g>) -> Matched<'g> {
    match (left, right) {
        (MatchValue::Yes, _) | (_, MatchValue::Yes) => decided(true),
        (MatchValue::No, _) => (right, right_test),
        (_, MatchValue::No) => (left, left_test),
        _ => maybe(Test::or(left_test, right_test)),
    }
}

impl<'g> Pointcut<'g> {
    /// Quick check using only the kind and the types around a shadow
    ///
    /// `Never` means no shadow of this shape can match, so full matching can be skipped. Anything
    /// this can't decide from the shape alone is `Maybe`.
    pub fn fast_match(&self, shape: &ShadowShape<'_, 'g>) -> MatchValue {
        match self {
            Pointcut::Kinded { kind, .. } if *kind != shape.kind => MatchValue::Never,
            Pointcut::Kinded { .. } => MatchValue::Maybe,
            Pointcut::Handler(pattern) => {
                if shape.kind != ShadowKind::ExceptionHandler {
                    MatchValue::Never
                } else {
                    yes_or_never(pattern.matches(Some(&FieldType::object(shape.declaring_type))))
                }
            }
            Pointcut::StaticInitialization(pattern) => {
                if shape.kind != ShadowKind::StaticInitialization {
                    MatchValue::Never
                } else {
                    yes_or_never(pattern.matches(Some(&FieldType::object(shape.declaring_type))))
                }
            }
            Pointcut::Within(pattern) => {
                yes_or_never(pattern.matches(Some(&FieldType::object(shape.enclosing_class))))
            }
            Pointcut::Target(test) => match (shape.target_type, test) {
                (None, _) => MatchValue::Never,
                (Some(_), TypeTest::Any) => MatchValue::Yes,
                (Some(target), TypeTest::Type(typ) | TypeTest::Bind { typ, .. }) => match typ {
                    FieldType::Base(_) => MatchValue::Never,
                    FieldType::Ref(expected) => match narrowing(target, expected) {
                        Narrowing::Always => MatchValue::Yes,
                        Narrowing::Possible => MatchValue::Maybe,
                        Narrowing::Impossible => MatchValue::Never,
                    },
                },
            },
            Pointcut::If(IfTest::Constant(value)) => MatchValue::from_bool(*value),
            Pointcut::And(left, right) => left.fast_match(shape).and(right.fast_match(shape)),
            Pointcut::Or(left, right) => left.fast_match(shape).or(right.fast_match(shape)),
            Pointcut::Not(inner) => inner.fast_match(shape).negate(),
            _ => MatchValue::Maybe,
        }
    }

    /// Match a shadow, binding formals into `state` and building the residual test
    ///
    /// Never returns `Never`. Errors only signal an inconsistency between resolution and matching.
    pub fn match_shadow(
        &self,
        shadow: &Shadow<'g>,
        state: &mut ExposedState<'g>,
        class_graph: &ClassGraph<'g>,
        java: &JavaLibrary<'g>,
    ) -> Result<(MatchValue, Test<'g>), Error> {
        if !self.kinds().has(shadow.kind) {
            return Ok(decided(false));
        }
        let matcher = ShadowMatcher {
            shadow,
            class_graph,
            java,
        };
        matcher.matches(self, state)
    }
}

/// Can a value be passed where `expected` is wanted?
///
/// Primitive values match their boxed types and boxed values match their primitives (the value
/// is converted when the advice gets called). What can't be decided statically becomes an
/// `instanceof` test.
pub(crate) fn type_check<'g>(
    java: &JavaLibrary<'g>,
    var: Var<'g>,
    expected: FieldType<ClassId<'g>>,
) -> Matched<'g> {
    let instance_of = |found: &RefType<ClassId<'g>>, expected: RefType<ClassId<'g>>| {
        match narrowing(found, &expected) {
            Narrowing::Always => decided(true),
            Narrowing::Impossible => decided(false),
            Narrowing::Possible => maybe(Test::InstanceOf {
                value: Expr::Var(var),
                typ: expected,
            }),
        }
    };
    match (var.typ, expected) {
        (FieldType::Base(found), FieldType::Base(expected)) => decided(found == expected),
        (FieldType::Ref(found), FieldType::Base(expected)) => {
            instance_of(&found, RefType::Object(java.boxed(expected)))
        }
        (FieldType::Base(found), FieldType::Ref(expected)) => {
            let boxed = RefType::Object(java.boxed(found));
            decided(boxed.is_assignable(&expected) == Some(true))
        }
        (FieldType::Ref(found), FieldType::Ref(expected)) => instance_of(&found, expected),
    }
}

fn yes_or_never(value: bool) -> MatchValue {
    if value {
        MatchValue::Yes
    } else {
        MatchValue::Never
    }
}

struct ShadowMatcher<'a, 'g> {
    shadow: &'a Shadow<'g>,
    class_graph: &'a ClassGraph<'g>,
    java: &'a JavaLibrary<'g>,
}

impl<'a, 'g> ShadowMatcher<'a, 'g> {
    fn matches(
        &self,
        pointcut: &Pointcut<'g>,
        state: &mut ExposedState<'g>,
    ) -> Result<Matched<'g>, Error> {
        let shadow = self.shadow;
        let enclosing_class = FieldType::object(shadow.enclosing_class);
        Ok(match pointcut {
            Pointcut::Kinded { kind, signature } => {
                decided(shadow.kind == *kind && signature.matches(&shadow.signature))
            }
            Pointcut::Handler(pattern) => decided(
                shadow.kind == ShadowKind::ExceptionHandler
                    && pattern.matches(Some(&FieldType::object(shadow.signature.declaring_type))),
            ),
            Pointcut::StaticInitialization(pattern) => decided(
                shadow.kind == ShadowKind::StaticInitialization
                    && pattern.matches(Some(&FieldType::object(shadow.signature.declaring_type))),
            ),
            Pointcut::Within(pattern) => decided(pattern.matches(Some(&enclosing_class))),
            Pointcut::WithinCode(signature) => decided(match shadow.enclosing_method {
                Some(method) => {
                    signature.matches(&ShadowSignature::of_method(method, self.class_graph))
                }
                None => false,
            }),
            Pointcut::This(test) => match shadow.this_type {
                Some(this_type) => {
                    self.check_reference(RefType::Object(this_type), Slot::This, test, state)?
                }
                None => decided(false),
            },
            Pointcut::Target(test) => match shadow.target_type {
                Some(target_type) => {
                    self.check_reference(target_type, Slot::Target, test, state)?
                }
                None => decided(false),
            },
            Pointcut::Args(tests) => {
                let aligned = align(tests, &shadow.arg_types, |test| match test {
                    ArgTest::Ellipsis => None,
                    ArgTest::Test(test) => Some(test),
                });
                match aligned {
                    None => decided(false),
                    Some(aligned) => {
                        let mut matched = decided(true);
                        for (idx, test) in aligned {
                            let arg = self.check(shadow.arg_types[idx], Slot::Arg(idx), test, state)?;
                            matched = conjoin(matched, arg);
                            if matched.0 == MatchValue::No {
                                break;
                            }
                        }
                        matched
                    }
                }
            }
            Pointcut::Annotation {
                designator,
                annotation,
            } => self.annotation(*designator, *annotation),
            Pointcut::AnnotationArgs(args) => {
                let aligned = align(args, &shadow.arg_types, |arg| match arg {
                    AnnotationArg::Ellipsis => None,
                    _ => Some(arg),
                });
                match aligned {
                    None => decided(false),
                    Some(aligned) => {
                        let mut matched = decided(true);
                        for (idx, arg) in aligned {
                            if let AnnotationArg::Annotation(annotation) = arg {
                                let value = Var {
                                    slot: Slot::Arg(idx),
                                    typ: shadow.arg_types[idx],
                                };
                                let arg = self.runtime_annotation(value, *annotation);
                                matched = conjoin(matched, arg);
                            }
                        }
                        matched
                    }
                }
            }
            Pointcut::Cflow { counter, .. } => maybe(Test::Expr(Expr::Call {
                method: self.java.cflow_counter.is_valid,
                receiver: Some(Box::new(Expr::FieldGet {
                    field: *counter,
                    receiver: None,
                })),
                args: vec![],
            })),
            Pointcut::If(IfTest::Constant(value)) => decided(*value),
            Pointcut::If(IfTest::Call { method, formals }) => {
                let mut args = vec![];
                for formal in formals {
                    let bound = state.get(*formal).cloned().ok_or_else(|| {
                        Error::Internal(format!(
                            "formal {} of {:?} is not bound at {}",
                            formal, method, shadow
                        ))
                    })?;
                    args.push(bound);
                }
                maybe(Test::Expr(Expr::Call {
                    method: *method,
                    receiver: None,
                    args,
                }))
            }
            Pointcut::And(left, right) => {
                let left = self.matches(left, state)?;
                if left.0 == MatchValue::No {
                    return Ok(left);
                }
                conjoin(left, self.matches(right, state)?)
            }
            Pointcut::Or(left, right) => {
                let left = self.matches(left, state)?;
                if left.0 == MatchValue::Yes {
                    return Ok(left);
                }
                disjoin(left, self.matches(right, state)?)
            }
            Pointcut::Not(inner) => match self.matches(inner, state)? {
                (MatchValue::Maybe, test) => maybe(Test::not(test)),
                (value, _) => decided(value.negate() == MatchValue::Yes),
            },
        })
    }

    /// `this` and `target` are never primitive
    fn check_reference(
        &self,
        static_type: RefType<ClassId<'g>>,
        slot: Slot,
        test: &TypeTest<'g>,
        state: &mut ExposedState<'g>,
    ) -> Result<Matched<'g>, Error> {
        match test {
            TypeTest::Type(FieldType::Base(_)) | TypeTest::Bind { typ: FieldType::Base(_), .. } => {
                Ok(decided(false))
            }
            _ => self.check(FieldType::Ref(static_type), slot, test, state),
        }
    }

    /// Test the value in a slot against a type, binding it if the test says so
    fn check(
        &self,
        static_type: FieldType<ClassId<'g>>,
        slot: Slot,
        test: &TypeTest<'g>,
        state: &mut ExposedState<'g>,
    ) -> Result<Matched<'g>, Error> {
        let var = Var {
            slot,
            typ: static_type,
        };
        let (expected, formal) = match test {
            TypeTest::Any => return Ok(decided(true)),
            TypeTest::Type(typ) => (*typ, None),
            TypeTest::Bind { formal, typ } => (*typ, Some(*formal)),
        };

        let matched = type_check(self.java, var, expected);

        if let (Some(formal), true) = (formal, matched.0 != MatchValue::No) {
            state.bind(formal, Expr::Var(var))?;
        }
        Ok(matched)
    }

    fn annotation(&self, designator: AnnotationDesignator, annotation: ClassId<'g>) -> Matched<'g> {
        let shadow = self.shadow;
        let name = &annotation.name;
        match designator {
            AnnotationDesignator::Member => decided(match shadow.kind {
                ShadowKind::StaticInitialization => shadow.enclosing_class.has_annotation(name),
                ShadowKind::ExceptionHandler => false,
                _ => shadow
                    .signature
                    .annotations()
                    .map_or(false, |annotations| {
                        annotations.iter().any(|a| &a.type_name == name)
                    }),
            }),
            AnnotationDesignator::Within => decided(shadow.enclosing_class.has_annotation(name)),
            AnnotationDesignator::WithinCode => decided(
                shadow
                    .enclosing_method
                    .map_or(false, |method| method.has_annotation(name)),
            ),
            AnnotationDesignator::This => match shadow.this_type {
                Some(this_type) => self.runtime_annotation(
                    Var {
                        slot: Slot::This,
                        typ: FieldType::object(this_type),
                    },
                    annotation,
                ),
                None => decided(false),
            },
            AnnotationDesignator::Target => match shadow.target_type {
                Some(target_type) => self.runtime_annotation(
                    Var {
                        slot: Slot::Target,
                        typ: FieldType::Ref(target_type),
                    },
                    annotation,
                ),
                None => decided(false),
            },
        }
    }

    /// Is the annotation on the runtime class of a value?
    ///
    /// Only decidable statically when the static type is a final class.
    fn runtime_annotation(&self, value: Var<'g>, annotation: ClassId<'g>) -> Matched<'g> {
        match value.typ {
            FieldType::Ref(RefType::Object(class)) => {
                if class.access_flags.contains(ClassAccessFlags::FINAL) {
                    decided(class.has_annotation(&annotation.name))
                } else {
                    maybe(Test::HasAnnotation {
                        value: Expr::Var(value),
                        annotation,
                    })
                }
            }
            _ => decided(false),
        }
    }
}

/// Pair up patterns with the argument positions they apply to
///
/// `is_test` maps a pattern to what it tests, or `None` for the `..` (at most one). `None` is
/// returned when the patterns can't line up with the arguments.
fn align<'p, P, T>(
    patterns: &'p [P],
    args: &[FieldType<ClassId<'_>>],
    is_test: impl Fn(&'p P) -> Option<T>,
) -> Option<Vec<(usize, T)>> {
    let ellipsis = patterns.iter().position(|pattern| is_test(pattern).is_none());
    let mut aligned = vec![];
    match ellipsis {
        None => {
            if patterns.len() != args.len() {
                return None;
            }
            for (idx, pattern) in patterns.iter().enumerate() {
                aligned.extend(is_test(pattern).map(|test| (idx, test)));
            }
        }
        Some(ellipsis) => {
            let suffix = &patterns[ellipsis + 1..];
            if ellipsis + suffix.len() > args.len() {
                return None;
            }
            for (idx, pattern) in patterns[..ellipsis].iter().enumerate() {
                aligned.extend(is_test(pattern).map(|test| (idx, test)));
            }
            let suffix_start = args.len() - suffix.len();
            for (idx, pattern) in suffix.iter().enumerate() {
                aligned.extend(is_test(pattern).map(|test| (suffix_start + idx, test)));
            }
        }
    }
    Some(aligned)
}
