//! Resolved pointcuts
//!
//! A [`Pointcut`] is what a [`PointcutExpr`](crate::weaver::syntax::PointcutExpr) becomes once
//! named references are inlined, formals are mapped to slots of the
//! [`ExposedState`](crate::weaver::ExposedState), and the types designators test against are
//! looked up in the class graph. Resolved pointcuts are immutable and get matched against every
//! shadow of every woven class.

mod matcher;
mod resolve;

pub(crate) use matcher::type_check;
pub use resolve::*;

use crate::jvm::class_graph::{ClassGraph, ClassId, FieldData, FieldId, MethodId};
use crate::jvm::{FieldAccessFlags, FieldType, Name, RenderDescriptor, UnqualifiedName};
use crate::weaver::patterns::{SignaturePattern, TypePattern};
use crate::weaver::shadow::{ShadowKind, ShadowKinds};
use crate::weaver::syntax::AnnotationDesignator;
use std::fmt;

#[derive(Clone, PartialEq, Debug)]
pub enum Pointcut<'g> {
    Kinded {
        kind: ShadowKind,
        signature: SignaturePattern,
    },
    Handler(TypePattern),
    StaticInitialization(TypePattern),
    Within(TypePattern),
    WithinCode(SignaturePattern),
    This(TypeTest<'g>),
    Target(TypeTest<'g>),
    Args(Vec<ArgTest<'g>>),
    Annotation {
        designator: AnnotationDesignator,
        annotation: ClassId<'g>,
    },
    AnnotationArgs(Vec<AnnotationArg<'g>>),

    /// Join points in the control flow of a join point matching `inner`
    ///
    /// Entries into `inner` are counted in `counter` (a static field on the aspect).
    Cflow {
        inner: Box<Pointcut<'g>>,
        below: bool,
        counter: FieldId<'g>,
    },
    If(IfTest<'g>),
    And(Box<Pointcut<'g>>, Box<Pointcut<'g>>),
    Or(Box<Pointcut<'g>>, Box<Pointcut<'g>>),
    Not(Box<Pointcut<'g>>),
}

/// Runtime type test on a value at the join point
#[derive(Clone, PartialEq, Debug)]
pub enum TypeTest<'g> {
    /// Any value (but there has to be one)
    Any,
    Type(FieldType<ClassId<'g>>),

    /// Test the type and expose the value as a formal
    Bind {
        formal: usize,
        typ: FieldType<ClassId<'g>>,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub enum ArgTest<'g> {
    /// Any number of arguments
    Ellipsis,
    Test(TypeTest<'g>),
}

#[derive(Clone, PartialEq, Debug)]
pub enum AnnotationArg<'g> {
    Ellipsis,
    Any,
    Annotation(ClassId<'g>),
}

#[derive(Clone, PartialEq, Debug)]
pub enum IfTest<'g> {
    Constant(bool),

    /// Call a static `boolean` method with the values of some formals
    Call {
        method: MethodId<'g>,
        formals: Vec<usize>,
    },
}

/// Cflow entry found in a pointcut
#[derive(Copy, Clone, Debug)]
pub struct CflowEntry<'a, 'g> {
    pub inner: &'a Pointcut<'g>,
    pub below: bool,
    pub counter: FieldId<'g>,
}

impl<'g> Pointcut<'g> {
    /// Kinds of shadow the pointcut could possibly match
    pub fn kinds(&self) -> ShadowKinds {
        match self {
            Pointcut::Kinded { kind, .. } => kind.bit(),
            Pointcut::Handler(_) => ShadowKinds::EXCEPTION_HANDLER,
            Pointcut::StaticInitialization(_) => ShadowKinds::STATIC_INITIALIZATION,
            Pointcut::And(left, right) => left.kinds() & right.kinds(),
            Pointcut::Or(left, right) => left.kinds() | right.kinds(),
            _ => ShadowKinds::all(),
        }
    }

    /// Every `cflow` and `cflowbelow` in the pointcut, outermost first
    pub fn cflow_entries(&self) -> Vec<CflowEntry<'_, 'g>> {
        let mut entries = vec![];
        self.collect_cflow_entries(&mut entries);
        entries
    }

    fn collect_cflow_entries<'a>(&'a self, entries: &mut Vec<CflowEntry<'a, 'g>>) {
        match self {
            Pointcut::Cflow {
                inner,
                below,
                counter,
            } => {
                entries.push(CflowEntry {
                    inner: &**inner,
                    below: *below,
                    counter: *counter,
                });
                inner.collect_cflow_entries(entries);
            }
            Pointcut::And(left, right) | Pointcut::Or(left, right) => {
                left.collect_cflow_entries(entries);
                right.collect_cflow_entries(entries);
            }
            Pointcut::Not(inner) => inner.collect_cflow_entries(entries),
            _ => (),
        }
    }
}

/// Static fields holding cflow counters, allocated on aspects as pointcuts get resolved
pub struct CflowCounters<'g> {
    prefix: UnqualifiedName,
    counter_type: FieldType<ClassId<'g>>,
    allocated: Vec<FieldId<'g>>,
}

impl<'g> CflowCounters<'g> {
    pub fn new(prefix: UnqualifiedName, counter_class: ClassId<'g>) -> CflowCounters<'g> {
        CflowCounters {
            prefix,
            counter_type: FieldType::object(counter_class),
            allocated: vec![],
        }
    }

    /// Add a fresh counter field to the aspect
    pub fn allocate(&mut self, class_graph: &ClassGraph<'g>, aspect: ClassId<'g>) -> FieldId<'g> {
        let mut index = 0;
        let name = loop {
            let name = self.prefix.concat(&UnqualifiedName::number(index));
            if aspect.declared_field(&name).is_none() {
                break name;
            }
            index += 1;
        };
        let field = class_graph.add_field(FieldData {
            class: aspect,
            name,
            descriptor: self.counter_type.map(|class| class.name.clone()),
            access_flags: FieldAccessFlags::PUBLIC
                | FieldAccessFlags::STATIC
                | FieldAccessFlags::FINAL
                | FieldAccessFlags::SYNTHETIC,
            annotations: vec![],
        });
        self.allocated.push(field);
        field
    }

    /// Counters allocated on a given aspect
    pub fn on(&self, aspect: ClassId<'g>) -> impl Iterator<Item = FieldId<'g>> + '_ {
        self.allocated
            .iter()
            .copied()
            .filter(move |field| field.class == aspect)
    }

    pub fn all(&self) -> &[FieldId<'g>] {
        &self.allocated
    }
}

fn write_type<'g>(f: &mut fmt::Formatter<'_>, typ: &FieldType<ClassId<'g>>) -> fmt::Result {
    f.write_str(&typ.render())
}

impl<'g> fmt::Display for TypeTest<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTest::Any => f.write_str("*"),
            TypeTest::Type(typ) => write_type(f, typ),
            TypeTest::Bind { formal, typ } => {
                write!(f, "${}:", formal)?;
                write_type(f, typ)
            }
        }
    }
}

impl<'g> fmt::Display for Pointcut<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pointcut::Kinded { kind, signature } => {
                let keyword = match kind {
                    ShadowKind::MethodCall | ShadowKind::ConstructorCall => "call",
                    ShadowKind::FieldGet => "get",
                    ShadowKind::FieldSet => "set",
                    _ => "execution",
                };
                write!(f, "{}({:?})", keyword, signature.kind)
            }
            Pointcut::Handler(typ) => write!(f, "handler({})", typ),
            Pointcut::StaticInitialization(typ) => write!(f, "staticinitialization({})", typ),
            Pointcut::Within(typ) => write!(f, "within({})", typ),
            Pointcut::WithinCode(signature) => write!(f, "withincode({:?})", signature.kind),
            Pointcut::This(test) => write!(f, "this({})", test),
            Pointcut::Target(test) => write!(f, "target({})", test),
            Pointcut::Args(tests) => {
                f.write_str("args(")?;
                for (idx, test) in tests.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match test {
                        ArgTest::Ellipsis => f.write_str("..")?,
                        ArgTest::Test(test) => write!(f, "{}", test)?,
                    }
                }
                f.write_str(")")
            }
            Pointcut::Annotation {
                designator,
                annotation,
            } => write!(f, "{}({})", designator.keyword(), annotation.name.as_str()),
            Pointcut::AnnotationArgs(args) => {
                f.write_str("@args(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        AnnotationArg::Ellipsis => f.write_str("..")?,
                        AnnotationArg::Any => f.write_str("*")?,
                        AnnotationArg::Annotation(class) => f.write_str(class.name.as_str())?,
                    }
                }
                f.write_str(")")
            }
            Pointcut::Cflow { inner, below, .. } => {
                let keyword = if *below { "cflowbelow" } else { "cflow" };
                write!(f, "{}({})", keyword, inner)
            }
            Pointcut::If(IfTest::Constant(value)) => write!(f, "if({})", value),
            Pointcut::If(IfTest::Call { method, .. }) => write!(f, "if({:?})", method),
            Pointcut::And(left, right) => write!(f, "({} && {})", left, right),
            Pointcut::Or(left, right) => write!(f, "({} || {})", left, right),
            Pointcut::Not(inner) => write!(f, "!{}", inner),
        }
    }
}
