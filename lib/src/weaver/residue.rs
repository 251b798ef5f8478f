//! Runtime tests left over when a pointcut can't be decided statically
//!
//! A [`Test`] is a boolean expression over the values available at a join point. It is built by
//! the matcher, lowered to bytecode by [`crate::weaver::render`], and can also be evaluated
//! directly against an [`Environment`] (which is how rendered code gets checked).

use crate::jvm::class_graph::{ClassGraph, ClassId, FieldId, MethodId};
use crate::jvm::{BinaryName, FieldType, Name, RefType, RenderDescriptor};
use std::fmt;

/// Where a value available at a join point lives
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Slot {
    This,
    Target,
    Arg(usize),

    /// Value produced by the join point (only available after it)
    Returned,

    /// Exception thrown out of the join point (only available in `after throwing` advice)
    Thrown,
}

/// Value at a join point, with its static type there
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Var<'g> {
    pub slot: Slot,
    pub typ: FieldType<ClassId<'g>>,
}

/// Value producing expression
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expr<'g> {
    Var(Var<'g>),

    /// Instance field read, or static field read when there is no receiver
    FieldGet {
        field: FieldId<'g>,
        receiver: Option<Box<Expr<'g>>>,
    },

    /// Instance method call, or static call when there is no receiver
    Call {
        method: MethodId<'g>,
        receiver: Option<Box<Expr<'g>>>,
        args: Vec<Expr<'g>>,
    },

    /// `Foo.class`
    ClassConstant(ClassId<'g>),
}

/// Boolean test evaluated at a join point
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Test<'g> {
    Literal(bool),
    And(Box<Test<'g>>, Box<Test<'g>>),
    Or(Box<Test<'g>>, Box<Test<'g>>),
    Not(Box<Test<'g>>),

    /// `value instanceof typ` (false for `null`)
    InstanceOf {
        value: Expr<'g>,
        typ: RefType<ClassId<'g>>,
    },

    /// Is the annotation present on the runtime class of the value? (false for `null`)
    HasAnnotation {
        value: Expr<'g>,
        annotation: ClassId<'g>,
    },

    /// Expression of type `boolean`
    Expr(Expr<'g>),
}

impl<'g> Expr<'g> {
    /// Type of the value produced (`None` for calls to `void` methods)
    pub fn typ(&self, class_graph: &ClassGraph<'g>) -> Option<FieldType<ClassId<'g>>> {
        match self {
            Expr::Var(var) => Some(var.typ),
            Expr::FieldGet { field, .. } => Some(class_graph.resolve_field_type(&field.descriptor)),
            Expr::Call { method, .. } => method
                .descriptor
                .return_type
                .as_ref()
                .map(|ret| class_graph.resolve_field_type(ret)),
            Expr::ClassConstant(_) => Some(FieldType::object(
                class_graph.lookup_or_missing(&BinaryName::CLASS),
            )),
        }
    }

    /// Slots this expression reads
    pub fn slots(&self, found: &mut Vec<Slot>) {
        match self {
            Expr::Var(var) => found.push(var.slot),
            Expr::FieldGet { receiver, .. } => {
                if let Some(receiver) = receiver {
                    receiver.slots(found);
                }
            }
            Expr::Call { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    receiver.slots(found);
                }
                for arg in args {
                    arg.slots(found);
                }
            }
            Expr::ClassConstant(_) => (),
        }
    }
}

impl<'g> Test<'g> {
    pub fn and(left: Test<'g>, right: Test<'g>) -> Test<'g> {
        Test::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Test<'g>, right: Test<'g>) -> Test<'g> {
        Test::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(test: Test<'g>) -> Test<'g> {
        Test::Not(Box::new(test))
    }

    /// Slots the test reads
    pub fn slots(&self) -> Vec<Slot> {
        let mut found = vec![];
        self.collect_slots(&mut found);
        found
    }

    fn collect_slots(&self, found: &mut Vec<Slot>) {
        match self {
            Test::Literal(_) => (),
            Test::And(left, right) | Test::Or(left, right) => {
                left.collect_slots(found);
                right.collect_slots(found);
            }
            Test::Not(test) => test.collect_slots(found),
            Test::InstanceOf { value, .. } | Test::HasAnnotation { value, .. } => {
                value.slots(found)
            }
            Test::Expr(expr) => expr.slots(found),
        }
    }

    /// Evaluate the test with Java's short-circuiting semantics
    pub fn evaluate<E: Environment<'g>>(&self, env: &mut E) -> bool {
        match self {
            Test::Literal(value) => *value,
            Test::And(left, right) => left.evaluate(env) && right.evaluate(env),
            Test::Or(left, right) => left.evaluate(env) || right.evaluate(env),
            Test::Not(test) => !test.evaluate(env),
            Test::InstanceOf { value, typ } => env.instance_of(value, typ),
            Test::HasAnnotation { value, annotation } => env.has_annotation(value, *annotation),
            Test::Expr(expr) => env.truth(expr),
        }
    }
}

/// Runtime state a [`Test`] can be evaluated against
pub trait Environment<'g> {
    fn instance_of(&mut self, value: &Expr<'g>, typ: &RefType<ClassId<'g>>) -> bool;
    fn has_annotation(&mut self, value: &Expr<'g>, annotation: ClassId<'g>) -> bool;

    /// Value of a `boolean` expression
    fn truth(&mut self, expr: &Expr<'g>) -> bool;
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::This => f.write_str("this"),
            Slot::Target => f.write_str("target"),
            Slot::Arg(idx) => write!(f, "arg{}", idx),
            Slot::Returned => f.write_str("returned"),
            Slot::Thrown => f.write_str("thrown"),
        }
    }
}

impl<'g> fmt::Display for Expr<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(var) => write!(f, "{}", var.slot),
            Expr::FieldGet { field, receiver } => {
                match receiver {
                    Some(receiver) => write!(f, "{}", receiver)?,
                    None => f.write_str(field.class.name.as_str())?,
                }
                write!(f, ".{}", field.name)
            }
            Expr::Call {
                method,
                receiver,
                args,
            } => {
                match receiver {
                    Some(receiver) => write!(f, "{}", receiver)?,
                    None => f.write_str(method.class.name.as_str())?,
                }
                write!(f, ".{}(", method.name)?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::ClassConstant(class) => write!(f, "{}.class", class.name.as_str()),
        }
    }
}

impl<'g> fmt::Display for Test<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Literal(value) => write!(f, "{}", value),
            Test::And(left, right) => write!(f, "({} && {})", left, right),
            Test::Or(left, right) => write!(f, "({} || {})", left, right),
            Test::Not(test) => write!(f, "!{}", test),
            Test::InstanceOf { value, typ } => {
                write!(f, "{} instanceof {}", value, typ.render())
            }
            Test::HasAnnotation { value, annotation } => {
                write!(f, "{} has @{}", value, annotation.name.as_str())
            }
            Test::Expr(expr) => write!(f, "{}", expr),
        }
    }
}
