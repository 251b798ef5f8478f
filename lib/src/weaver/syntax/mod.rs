//! Textual pointcut expressions
//!
//! Parsing produces a [`PointcutExpr`], which still has named references and doesn't know which
//! identifiers are formal parameters. [`crate::weaver::pointcut`] resolves it into a
//! [`crate::weaver::pointcut::Pointcut`].

mod lexer;
mod parser;

pub use lexer::{tokenize, Lexeme, Token};
pub use parser::{parse_pointcut, parse_type_patterns};

use crate::weaver::patterns::{ClassNamePattern, ParamPattern, SignaturePattern, TypePattern};
use crate::weaver::shadow::ShadowKind;
use std::fmt;
use std::ops::Range;

/// Pointcut as written, before references and formals are resolved
#[derive(Clone, PartialEq, Debug)]
pub enum PointcutExpr {
    /// `call`, `execution`, `get`, `set`
    Kinded {
        kind: ShadowKind,
        signature: SignaturePattern,
    },

    /// `handler(Type)`
    Handler(TypePattern),

    /// `staticinitialization(Type)`
    StaticInitialization(TypePattern),

    Within(TypePattern),
    WithinCode(SignaturePattern),

    /// `this(Type)` or `this(formal)`
    This(TypePattern),

    /// `target(Type)` or `target(formal)`
    Target(TypePattern),

    /// `args(Type, .., formal)`
    Args(Vec<ParamPattern>),

    /// `@annotation`, `@this`, `@target`, `@within`, `@withincode`
    Annotation {
        designator: AnnotationDesignator,
        annotation: ClassNamePattern,
    },

    /// `@args(Ann, ..)`
    AnnotationArgs(Vec<ParamPattern>),

    /// `cflow(...)` (or `cflowbelow(...)` when `below` is set)
    Cflow {
        inner: Box<PointcutExpr>,
        below: bool,
    },

    /// `if()` (the condition is the body of the `@Pointcut` method) or `if(true)`/`if(false)`
    If(Option<bool>),

    And(Box<PointcutExpr>, Box<PointcutExpr>),
    Or(Box<PointcutExpr>, Box<PointcutExpr>),
    Not(Box<PointcutExpr>),

    /// Named pointcut, optionally qualified by the aspect declaring it
    Reference {
        aspect: Option<ClassNamePattern>,
        name: String,
        arguments: Vec<TypePattern>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AnnotationDesignator {
    /// `@annotation`: annotation on the member the shadow is about
    Member,
    This,
    Target,
    Within,
    WithinCode,
}

impl AnnotationDesignator {
    pub fn keyword(self) -> &'static str {
        match self {
            AnnotationDesignator::Member => "@annotation",
            AnnotationDesignator::This => "@this",
            AnnotationDesignator::Target => "@target",
            AnnotationDesignator::Within => "@within",
            AnnotationDesignator::WithinCode => "@withincode",
        }
    }
}

/// Malformed pointcut text
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyntaxError {
    pub message: String,

    /// Byte range in the source text
    pub span: Range<usize>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (at {}..{})",
            self.message, self.span.start, self.span.end
        )
    }
}

impl PointcutExpr {
    /// Visit every named reference in the expression
    pub fn references(&self) -> Vec<&str> {
        let mut found = vec![];
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            PointcutExpr::Reference { name, .. } => found.push(name),
            PointcutExpr::Cflow { inner, .. } | PointcutExpr::Not(inner) => {
                inner.collect_references(found)
            }
            PointcutExpr::And(left, right) | PointcutExpr::Or(left, right) => {
                left.collect_references(found);
                right.collect_references(found);
            }
            _ => (),
        }
    }
}
