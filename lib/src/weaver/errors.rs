use crate::jvm;
use crate::weaver::syntax::SyntaxError;
use std::fmt;

/// Problem with a pointcut, advice, or aspect declaration
///
/// These are found before any matching happens and only ever disable the declaration they are
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    Syntax {
        pointcut: String,
        error: SyntaxError,
    },

    /// Reference to a named pointcut that doesn't exist
    UnresolvedPointcutName(String),

    /// Named pointcuts whose definitions refer back to themselves
    CircularPointcut(Vec<String>),

    /// Reference passes the wrong number of arguments
    ArgumentCount {
        pointcut: String,
        expected: usize,
        found: usize,
    },

    /// Formal that the pointcut never binds
    UnboundFormal(String),

    /// Formal bound more than once, or under `||` or `!`
    AmbiguousBinding(String),

    /// Formal bound inside `cflow` or `cflowbelow`
    BindingInCflow(String),

    /// Binding form which is parsed but can't be woven (eg. binding an annotation)
    UnsupportedBinding(String),

    /// Type pattern where an exact type is needed, or a name that doesn't resolve to a class
    UnknownType(String),

    /// Non-static advice on an aspect without a static `aspectOf()`
    MissingAspectOf(String),

    /// Declaration refers to a method the aspect doesn't have
    MissingMethod(String),

    /// Malformed annotation or otherwise inconsistent declaration
    Invalid(String),
}

/// Failure to weave a type
#[derive(Debug)]
pub enum Error {
    Jvm(jvm::Error),
    Declaration(DeclarationError),

    /// Advice whose precedence is circular at some shadow (names of the members of the cycle)
    CircularPrecedence(Vec<String>),

    /// Something the weaver assumes about its inputs (or itself) doesn't hold
    Internal(String),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<DeclarationError> for Error {
    fn from(err: DeclarationError) -> Error {
        Error::Declaration(err)
    }
}

impl fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationError::Syntax { pointcut, error } => {
                write!(f, "malformed pointcut `{}`: {}", pointcut, error)
            }
            DeclarationError::UnresolvedPointcutName(name) => {
                write!(f, "can't find referenced pointcut `{}`", name)
            }
            DeclarationError::CircularPointcut(names) => {
                write!(f, "circular pointcut declarations: {}", names.join(" -> "))
            }
            DeclarationError::ArgumentCount {
                pointcut,
                expected,
                found,
            } => write!(
                f,
                "pointcut `{}` takes {} argument(s) but {} were supplied",
                pointcut, expected, found
            ),
            DeclarationError::UnboundFormal(name) => {
                write!(f, "formal `{}` is not bound in the pointcut", name)
            }
            DeclarationError::AmbiguousBinding(name) => {
                write!(f, "ambiguous binding of formal `{}`", name)
            }
            DeclarationError::BindingInCflow(name) => {
                write!(f, "formal `{}` can't be bound inside cflow", name)
            }
            DeclarationError::UnsupportedBinding(what) => {
                write!(f, "unsupported binding: {}", what)
            }
            DeclarationError::UnknownType(name) => write!(f, "can't resolve type `{}`", name),
            DeclarationError::MissingAspectOf(aspect) => write!(
                f,
                "aspect {} has non-static advice but no static aspectOf() method",
                aspect
            ),
            DeclarationError::MissingMethod(method) => write!(f, "can't find method {}", method),
            DeclarationError::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Jvm(err) => write!(f, "{}", err),
            Error::Declaration(err) => write!(f, "{}", err),
            Error::CircularPrecedence(members) => {
                write!(f, "circular advice precedence: {{{}}}", members.join(", "))
            }
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}
