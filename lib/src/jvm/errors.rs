use super::class_file::{Constant, ConstantPoolOverflow};
use super::code::SynLabel;
use crate::util::Offset;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConstantPoolOverflow {
        constant: Constant,
        offset: u16,
    },
    IoError(std::io::Error),

    /// Class file bytes don't follow the format
    MalformedClassFile(String),

    /// A constant pool index points at the wrong sort of constant
    BadConstant {
        index: u16,
        expected: &'static str,
    },
    BadDescriptor(String),

    /// Instruction outside the supported subset (eg. `jsr` or `invokedynamic`)
    UnsupportedOpcode {
        opcode: u8,
        offset: usize,
    },

    /// Constant which cannot be written at the requested class file version
    UnsupportedConstant(Constant),

    /// Member which cannot be written at the requested class file version
    UnsupportedMember(String),

    MethodCodeMaxStackOverflow(Offset),
    MethodCodeMaxLocalsOverflow(Offset),
    MethodCodeOverflow(Offset),

    /// A branch refers to a label that is never placed
    UndefinedLabel(SynLabel),

    /// A label is placed twice
    DuplicateLabel(SynLabel),

    /// Control flow reaches the same point with different stack depths
    InconsistentStackDepth {
        item: usize,
        expected: usize,
        found: usize,
    },

    /// Stack would underflow at the given code item
    StackUnderflow(usize),

    MissingClass(String),
    MissingMember(String),

    /// Instruction edit that doesn't fit the method it is applied to
    InvalidEdit(String),
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: overflow.constant,
            offset: overflow.offset,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { constant, offset } => {
                write!(f, "constant pool overflow at {} adding {:?}", offset, constant)
            }
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::MalformedClassFile(msg) => write!(f, "malformed class file: {}", msg),
            Error::BadConstant { index, expected } => {
                write!(f, "constant #{} is not a {}", index, expected)
            }
            Error::BadDescriptor(desc) => write!(f, "bad descriptor `{}`", desc),
            Error::UnsupportedOpcode { opcode, offset } => {
                write!(f, "unsupported opcode 0x{:02x} at offset {}", opcode, offset)
            }
            Error::UnsupportedConstant(constant) => {
                write!(f, "constant {:?} cannot be written at this version", constant)
            }
            Error::UnsupportedMember(member) => {
                write!(f, "{} cannot be written at this version", member)
            }
            Error::MethodCodeMaxStackOverflow(offset) => {
                write!(f, "max stack {} does not fit in a u16", offset.0)
            }
            Error::MethodCodeMaxLocalsOverflow(offset) => {
                write!(f, "max locals {} does not fit in a u16", offset.0)
            }
            Error::MethodCodeOverflow(offset) => {
                write!(f, "method code is too long ({} bytes)", offset.0)
            }
            Error::UndefinedLabel(label) => write!(f, "label {:?} is never placed", label),
            Error::DuplicateLabel(label) => write!(f, "label {:?} is placed twice", label),
            Error::InconsistentStackDepth {
                item,
                expected,
                found,
            } => write!(
                f,
                "stack depth at item {} is {} on one path and {} on another",
                item, expected, found
            ),
            Error::StackUnderflow(item) => write!(f, "stack underflow at item {}", item),
            Error::MissingClass(name) => write!(f, "missing class {}", name),
            Error::MissingMember(name) => write!(f, "missing member {}", name),
            Error::InvalidEdit(msg) => write!(f, "invalid edit: {}", msg),
        }
    }
}
