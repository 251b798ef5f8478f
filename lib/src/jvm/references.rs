use super::{
    BinaryName, FieldType, MethodDescriptor, Name, RefType, RenderDescriptor, UnqualifiedName,
};
use std::fmt;

/// Symbolic reference to a field, as it appears in `getfield`/`putfield`/...
///
/// The class is the one named at the use site, which need not be the class declaring the field.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
}

/// Symbolic reference to a method, as it appears in the `invoke*` instructions
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Arrays can be the target of calls too (eg. `int[].clone()`)
    pub class: RefType<BinaryName>,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,

    /// Whether the constant is an `InterfaceMethodref`
    pub is_interface: bool,
}

impl MethodRef {
    /// Is this a constructor reference?
    pub fn is_init(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// Class (ignoring array receivers) the reference names
    pub fn object_class(&self) -> Option<&BinaryName> {
        match &self.class {
            RefType::Object(name) => Some(name),
            _ => None,
        }
    }
}

/// Constants which can be loaded with `ldc`/`ldc_w`/`ldc2_w`
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantData {
    String(String),
    Class(RefType<BinaryName>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

impl ConstantData {
    /// Does this constant take two stack slots?
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantData::Long(_) | ConstantData::Double(_))
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.class.as_str(),
            self.name.as_str(),
            self.descriptor.render()
        )
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match &self.class {
            RefType::Object(name) => name.as_str().to_owned(),
            other => other.render(),
        };
        write!(
            f,
            "{}.{}{}",
            class,
            self.name.as_str(),
            self.descriptor.render()
        )
    }
}

