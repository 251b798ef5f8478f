//! Graph of the classes and members the weaver knows about
//!
//! Classes come from three places: class files being woven, a small built-in model of the Java
//! standard library, and placeholders for names that are referenced but were never supplied.
//! The last sort is what makes static type questions undecidable, so queries about them answer
//! `None` rather than guessing.

use super::code::InvokeType;
use super::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldRef, FieldType, MethodAccessFlags,
    MethodDescriptor, MethodRef, Name, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::RefId;
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

mod annotations;
mod assignable;
mod library;

pub use annotations::*;
pub use assignable::*;
pub use library::*;

pub type ClassId<'g> = RefId<'g, ClassData<'g>>;
pub type MethodId<'g> = RefId<'g, MethodData<'g>>;
pub type FieldId<'g> = RefId<'g, FieldData<'g>>;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
    method_arena: Arena<MethodData<'g>>,
    field_arena: Arena<FieldData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
            method_arena: Arena::new(),
            field_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        ClassGraphArenas::new()
    }
}

/// Tracks the relationships between classes/interfaces and the members on those classes
///
/// Everything is allocated in arenas that outlive the graph, so handles can be copied freely and
/// classes can gain members (eg. a cflow counter field) while other parts of the weaver hold on
/// to them.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<BinaryName, &'g ClassData<'g>>,

    /// Classes in the order they were added
    class_order: RefCell<Vec<ClassId<'g>>>,
}

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
            class_order: RefCell::new(vec![]),
        }
    }

    pub fn lookup_class(&self, name: &BinaryName) -> Option<ClassId<'g>> {
        self.classes.map_get(name, |class| RefId(*class))
    }

    /// Look up a class, adding a placeholder if it isn't known
    pub fn lookup_or_missing(&self, name: &BinaryName) -> ClassId<'g> {
        match self.lookup_class(name) {
            Some(class) => class,
            None => {
                log::debug!("Class {} is not available, treating it as missing", name);
                self.add_class(ClassData::missing(name.clone()))
            }
        }
    }

    /// Resolve every class in a reference type
    pub fn resolve_ref_type(&self, ref_type: &RefType<BinaryName>) -> RefType<ClassId<'g>> {
        ref_type.map(|name| self.lookup_or_missing(name))
    }

    pub fn resolve_field_type(&self, field_type: &FieldType<BinaryName>) -> FieldType<ClassId<'g>> {
        field_type.map(|name| self.lookup_or_missing(name))
    }

    /// Add a new class to the class graph
    ///
    /// If there is already a class of the same name, that class is returned instead.
    pub fn add_class(&self, data: ClassData<'g>) -> ClassId<'g> {
        if let Some(existing) = self.lookup_class(&data.name) {
            log::warn!("Class {} is already in the class graph", data.name);
            return existing;
        }
        let data = &*self.arenas.class_arena.alloc(data);
        self.classes.insert(data.name.clone(), data);
        self.class_order.borrow_mut().push(RefId(data));
        RefId(data)
    }

    /// Add a field to the class graph and to its class
    pub fn add_field(&self, field: FieldData<'g>) -> FieldId<'g> {
        let data = &*self.arenas.field_arena.alloc(field);
        data.class.fields.push(data);
        RefId(data)
    }

    /// Add a method to the class graph and to its class
    ///
    /// Adding a method with the same name and descriptor as an existing one returns the existing
    /// method.
    pub fn add_method(&self, method: MethodData<'g>) -> MethodId<'g> {
        if let Some(m) = method.class.declared_method(&method.name, &method.descriptor) {
            m
        } else {
            let data = &*self.arenas.method_arena.alloc(method);
            data.class.methods.push(data);
            RefId(data)
        }
    }

    /// Every known class, in the order they were added
    pub fn classes(&self) -> Vec<ClassId<'g>> {
        self.class_order.borrow().clone()
    }
}

/// Where the definition of a class came from
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ClassOrigin {
    /// Read from a class file being woven
    Woven,

    /// Part of the built-in model of the standard library
    Library,

    /// Referenced but never defined, so nothing is known about its super types or members
    Missing,
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    pub origin: ClassOrigin,

    /// Superclass is only ever missing for `java/lang/Object` itself (or for missing classes)
    pub superclass: Option<ClassId<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: Vec<ClassId<'g>>,

    pub access_flags: ClassAccessFlags,

    /// Annotations declared on the class
    pub annotations: Vec<AnnotationData>,

    /// Methods
    pub methods: FrozenVec<&'g MethodData<'g>>,

    /// Fields
    pub fields: FrozenVec<&'g FieldData<'g>>,
}

impl<'g> ClassData<'g> {
    pub fn new(
        name: BinaryName,
        origin: ClassOrigin,
        superclass: Option<ClassId<'g>>,
        interfaces: Vec<ClassId<'g>>,
        access_flags: ClassAccessFlags,
    ) -> ClassData<'g> {
        ClassData {
            name,
            origin,
            superclass,
            interfaces,
            access_flags,
            annotations: vec![],
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
        }
    }

    /// Placeholder for a class that was never defined
    pub fn missing(name: BinaryName) -> ClassData<'g> {
        ClassData::new(
            name,
            ClassOrigin::Missing,
            None,
            vec![],
            ClassAccessFlags::PUBLIC,
        )
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_missing(&self) -> bool {
        self.origin == ClassOrigin::Missing
    }

    /// Is there an annotation of this type on the class?
    pub fn has_annotation(&self, annotation: &BinaryName) -> bool {
        self.annotations.iter().any(|a| &a.type_name == annotation)
    }

    pub fn annotation(&self, annotation: &BinaryName) -> Option<&AnnotationData> {
        self.annotations.iter().find(|a| &a.type_name == annotation)
    }
}

impl<'g> ClassId<'g> {
    /// Method declared directly on this class
    pub fn declared_method(
        self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Option<MethodId<'g>> {
        self.0
            .methods
            .iter()
            .find(|m| &m.name == name && &m.descriptor == descriptor)
            .map(RefId)
    }

    /// Field declared directly on this class
    pub fn declared_field(self, name: &UnqualifiedName) -> Option<FieldId<'g>> {
        self.0.fields.iter().find(|f| &f.name == name).map(RefId)
    }

    /// Resolve a method by searching this class, then its superclasses, then interfaces
    ///
    /// Returns `None` if the method isn't found (which may be because part of the hierarchy is
    /// missing).
    pub fn find_method(
        self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Option<MethodId<'g>> {
        let mut next = Some(self);
        while let Some(class) = next {
            if let Some(method) = class.declared_method(name, descriptor) {
                return Some(method);
            }
            next = class.superclass;
        }
        self.all_supertypes()
            .into_iter()
            .filter(|c| c.is_interface())
            .find_map(|interface| interface.declared_method(name, descriptor))
    }

    /// Resolve a field by searching this class, its interfaces, then its superclasses
    pub fn find_field(self, name: &UnqualifiedName) -> Option<FieldId<'g>> {
        let mut next = Some(self);
        while let Some(class) = next {
            if let Some(field) = class.declared_field(name) {
                return Some(field);
            }
            for interface in &class.interfaces {
                if let Some(field) = interface.find_field(name) {
                    return Some(field);
                }
            }
            next = class.superclass;
        }
        None
    }

    /// This class followed by every transitive super type, without duplicates
    pub fn all_supertypes(self) -> Vec<ClassId<'g>> {
        let mut visited: Vec<ClassId<'g>> = vec![self];
        let mut idx = 0;
        while idx < visited.len() {
            let class = visited[idx];
            for super_type in class.superclass.iter().chain(class.interfaces.iter()) {
                if !visited.contains(super_type) {
                    visited.push(*super_type);
                }
            }
            idx += 1;
        }
        visited
    }

    /// Is the full chain of super types known?
    pub fn is_hierarchy_complete(self) -> bool {
        self.all_supertypes().iter().all(|c| !c.is_missing())
    }
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> RenderDescriptor for ClassData<'g> {
    fn render_to(&self, write_to: &mut String) {
        self.name.render_to(write_to)
    }
}

impl<'g> Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

pub struct MethodData<'g> {
    /// Class
    pub class: ClassId<'g>,

    /// Name of the method
    pub name: UnqualifiedName,

    /// Type of the method
    pub descriptor: MethodDescriptor<BinaryName>,

    pub access_flags: MethodAccessFlags,

    /// Annotations declared on the method
    pub annotations: Vec<AnnotationData>,
}

impl<'g> MethodData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_init(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    pub fn has_annotation(&self, annotation: &BinaryName) -> bool {
        self.annotations.iter().any(|a| &a.type_name == annotation)
    }

    /// Symbolic reference to the method, as its own class would refer to it
    pub fn as_ref(&self) -> MethodRef {
        MethodRef {
            class: RefType::Object(self.class.name.clone()),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
            is_interface: self.class.is_interface(),
        }
    }

    /// With the exception of `invokespecial` vs. `invokevirtual`, there is usually only one valid
    /// way to invoke a method. This function finds it.
    pub fn infer_invoke_type(&self) -> InvokeType {
        InvokeType::infer(self.is_static(), self.class.is_interface(), &self.as_ref())
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{}:{}",
            self.class.name.as_str(),
            self.name.as_str(),
            self.descriptor.render(),
        ))
    }
}

pub struct FieldData<'g> {
    /// Class
    ///
    /// Note: this is a pointer back to the class (so don't derive `Debug`)
    pub class: ClassId<'g>,

    /// Name of the field
    pub name: UnqualifiedName,

    /// Type of the field
    pub descriptor: FieldType<BinaryName>,

    pub access_flags: FieldAccessFlags,

    /// Annotations declared on the field
    pub annotations: Vec<AnnotationData>,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn has_annotation(&self, annotation: &BinaryName) -> bool {
        self.annotations.iter().any(|a| &a.type_name == annotation)
    }

    pub fn as_ref(&self) -> FieldRef {
        FieldRef {
            class: self.class.name.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<'g> Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}.{}:{}",
            self.class.name.as_str(),
            self.name.as_str(),
            self.descriptor.render(),
        ))
    }
}
