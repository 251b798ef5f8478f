//! Join point shadows: the places in bytecode where a join point can happen
//!
//! Shadows are found once per woven class, before anything is spliced, and are not changed
//! afterwards. Their positions refer to the method bodies as they were read.

use crate::jvm::class_graph::{AnnotationData, ClassGraph, ClassId, FieldId, JavaLibrary, MethodId};
use crate::jvm::code::{Code, CodeItem, Instruction, InvokeType};
use crate::jvm::model::{Class, Method};
use crate::jvm::{
    BinaryName, FieldRef, FieldType, MethodAccessFlags, MethodDescriptor, MethodRef, Name, RefType,
    RenderDescriptor, UnqualifiedName,
};
use crate::weaver::SourceLocation;
use bitflags::bitflags;
use std::collections::HashSet;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ShadowKind {
    MethodCall,
    ConstructorCall,
    MethodExecution,
    ConstructorExecution,
    FieldGet,
    FieldSet,
    ExceptionHandler,
    StaticInitialization,
}

bitflags! {
    /// Set of shadow kinds
    pub struct ShadowKinds: u16 {
        const METHOD_CALL = 0x0001;
        const CONSTRUCTOR_CALL = 0x0002;
        const METHOD_EXECUTION = 0x0004;
        const CONSTRUCTOR_EXECUTION = 0x0008;
        const FIELD_GET = 0x0010;
        const FIELD_SET = 0x0020;
        const EXCEPTION_HANDLER = 0x0040;
        const STATIC_INITIALIZATION = 0x0080;

        const CALLS = Self::METHOD_CALL.bits | Self::CONSTRUCTOR_CALL.bits;
        const EXECUTIONS = Self::METHOD_EXECUTION.bits | Self::CONSTRUCTOR_EXECUTION.bits;
    }
}

impl ShadowKind {
    pub const ALL: [ShadowKind; 8] = [
        ShadowKind::MethodCall,
        ShadowKind::ConstructorCall,
        ShadowKind::MethodExecution,
        ShadowKind::ConstructorExecution,
        ShadowKind::FieldGet,
        ShadowKind::FieldSet,
        ShadowKind::ExceptionHandler,
        ShadowKind::StaticInitialization,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShadowKind::MethodCall => "method-call",
            ShadowKind::ConstructorCall => "constructor-call",
            ShadowKind::MethodExecution => "method-execution",
            ShadowKind::ConstructorExecution => "constructor-execution",
            ShadowKind::FieldGet => "field-get",
            ShadowKind::FieldSet => "field-set",
            ShadowKind::ExceptionHandler => "exception-handler",
            ShadowKind::StaticInitialization => "static-initialization",
        }
    }

    pub fn bit(self) -> ShadowKinds {
        match self {
            ShadowKind::MethodCall => ShadowKinds::METHOD_CALL,
            ShadowKind::ConstructorCall => ShadowKinds::CONSTRUCTOR_CALL,
            ShadowKind::MethodExecution => ShadowKinds::METHOD_EXECUTION,
            ShadowKind::ConstructorExecution => ShadowKinds::CONSTRUCTOR_EXECUTION,
            ShadowKind::FieldGet => ShadowKinds::FIELD_GET,
            ShadowKind::FieldSet => ShadowKinds::FIELD_SET,
            ShadowKind::ExceptionHandler => ShadowKinds::EXCEPTION_HANDLER,
            ShadowKind::StaticInitialization => ShadowKinds::STATIC_INITIALIZATION,
        }
    }

    /// Does the shadow cover a whole method body (as opposed to a single instruction)?
    pub fn is_enclosing(self) -> bool {
        matches!(
            self,
            ShadowKind::MethodExecution
                | ShadowKind::ConstructorExecution
                | ShadowKind::StaticInitialization
        )
    }
}

impl fmt::Display for ShadowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ShadowKinds {
    pub fn has(self, kind: ShadowKind) -> bool {
        self.contains(kind.bit())
    }
}

/// Declaration a shadow refers to
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ShadowMember<'g> {
    Method(MethodId<'g>),
    Field(FieldId<'g>),
}

/// Signature of the thing a shadow is about
///
/// For calls and field accesses this is the member named at the use site. For executions it is
/// the method whose body is executed, for handlers the caught exception type, and for static
/// initialization the class itself.
#[derive(Clone, Debug)]
pub struct ShadowSignature<'g> {
    /// Statically named declaring type (`java/lang/Object` for methods called on arrays)
    pub declaring_type: ClassId<'g>,

    /// `None` for handlers and static initialization
    pub name: Option<UnqualifiedName>,

    pub parameters: Vec<FieldType<ClassId<'g>>>,

    /// Return type of methods, type of fields
    pub return_type: Option<FieldType<ClassId<'g>>>,

    /// Declaration the signature resolves to (`None` when it can't be found)
    pub member: Option<ShadowMember<'g>>,

    pub is_field: bool,
}

impl<'g> ShadowSignature<'g> {
    /// Signature of a method, as declared
    pub fn of_method(method: MethodId<'g>, class_graph: &ClassGraph<'g>) -> ShadowSignature<'g> {
        ShadowSignature {
            declaring_type: method.class,
            name: Some(method.name.clone()),
            parameters: method
                .descriptor
                .parameters
                .iter()
                .map(|param| class_graph.resolve_field_type(param))
                .collect(),
            return_type: method
                .descriptor
                .return_type
                .as_ref()
                .map(|ret| class_graph.resolve_field_type(ret)),
            member: Some(ShadowMember::Method(method)),
            is_field: false,
        }
    }

    /// Access flags of the resolved member
    pub fn modifiers(&self) -> Option<u16> {
        match self.member? {
            ShadowMember::Method(method) => Some(method.access_flags.bits()),
            ShadowMember::Field(field) => Some(field.access_flags.bits()),
        }
    }

    /// Annotations declared on the resolved member
    pub fn annotations(&self) -> Option<&'g [AnnotationData]> {
        match self.member? {
            ShadowMember::Method(method) => Some(method.0.annotations.as_slice()),
            ShadowMember::Field(field) => Some(field.0.annotations.as_slice()),
        }
    }

    /// Types on which the signature can be said to be declared
    ///
    /// An overridable method has a signature on the named type and on every super type that also
    /// declares it, so `call(* Collection.size())` matches calls to `ArrayList.size()`.
    pub fn declaring_types(&self) -> Vec<ClassId<'g>> {
        let overridable = match (self.member, &self.name) {
            (Some(ShadowMember::Method(method)), Some(name)) => {
                name != &UnqualifiedName::INIT
                    && !method
                        .access_flags
                        .intersects(MethodAccessFlags::STATIC | MethodAccessFlags::PRIVATE)
            }
            _ => false,
        };
        if !overridable {
            return vec![self.declaring_type];
        }
        let (name, descriptor) = match self.member {
            Some(ShadowMember::Method(method)) => (&method.0.name, &method.0.descriptor),
            _ => return vec![self.declaring_type],
        };
        self.declaring_type
            .all_supertypes()
            .into_iter()
            .filter(|class| {
                *class == self.declaring_type || class.declared_method(name, descriptor).is_some()
            })
            .collect()
    }
}

/// Where in the enclosing method a shadow is
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ShadowPosition {
    /// The instruction at this index in the body
    Instruction(usize),

    /// The body, starting at this index (after the `super(...)` call in constructors)
    Body { start: usize },

    /// The label item at this index starts an exception handler
    Handler(usize),

    /// Static initialization of a class without `<clinit>`
    NoInitializer,
}

/// Candidate join point location
#[derive(Clone, Debug)]
pub struct Shadow<'g> {
    pub kind: ShadowKind,
    pub signature: ShadowSignature<'g>,
    pub enclosing_class: ClassId<'g>,

    /// Method whose body contains the shadow
    pub enclosing_method: Option<MethodId<'g>>,

    /// Static type of `this` (absent in static code and before `super(...)` returns)
    pub this_type: Option<ClassId<'g>>,

    /// Static type of the target (absent for static members and constructor calls)
    pub target_type: Option<RefType<ClassId<'g>>>,

    /// Static types of the arguments
    pub arg_types: Vec<FieldType<ClassId<'g>>>,

    /// Static type of the value produced on normal completion
    pub return_type: Option<FieldType<ClassId<'g>>>,

    pub position: ShadowPosition,
    pub location: SourceLocation,
}

/// The type information fast matching is limited to
#[derive(Copy, Clone, Debug)]
pub struct ShadowShape<'a, 'g> {
    pub kind: ShadowKind,
    pub enclosing_class: ClassId<'g>,
    pub declaring_type: ClassId<'g>,
    pub target_type: Option<&'a RefType<ClassId<'g>>>,
}

impl<'g> Shadow<'g> {
    pub fn shape(&self) -> ShadowShape<'_, 'g> {
        ShadowShape {
            kind: self.kind,
            enclosing_class: self.enclosing_class,
            declaring_type: self.signature.declaring_type,
            target_type: self.target_type.as_ref(),
        }
    }
}

impl<'g> fmt::Display for Shadow<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind, self.signature.declaring_type.name.as_str())?;
        if let Some(name) = &self.signature.name {
            write!(f, ".{}", name.as_str())?;
        }
        f.write_str(")")
    }
}

/// Find every shadow in a class
pub fn find_shadows<'g>(
    class: &Class<'g>,
    class_graph: &ClassGraph<'g>,
    java: &JavaLibrary<'g>,
) -> Vec<Shadow<'g>> {
    let finder = ShadowFinder {
        class,
        class_graph,
        java,
    };
    let mut shadows = vec![];

    let clinit = class
        .methods
        .iter()
        .find(|method| method.id.name == UnqualifiedName::CLINIT);
    shadows.push(finder.static_initialization(clinit));

    for method in &class.methods {
        if let Some(code) = &method.code_impl {
            finder.method_shadows(method, code, &mut shadows);
        }
    }
    log::trace!(
        "Found {} shadows in {}",
        shadows.len(),
        class.id.name.as_str()
    );
    shadows
}

struct ShadowFinder<'a, 'g> {
    class: &'a Class<'g>,
    class_graph: &'a ClassGraph<'g>,
    java: &'a JavaLibrary<'g>,
}

impl<'a, 'g> ShadowFinder<'a, 'g> {
    fn location(&self, method: Option<&Method<'g>>, line: Option<u16>) -> SourceLocation {
        SourceLocation {
            class: Some(self.class.id.name.as_str().to_owned()),
            source_file: self.class.source_file.clone(),
            member: method.map(|method| {
                format!(
                    "{}{}",
                    method.id.name.as_str(),
                    method.id.descriptor.render()
                )
            }),
            line,
        }
    }

    fn resolve_descriptor(
        &self,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> (Vec<FieldType<ClassId<'g>>>, Option<FieldType<ClassId<'g>>>) {
        let parameters = descriptor
            .parameters
            .iter()
            .map(|param| self.class_graph.resolve_field_type(param))
            .collect();
        let return_type = descriptor
            .return_type
            .as_ref()
            .map(|ret| self.class_graph.resolve_field_type(ret));
        (parameters, return_type)
    }

    fn static_initialization(&self, clinit: Option<&Method<'g>>) -> Shadow<'g> {
        let position = match clinit {
            Some(_) => ShadowPosition::Body { start: 0 },
            None => ShadowPosition::NoInitializer,
        };
        let line = clinit
            .and_then(|m| m.code_impl.as_ref())
            .and_then(|code| code.line_number_at(code.items.len()));
        Shadow {
            kind: ShadowKind::StaticInitialization,
            signature: ShadowSignature {
                declaring_type: self.class.id,
                name: None,
                parameters: vec![],
                return_type: None,
                member: clinit.map(|m| ShadowMember::Method(m.id)),
                is_field: false,
            },
            enclosing_class: self.class.id,
            enclosing_method: clinit.map(|m| m.id),
            this_type: None,
            target_type: None,
            arg_types: vec![],
            return_type: None,
            position,
            location: self.location(clinit, line),
        }
    }

    fn method_shadows(&self, method: &Method<'g>, code: &Code, shadows: &mut Vec<Shadow<'g>>) {
        let id = method.id;
        if id.name == UnqualifiedName::CLINIT {
            self.body_shadows(method, code, None, shadows);
            return;
        }
        let this_type = if id.is_static() {
            None
        } else {
            Some(self.class.id)
        };

        // Constructor code before `super(...)`/`this(...)` has no usable `this`, so it gets no
        // shadows (and the execution shadow starts after the call).
        let body_start = if id.is_init() {
            match constructor_body_start(code) {
                Some(start) => start,
                None => {
                    log::debug!("Constructor {:?} never initializes `this`", id);
                    return;
                }
            }
        } else {
            0
        };

        if !id.access_flags.contains(MethodAccessFlags::BRIDGE) {
            let (parameters, return_type) = self.resolve_descriptor(&id.descriptor);
            let kind = if id.is_init() {
                ShadowKind::ConstructorExecution
            } else {
                ShadowKind::MethodExecution
            };
            shadows.push(Shadow {
                kind,
                signature: ShadowSignature {
                    declaring_type: self.class.id,
                    name: Some(id.name.clone()),
                    parameters: parameters.clone(),
                    return_type: return_type.clone(),
                    member: Some(ShadowMember::Method(id)),
                    is_field: false,
                },
                enclosing_class: self.class.id,
                enclosing_method: Some(id),
                this_type,
                target_type: this_type.map(RefType::Object),
                arg_types: parameters,
                return_type,
                position: ShadowPosition::Body { start: body_start },
                location: self.location(Some(method), code.line_number_at(body_start)),
            });
        }

        self.body_shadows(method, code, Some(body_start), shadows);
    }

    /// Calls, field accesses, and handlers in a body
    fn body_shadows(
        &self,
        method: &Method<'g>,
        code: &Code,
        body_start: Option<usize>,
        shadows: &mut Vec<Shadow<'g>>,
    ) {
        let this_type = if method.id.is_static() {
            None
        } else {
            Some(self.class.id)
        };
        let start = body_start.unwrap_or(0);
        let mut pending_news: Vec<&BinaryName> = vec![];

        for (idx, item) in code.items.iter().enumerate() {
            let insn = match item {
                CodeItem::Instruction(insn) => insn,
                _ => continue,
            };
            let shadow = match insn {
                Instruction::New(RefType::Object(class)) => {
                    pending_news.push(class);
                    None
                }
                Instruction::Invoke(_, method_ref) if method_ref.is_init() => {
                    let class = method_ref.object_class();
                    match pending_news.iter().rposition(|pending| Some(*pending) == class) {
                        Some(pending) => {
                            pending_news.remove(pending);
                            Some(self.constructor_call(method_ref))
                        }
                        None => None,
                    }
                }
                Instruction::Invoke(invoke_type, method_ref) => {
                    Some(self.method_call(*invoke_type, method_ref))
                }
                Instruction::GetField(field) => Some(self.field_access(field, false, false)),
                Instruction::GetStatic(field) => Some(self.field_access(field, true, false)),
                Instruction::PutField(field) => Some(self.field_access(field, false, true)),
                Instruction::PutStatic(field) => Some(self.field_access(field, true, true)),
                _ => None,
            };
            if let (Some(mut shadow), true) = (shadow, idx >= start) {
                shadow.enclosing_method = Some(method.id);
                shadow.this_type = this_type;
                shadow.position = ShadowPosition::Instruction(idx);
                shadow.location = self.location(Some(method), code.line_number_at(idx));
                shadows.push(shadow);
            }
        }

        // Handlers (`finally` blocks catch everything and are not handler join points)
        let positions = match code.label_positions() {
            Ok(positions) => positions,
            Err(err) => {
                log::debug!("Skipping handlers of {:?}: {}", method.id, err);
                return;
            }
        };
        let mut seen = HashSet::new();
        for handler in &code.exception_table {
            let catch_type = match &handler.catch_type {
                Some(catch_type) => catch_type,
                None => continue,
            };
            let idx = match positions.get(&handler.handler) {
                Some(idx) if *idx >= start && seen.insert(handler.handler) => *idx,
                _ => continue,
            };
            let exception = self.class_graph.lookup_or_missing(catch_type);
            shadows.push(Shadow {
                kind: ShadowKind::ExceptionHandler,
                signature: ShadowSignature {
                    declaring_type: exception,
                    name: None,
                    parameters: vec![],
                    return_type: None,
                    member: None,
                    is_field: false,
                },
                enclosing_class: self.class.id,
                enclosing_method: Some(method.id),
                this_type,
                target_type: None,
                arg_types: vec![FieldType::object(exception)],
                return_type: None,
                position: ShadowPosition::Handler(idx),
                location: self.location(Some(method), code.line_number_at(idx + 1)),
            });
        }
    }

    /// Shadow with the placement fields left for the caller to fill in
    fn partial(&self, kind: ShadowKind, signature: ShadowSignature<'g>) -> Shadow<'g> {
        Shadow {
            kind,
            signature,
            enclosing_class: self.class.id,
            enclosing_method: None,
            this_type: None,
            target_type: None,
            arg_types: vec![],
            return_type: None,
            position: ShadowPosition::NoInitializer,
            location: SourceLocation::default(),
        }
    }

    fn method_call(&self, invoke_type: InvokeType, method_ref: &MethodRef) -> Shadow<'g> {
        let declaring_type = match &method_ref.class {
            RefType::Object(name) => self.class_graph.lookup_or_missing(name),
            _ => self.java.object,
        };
        let (parameters, return_type) = self.resolve_descriptor(&method_ref.descriptor);
        let member = declaring_type
            .find_method(&method_ref.name, &method_ref.descriptor)
            .map(ShadowMember::Method);
        let mut shadow = self.partial(
            ShadowKind::MethodCall,
            ShadowSignature {
                declaring_type,
                name: Some(method_ref.name.clone()),
                parameters: parameters.clone(),
                return_type: return_type.clone(),
                member,
                is_field: false,
            },
        );
        if invoke_type != InvokeType::Static {
            shadow.target_type = Some(self.class_graph.resolve_ref_type(&method_ref.class));
        }
        shadow.arg_types = parameters;
        shadow.return_type = return_type;
        shadow
    }

    fn constructor_call(&self, method_ref: &MethodRef) -> Shadow<'g> {
        let declaring_type = match &method_ref.class {
            RefType::Object(name) => self.class_graph.lookup_or_missing(name),
            _ => self.java.object,
        };
        let (parameters, _) = self.resolve_descriptor(&method_ref.descriptor);
        let member = declaring_type
            .declared_method(&method_ref.name, &method_ref.descriptor)
            .map(ShadowMember::Method);
        let mut shadow = self.partial(
            ShadowKind::ConstructorCall,
            ShadowSignature {
                declaring_type,
                name: Some(UnqualifiedName::INIT),
                parameters: parameters.clone(),
                return_type: None,
                member,
                is_field: false,
            },
        );
        shadow.arg_types = parameters;
        shadow.return_type = Some(FieldType::object(declaring_type));
        shadow
    }

    fn field_access(&self, field: &FieldRef, is_static: bool, is_set: bool) -> Shadow<'g> {
        let declaring_type = self.class_graph.lookup_or_missing(&field.class);
        let field_type = self.class_graph.resolve_field_type(&field.descriptor);
        let member = declaring_type.find_field(&field.name).map(ShadowMember::Field);
        let kind = if is_set {
            ShadowKind::FieldSet
        } else {
            ShadowKind::FieldGet
        };
        let mut shadow = self.partial(
            kind,
            ShadowSignature {
                declaring_type,
                name: Some(field.name.clone()),
                parameters: vec![],
                return_type: Some(field_type.clone()),
                member,
                is_field: true,
            },
        );
        if !is_static {
            shadow.target_type = Some(RefType::Object(declaring_type));
        }
        if is_set {
            shadow.arg_types = vec![field_type];
        } else {
            shadow.return_type = Some(field_type);
        }
        shadow
    }
}

/// Index just after the `super(...)` or `this(...)` call of a constructor body
///
/// `new` instructions are paired with the `<init>` calls that consume them. The first `<init>`
/// call without a pending `new` is the one initializing `this`.
pub fn constructor_body_start(code: &Code) -> Option<usize> {
    let mut pending_news: Vec<&BinaryName> = vec![];
    for (idx, item) in code.items.iter().enumerate() {
        match item {
            CodeItem::Instruction(Instruction::New(RefType::Object(class))) => {
                pending_news.push(class)
            }
            CodeItem::Instruction(Instruction::Invoke(_, method_ref)) if method_ref.is_init() => {
                let class = method_ref.object_class();
                match pending_news.iter().rposition(|pending| Some(*pending) == class) {
                    Some(pending) => {
                        pending_news.remove(pending);
                    }
                    None => return Some(idx + 1),
                }
            }
            _ => (),
        }
    }
    None
}
