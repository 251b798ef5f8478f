#![allow(dead_code)]

use jweave::jvm::class_file::{ClassFile, ConstantsPool, Member, Version};
use jweave::jvm::class_graph::{ClassData, ClassGraph, ClassId, ClassOrigin, JavaLibrary, MethodData, MethodId};
use jweave::jvm::code::{Code, CodeItem};
use jweave::jvm::model::Class;
use jweave::jvm::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, RefType, RenderDescriptor, UnqualifiedName,
};
use jweave::weaver::syntax::parse_pointcut;
use jweave::weaver::{AdviceDeclaration, AdviceKind, Aspect};

pub fn binary_name(name: &str) -> BinaryName {
    BinaryName::from_string(name.to_owned()).unwrap()
}

pub fn unqualified_name(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(name.to_owned()).unwrap()
}

/// Class that only exists in the graph (never woven)
pub fn library_class<'g>(
    graph: &ClassGraph<'g>,
    superclass: ClassId<'g>,
    name: &str,
    access_flags: ClassAccessFlags,
) -> ClassId<'g> {
    graph.add_class(ClassData::new(
        binary_name(name),
        ClassOrigin::Library,
        Some(superclass),
        vec![],
        access_flags,
    ))
}

pub fn library_method<'g>(
    graph: &ClassGraph<'g>,
    class: ClassId<'g>,
    name: &str,
    parameters: Vec<FieldType<BinaryName>>,
    return_type: Option<FieldType<BinaryName>>,
    access_flags: MethodAccessFlags,
) -> MethodId<'g> {
    graph.add_method(MethodData {
        class,
        name: unqualified_name(name),
        descriptor: MethodDescriptor {
            parameters,
            return_type,
        },
        access_flags,
        annotations: vec![],
    })
}

/// Method of a class file being built
pub struct MethodSpec {
    pub name: &'static str,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub access_flags: MethodAccessFlags,
    pub max_locals: u16,
    pub items: Vec<CodeItem>,
}

/// Static field of a class file being built
pub struct FieldSpec {
    pub name: &'static str,
    pub descriptor: FieldType<BinaryName>,
}

/// Build a class file (superclass `java/lang/Object`) and read it into the graph
pub fn read_class<'g>(
    graph: &ClassGraph<'g>,
    name: &str,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
) -> Class<'g> {
    let mut constants = ConstantsPool::new();
    let this_class = constants
        .intern_class_ref(&RefType::Object(binary_name(name)))
        .unwrap();
    let super_class = constants
        .intern_class_ref(&RefType::Object(BinaryName::OBJECT))
        .unwrap();

    let fields = fields
        .into_iter()
        .map(|field| Member {
            access_flags: (FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC).bits(),
            name_index: constants.get_utf8(field.name).unwrap(),
            descriptor_index: constants.get_utf8(field.descriptor.render()).unwrap(),
            attributes: vec![],
        })
        .collect();
    let methods = methods
        .into_iter()
        .map(|method| {
            let mut code = Code::new(method.max_locals);
            code.items = method.items;
            let code = code.encode(&mut constants).unwrap();
            let code = constants.get_attribute(code).unwrap();
            Member {
                access_flags: method.access_flags.bits(),
                name_index: constants.get_utf8(method.name).unwrap(),
                descriptor_index: constants.get_utf8(method.descriptor.render()).unwrap(),
                attributes: vec![code],
            }
        })
        .collect();

    let file = ClassFile {
        version: Version::JAVA5,
        constants,
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields,
        methods,
        attributes: vec![],
    };
    let bytes = file.to_bytes().unwrap();
    Class::read(graph, ClassFile::parse(&bytes).unwrap()).unwrap()
}

/// Aspect class with one static advice method per entry
pub fn aspect<'g>(
    graph: &ClassGraph<'g>,
    java: &JavaLibrary<'g>,
    name: &str,
    advice: &[(AdviceKind, &str, &str)],
) -> Aspect<'g> {
    let class = library_class(graph, java.object, name, ClassAccessFlags::PUBLIC);
    let advice = advice
        .iter()
        .map(|(kind, method, pointcut)| AdviceDeclaration {
            kind: *kind,
            method: library_method(
                graph,
                class,
                method,
                vec![],
                None,
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            ),
            arg_names: vec![],
            pointcut: parse_pointcut(pointcut).unwrap(),
            returning: None,
            throwing: None,
        })
        .collect();
    Aspect {
        class,
        pointcuts: vec![],
        advice,
        precedence: vec![],
    }
}

pub fn void_descriptor(parameters: Vec<FieldType<BinaryName>>) -> MethodDescriptor<BinaryName> {
    MethodDescriptor {
        parameters,
        return_type: None,
    }
}
