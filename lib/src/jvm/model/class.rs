use crate::jvm::class_file::{
    self, Annotations, Attribute, ClassFile, InvisibleAnnotations, SourceFile, Version,
};
use crate::jvm::class_graph::{
    AnnotationData, ClassData, ClassGraph, ClassId, ClassOrigin, FieldData, MethodData, MethodId,
};
use crate::jvm::code::{BranchInstruction, Code, CodeItem};
use crate::jvm::model::{Field, InstructionEdit, Method};
use crate::jvm::{
    BinaryName, Error, FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
    RenderDescriptor, UnqualifiedName,
};
use std::collections::HashMap;

/// Semantic representation of a class that was read from a class file
///
/// The raw class file is kept alongside: anything the weaver doesn't change (fields, attributes,
/// bodies of unedited methods) is written back out from it unchanged.
pub struct Class<'g> {
    /// The current class
    pub id: ClassId<'g>,

    /// Methods, in class file order followed by any added methods
    pub methods: Vec<Method<'g>>,

    /// Fields added by the weaver
    pub fields: Vec<Field<'g>>,

    /// Name from the `SourceFile` attribute
    pub source_file: Option<String>,

    file: ClassFile,
}

impl<'g> Class<'g> {
    /// Lift a class file into the class graph
    ///
    /// Super types which aren't in the graph yet are added as missing classes, so callers
    /// reading several classes at once should use [`read_types`] to get the order right.
    pub fn read(class_graph: &ClassGraph<'g>, file: ClassFile) -> Result<Class<'g>, Error> {
        let constants = &file.constants;
        let name = constants.class_name(file.this_class)?;
        let superclass = if (file.super_class.0).0 == 0 {
            None
        } else {
            Some(class_graph.lookup_or_missing(&constants.class_name(file.super_class)?))
        };
        let interfaces = file
            .interfaces
            .iter()
            .map(|interface| -> Result<ClassId<'g>, Error> {
                Ok(class_graph.lookup_or_missing(&constants.class_name(*interface)?))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        if class_graph.lookup_class(&name).is_some() {
            return Err(Error::MalformedClassFile(format!(
                "class {} is defined more than once",
                name.as_str()
            )));
        }

        let mut data = ClassData::new(
            name,
            ClassOrigin::Woven,
            superclass,
            interfaces,
            file.access_flags,
        );
        data.annotations = read_annotations(&file, &file.attributes)?;
        let id = class_graph.add_class(data);

        for field in &file.fields {
            let descriptor = constants.utf8(field.descriptor_index)?;
            class_graph.add_field(FieldData {
                class: id,
                name: parse_name(constants.utf8(field.name_index)?)?,
                descriptor: FieldType::parse(descriptor)
                    .map_err(|_| Error::BadDescriptor(descriptor.to_owned()))?,
                access_flags: field.field_access_flags(),
                annotations: read_annotations(&file, &field.attributes)?,
            });
        }

        let mut methods = Vec::with_capacity(file.methods.len());
        for (index, method) in file.methods.iter().enumerate() {
            let descriptor = constants.utf8(method.descriptor_index)?;
            let method_id = class_graph.add_method(MethodData {
                class: id,
                name: parse_name(constants.utf8(method.name_index)?)?,
                descriptor: MethodDescriptor::parse(descriptor)
                    .map_err(|_| Error::BadDescriptor(descriptor.to_owned()))?,
                access_flags: method.method_access_flags(),
                annotations: read_annotations(&file, &method.attributes)?,
            });
            let code_impl = match file.parse_attribute::<class_file::Code>(&method.attributes)? {
                Some(code) => Some(Code::decode(&code, constants)?),
                None => None,
            };
            methods.push(Method {
                id: method_id,
                code_impl,
                origin: Some(index),
                edited: false,
            });
        }

        let source_file = match file.parse_attribute::<SourceFile>(&file.attributes)? {
            Some(SourceFile(idx)) => Some(constants.utf8(idx)?.to_owned()),
            None => None,
        };

        log::trace!("Read class {} with {} methods", id.name.as_str(), methods.len());
        Ok(Class {
            id,
            methods,
            fields: vec![],
            source_file,
            file,
        })
    }

    /// Version of the class file that was read
    pub fn original_version(&self) -> Version {
        self.file.version
    }

    /// Whether anything was added or edited since the class was read
    pub fn is_edited(&self) -> bool {
        !self.fields.is_empty() || self.methods.iter().any(|method| method.edited)
    }

    pub fn method(&self, id: MethodId<'g>) -> Option<&Method<'g>> {
        self.methods.iter().find(|method| method.id == id)
    }

    pub fn method_mut(&mut self, id: MethodId<'g>) -> Option<&mut Method<'g>> {
        self.methods.iter_mut().find(|method| method.id == id)
    }

    /// Snapshot of everything weaving can change
    pub fn checkpoint(&self) -> Checkpoint<'g> {
        Checkpoint {
            methods: self.methods.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Throw away every change made since the checkpoint was taken
    pub fn restore(&mut self, checkpoint: Checkpoint<'g>) {
        self.methods = checkpoint.methods;
        self.fields = checkpoint.fields;
    }

    /// Apply a batch of edits to one of the methods
    pub fn patch(mut self, method: MethodId<'g>, edits: Vec<InstructionEdit>) -> Result<Self, Error> {
        match self.method_mut(method) {
            Some(target) => target.patch(edits)?,
            None => return Err(Error::MissingMember(format!("{:?}", method))),
        }
        Ok(self)
    }

    /// Add a method to the class
    pub fn add_method(&mut self, method: Method<'g>) -> Result<(), Error> {
        if method.id.class != self.id {
            return Err(Error::InvalidEdit(format!(
                "{:?} doesn't belong to {}",
                method.id,
                self.id.name.as_str()
            )));
        }
        self.methods.push(method);
        Ok(())
    }

    /// Add a field to the class
    pub fn add_field(&mut self, field: Field<'g>) -> Result<(), Error> {
        if field.id.class != self.id {
            return Err(Error::InvalidEdit(format!(
                "{:?} doesn't belong to {}",
                field.id,
                self.id.name.as_str()
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Static initializer of the class, created (with a body that just returns) if missing
    pub fn static_initializer(&mut self, class_graph: &ClassGraph<'g>) -> &mut Method<'g> {
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: None,
        };
        let position = self
            .methods
            .iter()
            .position(|m| m.id.name == UnqualifiedName::CLINIT && m.id.descriptor == descriptor);
        let position = match position {
            Some(position) => position,
            None => {
                let id = class_graph.add_method(MethodData {
                    class: self.id,
                    name: UnqualifiedName::CLINIT,
                    descriptor,
                    access_flags: MethodAccessFlags::STATIC,
                    annotations: vec![],
                });
                let mut code = Code::new(0);
                code.items.push(CodeItem::Branch(BranchInstruction::Return));
                self.methods.push(Method::new(id, Some(code)));
                self.methods.len() - 1
            }
        };
        &mut self.methods[position]
    }

    /// Check that the class can be written out at `version`
    ///
    /// Constants from Java 7 (method handles, method types, dynamic call sites) and interface
    /// methods with bodies can't be taken back to older versions.
    pub fn check_version(&self, version: Version) -> Result<(), Error> {
        self.file.constants.check_version(version.major_version)?;
        if self.id.is_interface() && version.major_version < Version::JAVA8.major_version {
            let with_body = self.methods.iter().find(|method| {
                method.id.name != UnqualifiedName::CLINIT
                    && !method.id.access_flags.contains(MethodAccessFlags::ABSTRACT)
            });
            if let Some(method) = with_body {
                return Err(Error::UnsupportedMember(format!(
                    "interface method {}{}",
                    method.id.name.as_str(),
                    method.id.descriptor.render()
                )));
            }
        }
        Ok(())
    }

    /// Serialize the class into a class file
    ///
    /// Only added and edited members get written from scratch. The constant pool is the one that
    /// was read, with new constants appended.
    pub fn serialize(self, version: Version) -> Result<ClassFile, Error> {
        let Class {
            id,
            methods,
            fields: added_fields,
            file,
            ..
        } = self;
        let ClassFile {
            constants: mut constants_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            mut fields,
            methods: original_methods,
            attributes,
            ..
        } = file;

        for field in added_fields {
            fields.push(field.serialize_field(&mut constants_pool)?);
        }
        let methods = methods
            .into_iter()
            .map(|method| method.serialize_method(&original_methods, &mut constants_pool))
            .collect::<Result<Vec<_>, Error>>()?;

        log::debug!(
            "Serialized {} ({} constants)",
            id.name.as_str(),
            constants_pool.slot_count()
        );
        Ok(ClassFile {
            version,
            constants: constants_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

/// Methods and added fields of a [`Class`] at some point in time
pub struct Checkpoint<'g> {
    methods: Vec<Method<'g>>,
    fields: Vec<Field<'g>>,
}

/// Lift several class files into the class graph at once
///
/// Classes are added super types first, so that a class named by another one in the batch is
/// never mistaken for a missing class. Results are in the same order as the inputs. Cycles in the
/// inheritance chain and duplicate definitions are reported as errors for the classes involved.
pub fn read_types<'g>(
    class_graph: &ClassGraph<'g>,
    files: Vec<ClassFile>,
) -> Vec<Result<Class<'g>, Error>> {
    let mut results: Vec<Option<Result<Class<'g>, Error>>> = files.iter().map(|_| None).collect();

    // Names and super type names of everything in the batch
    let mut by_name: HashMap<BinaryName, usize> = HashMap::new();
    let mut supers: Vec<Vec<usize>> = vec![vec![]; files.len()];
    let mut names: Vec<Option<BinaryName>> = vec![];
    for (idx, file) in files.iter().enumerate() {
        match file.constants.class_name(file.this_class) {
            Ok(name) => {
                if by_name.contains_key(&name) {
                    results[idx] = Some(Err(Error::MalformedClassFile(format!(
                        "class {} is defined more than once",
                        name.as_str()
                    ))));
                    names.push(None);
                } else {
                    by_name.insert(name.clone(), idx);
                    names.push(Some(name));
                }
            }
            Err(err) => {
                results[idx] = Some(Err(err));
                names.push(None);
            }
        }
    }
    for (idx, file) in files.iter().enumerate() {
        if names[idx].is_none() {
            continue;
        }
        let super_indices = std::iter::once(file.super_class)
            .filter(|super_class| (super_class.0).0 != 0)
            .chain(file.interfaces.iter().copied())
            .filter_map(|class| file.constants.class_name(class).ok())
            .filter_map(|name| by_name.get(&name).copied());
        supers[idx].extend(super_indices);
    }

    // Depth first, super types before sub types
    #[derive(Copy, Clone, PartialEq)]
    enum Visit {
        Fresh,
        Active,
        Done,
    }
    let mut state = vec![Visit::Fresh; files.len()];
    let mut order: Vec<usize> = vec![];
    for root in 0..files.len() {
        if state[root] != Visit::Fresh || names[root].is_none() {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        state[root] = Visit::Active;
        while let Some((node, next_child)) = stack.pop() {
            if let Some(&child) = supers[node].get(next_child) {
                stack.push((node, next_child + 1));
                match state[child] {
                    Visit::Fresh => {
                        state[child] = Visit::Active;
                        stack.push((child, 0));
                    }
                    Visit::Active => {
                        for (cyclic, _) in &stack {
                            if results[*cyclic].is_none() {
                                results[*cyclic] = Some(Err(Error::MalformedClassFile(format!(
                                    "cyclic inheritance involving {}",
                                    names[child].as_ref().map_or("?", |n| n.as_str())
                                ))));
                            }
                        }
                    }
                    Visit::Done => (),
                }
            } else {
                state[node] = Visit::Done;
                order.push(node);
            }
        }
    }

    let mut files: Vec<Option<ClassFile>> = files.into_iter().map(Some).collect();
    for idx in order {
        if results[idx].is_some() {
            continue;
        }
        if let Some(file) = files[idx].take() {
            results[idx] = Some(Class::read(class_graph, file));
        }
    }

    results
        .into_iter()
        .map(|result| {
            result.unwrap_or_else(|| {
                Err(Error::MalformedClassFile(String::from("class was not read")))
            })
        })
        .collect()
}

fn read_annotations(file: &ClassFile, attributes: &[Attribute]) -> Result<Vec<AnnotationData>, Error> {
    let mut annotations = vec![];
    if let Some(Annotations(visible)) = file.parse_attribute::<Annotations>(attributes)? {
        for annotation in &visible {
            annotations.push(AnnotationData::resolve(annotation, true, &file.constants)?);
        }
    }
    if let Some(InvisibleAnnotations(invisible)) =
        file.parse_attribute::<InvisibleAnnotations>(attributes)?
    {
        for annotation in &invisible {
            annotations.push(AnnotationData::resolve(annotation, false, &file.constants)?);
        }
    }
    Ok(annotations)
}

fn parse_name(name: &str) -> Result<UnqualifiedName, Error> {
    UnqualifiedName::from_string(name.to_owned()).map_err(|_| Error::BadDescriptor(name.to_owned()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{Constant, ConstantsPool, Member};
    use crate::jvm::class_graph::{ClassGraphArenas, JavaLibrary};
    use crate::jvm::code::Instruction;
    use crate::jvm::{ClassAccessFlags, RefType};

    fn name(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    /// Class with a `void run()` method that returns right away
    fn class_file(this: &str, super_class: &str, interfaces: &[&str]) -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = constants.intern_class_ref(&RefType::Object(name(this))).unwrap();
        let super_class = constants
            .intern_class_ref(&RefType::Object(name(super_class)))
            .unwrap();
        let interfaces = interfaces
            .iter()
            .map(|i| constants.intern_class_ref(&RefType::Object(name(i))).unwrap())
            .collect();
        let mut code = Code::new(1);
        code.items.push(CodeItem::Branch(BranchInstruction::Return));
        let code = code.encode(&mut constants).unwrap();
        let code = constants.get_attribute(code).unwrap();
        let run = Member {
            access_flags: MethodAccessFlags::PUBLIC.bits(),
            name_index: constants.get_utf8("run").unwrap(),
            descriptor_index: constants.get_utf8("()V").unwrap(),
            attributes: vec![code],
        };
        ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces,
            fields: vec![],
            methods: vec![run],
            attributes: vec![],
        }
    }

    #[test]
    fn supertypes_are_read_first() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let classes = read_types(
            &graph,
            vec![
                class_file("a/C", "a/B", &["a/I"]),
                class_file("a/B", "java/lang/Object", &[]),
                class_file("a/I", "java/lang/Object", &[]),
            ],
        );
        let classes: Vec<Class> = classes.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(classes[0].id.name.as_str(), "a/C");
        assert_eq!(classes[0].id.origin, ClassOrigin::Woven);
        assert_eq!(classes[0].id.superclass.unwrap().origin, ClassOrigin::Woven);
        assert_eq!(classes[0].id.interfaces[0].origin, ClassOrigin::Woven);
        assert!(classes[0].id.is_hierarchy_complete());
    }

    #[test]
    fn cycles_and_duplicates() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let classes = read_types(
            &graph,
            vec![
                class_file("a/A", "a/B", &[]),
                class_file("a/B", "a/A", &[]),
                class_file("a/D", "java/lang/Object", &[]),
                class_file("a/D", "java/lang/Object", &[]),
            ],
        );
        assert!(matches!(classes[0], Err(Error::MalformedClassFile(_))));
        assert!(matches!(classes[1], Err(Error::MalformedClassFile(_))));
        assert!(classes[2].is_ok());
        assert!(matches!(classes[3], Err(Error::MalformedClassFile(_))));
    }

    #[test]
    fn unedited_methods_pass_through() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let file = class_file("a/Plain", "java/lang/Object", &[]);
        let original = file.to_bytes()?;
        let class = Class::read(&graph, ClassFile::parse(&original)?)?;
        assert!(!class.is_edited());
        let reserialized = class.serialize(Version::JAVA8)?.to_bytes()?;
        assert_eq!(reserialized, original);
        Ok(())
    }

    #[test]
    fn newer_constants_pin_the_version() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let mut file = class_file("a/Lambdas", "java/lang/Object", &[]);
        let descriptor = file.constants.get_utf8("()V")?;
        let mut constants = file.constants.into_offset_vec();
        constants.push(Constant::MethodType { descriptor });
        file.constants = ConstantsPool::from_constants(&constants);
        let original = file.to_bytes()?;

        let class = Class::read(&graph, ClassFile::parse(&original)?)?;
        assert_eq!(class.original_version(), Version::JAVA8);
        assert!(matches!(
            class.check_version(Version::JAVA5),
            Err(Error::UnsupportedConstant(Constant::MethodType { .. }))
        ));
        class.check_version(Version::JAVA8)?;

        let version = class.original_version();
        assert_eq!(class.serialize(version)?.to_bytes()?, original);
        Ok(())
    }

    #[test]
    fn interface_bodies_need_java8() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let mut file = class_file("a/Defaults", "java/lang/Object", &[]);
        file.access_flags =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        let class = Class::read(&graph, file)?;
        assert!(matches!(
            class.check_version(Version::JAVA5),
            Err(Error::UnsupportedMember(_))
        ));
        class.check_version(Version::JAVA8)?;
        Ok(())
    }

    #[test]
    fn patched_method_is_reencoded() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);

        let file = class_file("a/Target", "java/lang/Object", &[]);
        let class = Class::read(&graph, file)?;
        let run = class.methods[0].id;
        let class = class.patch(
            run,
            vec![InstructionEdit::Insert {
                position: 0,
                items: vec![
                    CodeItem::Instruction(Instruction::AConstNull),
                    CodeItem::Instruction(Instruction::Invoke(
                        java.object_get_class.infer_invoke_type(),
                        java.object_get_class.as_ref(),
                    )),
                    CodeItem::Instruction(Instruction::Pop),
                ],
            }],
        )?;
        assert!(class.is_edited());

        let bytes = class.serialize(Version::JAVA5)?.to_bytes()?;
        let reparsed = ClassFile::parse(&bytes)?;
        assert_eq!(reparsed.version, Version::JAVA5);
        let code: class_file::Code = reparsed
            .parse_attribute(&reparsed.methods[0].attributes)?
            .unwrap();
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.code_array.0, vec![0x01, 0xb6, 0, 11, 0x57, 0xb1]);

        let decoded = Code::decode(&code, &reparsed.constants)?;
        assert_eq!(
            decoded.items[1],
            CodeItem::Instruction(Instruction::Invoke(
                java.object_get_class.infer_invoke_type(),
                java.object_get_class.as_ref(),
            ))
        );
        Ok(())
    }

    #[test]
    fn added_static_initializer_and_field() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let mut class = Class::read(&graph, class_file("a/Aspect", "java/lang/Object", &[]))?;
        let field = graph.add_field(FieldData {
            class: class.id,
            name: parse_name("counter")?,
            descriptor: FieldType::int(),
            access_flags: crate::jvm::FieldAccessFlags::STATIC,
            annotations: vec![],
        });
        class.add_field(Field::new(field))?;
        let clinit = class.static_initializer(&graph).id;
        assert_eq!(class.static_initializer(&graph).id, clinit);

        let bytes = class.serialize(Version::JAVA5)?.to_bytes()?;
        let reparsed = ClassFile::parse(&bytes)?;
        assert_eq!(reparsed.fields.len(), 1);
        assert_eq!(reparsed.methods.len(), 2);
        assert_eq!(reparsed.constants.utf8(reparsed.methods[1].name_index)?, "<clinit>");
        assert_eq!(
            reparsed.constants.utf8(reparsed.fields[0].descriptor_index)?,
            FieldType::<BinaryName>::int().render()
        );
        Ok(())
    }

    #[test]
    fn restore_discards_changes() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        JavaLibrary::add_to_graph(&graph);

        let mut class = Class::read(&graph, class_file("a/Woven", "java/lang/Object", &[]))?;
        let checkpoint = class.checkpoint();
        class.static_initializer(&graph);
        let run = class.methods[0].id;
        class = class.patch(
            run,
            vec![InstructionEdit::Insert {
                position: 0,
                items: vec![CodeItem::Instruction(Instruction::Nop)],
            }],
        )?;
        assert!(class.is_edited());
        assert_eq!(class.methods.len(), 2);

        class.restore(checkpoint);
        assert!(!class.is_edited());
        assert_eq!(class.methods.len(), 1);
        Ok(())
    }
}
