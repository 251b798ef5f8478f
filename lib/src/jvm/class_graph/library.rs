use super::{ClassData, ClassGraph, ClassId, ClassOrigin, MethodData, MethodId};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor,
    UnqualifiedName,
};

/// Built-in model of the standard library classes the weaver reasons about, along with the
/// runtime support class used for cflow tracking
///
/// Interface lists are complete (as of Java 8) for every class here, so assignability between
/// these classes is always decidable.
pub struct JavaLibrary<'g> {
    pub object: ClassId<'g>,
    pub serializable: ClassId<'g>,
    pub cloneable: ClassId<'g>,
    pub comparable: ClassId<'g>,
    pub char_sequence: ClassId<'g>,
    pub annotated_element: ClassId<'g>,
    pub string: ClassId<'g>,
    pub class: ClassId<'g>,
    pub annotation: ClassId<'g>,
    pub number: ClassId<'g>,
    pub boolean: ClassId<'g>,
    pub byte: ClassId<'g>,
    pub character: ClassId<'g>,
    pub short: ClassId<'g>,
    pub integer: ClassId<'g>,
    pub long: ClassId<'g>,
    pub float: ClassId<'g>,
    pub double: ClassId<'g>,
    pub throwable: ClassId<'g>,
    pub exception: ClassId<'g>,
    pub runtime_exception: ClassId<'g>,
    pub error: ClassId<'g>,

    pub object_init: MethodId<'g>,
    pub object_get_class: MethodId<'g>,
    pub class_is_annotation_present: MethodId<'g>,

    pub cflow_counter: CFlowCounterMembers<'g>,
}

/// Counter tracking how many activations of a cflow entry are live on the current thread
pub struct CFlowCounterMembers<'g> {
    pub class: ClassId<'g>,
    pub init: MethodId<'g>,
    pub inc: MethodId<'g>,
    pub dec: MethodId<'g>,
    pub is_valid: MethodId<'g>,
}

impl<'g> JavaLibrary<'g> {
    /// Add standard types and the default runtime support class to the class graph
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> JavaLibrary<'g> {
        JavaLibrary::add_to_graph_with_runtime(class_graph, BinaryName::CFLOW_COUNTER)
    }

    pub fn add_to_graph_with_runtime(
        class_graph: &ClassGraph<'g>,
        cflow_counter: BinaryName,
    ) -> JavaLibrary<'g> {
        let public = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let public_final = public | ClassAccessFlags::FINAL;
        let public_abstract = public | ClassAccessFlags::ABSTRACT;
        let interface = ClassAccessFlags::PUBLIC
            | ClassAccessFlags::INTERFACE
            | ClassAccessFlags::ABSTRACT;
        let class = |name: BinaryName,
                     superclass: Option<ClassId<'g>>,
                     interfaces: Vec<ClassId<'g>>,
                     access_flags: ClassAccessFlags| {
            class_graph.add_class(ClassData::new(
                name,
                ClassOrigin::Library,
                superclass,
                interfaces,
                access_flags,
            ))
        };

        let object = class(BinaryName::OBJECT, None, vec![], public);
        let sup = Some(object);
        let serializable = class(BinaryName::SERIALIZABLE, sup, vec![], interface);
        let cloneable = class(BinaryName::CLONEABLE, sup, vec![], interface);
        let comparable = class(BinaryName::COMPARABLE, sup, vec![], interface);
        let char_sequence = class(BinaryName::CHARSEQUENCE, sup, vec![], interface);
        let annotated_element = class(BinaryName::ANNOTATED_ELEMENT, sup, vec![], interface);
        let generic_declaration = class(
            BinaryName::GENERIC_DECLARATION,
            sup,
            vec![annotated_element],
            interface,
        );
        let reflect_type = class(BinaryName::REFLECT_TYPE, sup, vec![], interface);
        let annotation = class(BinaryName::ANNOTATION, sup, vec![], interface);

        let string = class(
            BinaryName::STRING,
            sup,
            vec![serializable, comparable, char_sequence],
            public_final,
        );
        let class_cls = class(
            BinaryName::CLASS,
            sup,
            vec![
                serializable,
                generic_declaration,
                reflect_type,
                annotated_element,
            ],
            public_final,
        );

        let number = class(BinaryName::NUMBER, sup, vec![serializable], public_abstract);
        let boxed = |name: BinaryName, superclass: ClassId<'g>| {
            let interfaces = if superclass == number {
                vec![comparable]
            } else {
                vec![serializable, comparable]
            };
            class(name, Some(superclass), interfaces, public_final)
        };
        let boolean = boxed(BaseType::Boolean.boxed_class(), object);
        let character = boxed(BaseType::Char.boxed_class(), object);
        let byte = boxed(BaseType::Byte.boxed_class(), number);
        let short = boxed(BaseType::Short.boxed_class(), number);
        let integer = boxed(BaseType::Int.boxed_class(), number);
        let long = boxed(BaseType::Long.boxed_class(), number);
        let float = boxed(BaseType::Float.boxed_class(), number);
        let double = boxed(BaseType::Double.boxed_class(), number);

        let throwable = class(BinaryName::THROWABLE, sup, vec![serializable], public);
        let exception = class(BinaryName::EXCEPTION, Some(throwable), vec![], public);
        let runtime_exception =
            class(BinaryName::RUNTIMEEXCEPTION, Some(exception), vec![], public);
        let error = class(BinaryName::ERROR, Some(throwable), vec![], public);

        let method = |class: ClassId<'g>,
                      name: UnqualifiedName,
                      parameters: Vec<FieldType<BinaryName>>,
                      return_type: Option<FieldType<BinaryName>>| {
            class_graph.add_method(MethodData {
                class,
                name,
                descriptor: MethodDescriptor {
                    parameters,
                    return_type,
                },
                access_flags: MethodAccessFlags::PUBLIC,
                annotations: vec![],
            })
        };
        let object_init = method(object, UnqualifiedName::INIT, vec![], None);
        let object_get_class = method(
            object,
            UnqualifiedName::GETCLASS,
            vec![],
            Some(FieldType::object(BinaryName::CLASS)),
        );
        let class_is_annotation_present = method(
            class_cls,
            UnqualifiedName::ISANNOTATIONPRESENT,
            vec![FieldType::object(BinaryName::CLASS)],
            Some(FieldType::boolean()),
        );

        let counter_class = class(cflow_counter, sup, vec![], public);
        let cflow_counter = CFlowCounterMembers {
            class: counter_class,
            init: method(counter_class, UnqualifiedName::INIT, vec![], None),
            inc: method(counter_class, UnqualifiedName::INC, vec![], None),
            dec: method(counter_class, UnqualifiedName::DEC, vec![], None),
            is_valid: method(
                counter_class,
                UnqualifiedName::ISVALID,
                vec![],
                Some(FieldType::boolean()),
            ),
        };

        JavaLibrary {
            object,
            serializable,
            cloneable,
            comparable,
            char_sequence,
            annotated_element,
            string,
            class: class_cls,
            annotation,
            number,
            boolean,
            byte,
            character,
            short,
            integer,
            long,
            float,
            double,
            throwable,
            exception,
            runtime_exception,
            error,
            object_init,
            object_get_class,
            class_is_annotation_present,
            cflow_counter,
        }
    }

    /// Boxed class corresponding to a primitive type
    pub fn boxed(&self, base_type: BaseType) -> ClassId<'g> {
        match base_type {
            BaseType::Boolean => self.boolean,
            BaseType::Byte => self.byte,
            BaseType::Char => self.character,
            BaseType::Short => self.short,
            BaseType::Int => self.integer,
            BaseType::Long => self.long,
            BaseType::Float => self.float,
            BaseType::Double => self.double,
        }
    }
}
