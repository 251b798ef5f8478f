use crate::jvm::class_graph::ClassId;
use crate::jvm::{BinaryName, RefType};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Subtyping relationship between types
///
/// The answer is `None` when it depends on classes whose super types aren't known.
pub trait Assignable {
    /// Is the first type assignable to the second?
    fn is_assignable(&self, super_type: &Self) -> Option<bool>;
}

/// This does a traversal of super types in the class graph to determine assignability
impl<'g> Assignable for ClassId<'g> {
    fn is_assignable(&self, super_type: &ClassId<'g>) -> Option<bool> {
        if super_type.name == BinaryName::OBJECT {
            return Some(true);
        }

        let mut supertypes_to_visit: Vec<ClassId<'g>> = vec![*self];
        let mut dont_revisit: HashSet<ClassId<'g>> = HashSet::new();
        dont_revisit.insert(*self);
        let mut saw_missing = false;

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !super_type.is_interface() && !super_type.is_missing();

        while let Some(class_data) = supertypes_to_visit.pop() {
            if class_data == *super_type {
                return Some(true);
            }
            saw_missing |= class_data.is_missing();
            let class_data = class_data.0;

            // Enqueue next types to visit
            if let Some(superclass) = class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    let interface = *interface;
                    if dont_revisit.insert(interface) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        if saw_missing {
            None
        } else {
            Some(false)
        }
    }
}

/// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)` in
/// the JVM verifier specification.
impl<'g> Assignable for RefType<ClassId<'g>> {
    fn is_assignable(&self, super_type: &RefType<ClassId<'g>>) -> Option<bool> {
        match (self, super_type) {
            // Special superclass and interfaces of all arrays
            (
                RefType::PrimitiveArray(_) | RefType::ObjectArray(_),
                RefType::Object(object_type),
            ) => Some(is_array_type_assignable(&object_type.name)),

            // Primitive arrays must match in dimension and type
            (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => Some(arr1 == arr2),

            // Higher dimensional primitive arrays can be subtypes of object arrays
            (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less | Ordering::Equal => Some(false),
                    Ordering::Greater => Some(is_array_type_assignable(&arr2.element_type.name)),
                }
            }

            // Cursed (unsound) covariance of arrays
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
                match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                    Ordering::Less => Some(false),
                    Ordering::Equal => arr1.element_type.is_assignable(&arr2.element_type),
                    Ordering::Greater => Some(is_array_type_assignable(&arr2.element_type.name)),
                }
            }

            // Object-to-object assignability holds if there is a path through super type edges
            (RefType::Object(cls1), RefType::Object(cls2)) => cls1.is_assignable(cls2),

            _ => Some(false),
        }
    }
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}

/// What can be said statically about an `instanceof` test
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Narrowing {
    /// Every (non-null) value of the static type passes
    Always,

    /// Some values may pass, depending on their runtime class
    Possible,

    /// No value of the static type can pass
    Impossible,
}

/// Can a value whose static type is `value_type` be an instance of `test_type`?
///
/// This follows the Java casting rules: unrelated classes can never overlap, but a non-final
/// class may always have a subclass implementing any given interface.
pub fn narrowing<'g>(value_type: &RefType<ClassId<'g>>, test_type: &RefType<ClassId<'g>>) -> Narrowing {
    match value_type.is_assignable(test_type) {
        Some(true) => return Narrowing::Always,
        None => return Narrowing::Possible,
        Some(false) => (),
    }
    match test_type.is_assignable(value_type) {
        Some(true) | None => return Narrowing::Possible,
        Some(false) => (),
    }

    match (value_type, test_type) {
        (RefType::Object(cls1), RefType::Object(cls2)) => {
            let is_final = |cls: &ClassId<'g>| {
                cls.access_flags
                    .contains(crate::jvm::ClassAccessFlags::FINAL)
            };
            let overlaps = match (cls1.is_interface(), cls2.is_interface()) {
                (true, true) => true,
                (true, false) => !is_final(cls2),
                (false, true) => !is_final(cls1),
                (false, false) => false,
            };
            if overlaps {
                Narrowing::Possible
            } else {
                Narrowing::Impossible
            }
        }
        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
            if arr1.additional_dimensions == arr2.additional_dimensions =>
        {
            match narrowing(
                &RefType::Object(arr1.element_type),
                &RefType::Object(arr2.element_type),
            ) {
                Narrowing::Impossible => Narrowing::Impossible,
                _ => Narrowing::Possible,
            }
        }
        _ => Narrowing::Impossible,
    }
}

#[cfg(test)]
mod test {
    use crate::jvm::class_graph::{
        narrowing, Assignable, ClassData, ClassGraph, ClassGraphArenas, ClassOrigin, JavaLibrary,
        Narrowing,
    };
    use crate::jvm::{BinaryName, ClassAccessFlags, FieldType, Name, RefType};

    #[test]
    fn simple_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);

        let object_cls = &java.object;
        let string_cls = &java.string;

        assert_eq!(
            object_cls.is_assignable(object_cls),
            Some(true),
            "java.lang.Object <: java.lang.Object"
        );
        assert_eq!(
            string_cls.is_assignable(string_cls),
            Some(true),
            "java.lang.String <: java.lang.String"
        );
        assert_eq!(
            string_cls.is_assignable(object_cls),
            Some(true),
            "java.lang.String <: java.lang.Object"
        );
        assert_eq!(
            object_cls.is_assignable(string_cls),
            Some(false),
            "java.lang.Object </: java.lang.String"
        );
    }

    #[test]
    fn transitive_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);

        let object_cls = &java.object;
        let number_cls = &java.number;
        let integer_cls = &java.integer;

        assert_eq!(integer_cls.is_assignable(number_cls), Some(true), "Integer <: Number");
        assert_eq!(integer_cls.is_assignable(object_cls), Some(true), "Integer <: Object");
        assert_eq!(number_cls.is_assignable(integer_cls), Some(false), "Number </: Integer");
        assert_eq!(object_cls.is_assignable(integer_cls), Some(false), "Object </: Integer");
    }

    #[test]
    fn simple_interfaces() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);

        let object_cls = &java.object;
        let string_cls = &java.string;
        let charsequence_cls = &java.char_sequence;

        assert_eq!(
            string_cls.is_assignable(charsequence_cls),
            Some(true),
            "java.lang.String <: java.lang.CharSequence"
        );
        assert_eq!(
            charsequence_cls.is_assignable(object_cls),
            Some(true),
            "java.lang.CharSequence <: java.lang.Object"
        );
        assert_eq!(
            charsequence_cls.is_assignable(string_cls),
            Some(false),
            "java.lang.CharSequence </: java.lang.String"
        );
    }

    #[test]
    fn arrays() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);

        let object_cls = &RefType::Object(java.object);
        let int_array = &RefType::array(FieldType::int());
        let long_array = &RefType::array(FieldType::long());
        let integer_array = &RefType::array(FieldType::object(java.integer));
        let number_array = &RefType::array(FieldType::object(java.number));
        let nested_int_array = &RefType::array(FieldType::array(FieldType::int()));
        let object_array = &RefType::array(FieldType::object(java.object));

        assert_eq!(int_array.is_assignable(object_cls), Some(true), "[]int <: Object");
        assert_eq!(object_cls.is_assignable(int_array), Some(false), "Object </: []int");
        assert_eq!(int_array.is_assignable(long_array), Some(false), "[]int </: []long");
        assert_eq!(
            integer_array.is_assignable(number_array),
            Some(true),
            "[]Integer <: []Number"
        );
        assert_eq!(
            number_array.is_assignable(integer_array),
            Some(false),
            "[]Number </: []Integer"
        );
        assert_eq!(
            nested_int_array.is_assignable(object_array),
            Some(true),
            "[][]int <: []Object"
        );
        assert_eq!(
            object_array.is_assignable(nested_int_array),
            Some(false),
            "[]Object </: [][]int"
        );
    }

    #[test]
    fn missing_super_types() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);

        let missing = class_graph
            .lookup_or_missing(&BinaryName::from_string(String::from("lib/Unknown")).unwrap());
        let woven = class_graph.add_class(ClassData::new(
            BinaryName::from_string(String::from("app/Woven")).unwrap(),
            ClassOrigin::Woven,
            Some(missing),
            vec![],
            ClassAccessFlags::PUBLIC,
        ));

        assert_eq!(woven.is_assignable(&missing), Some(true));
        assert_eq!(woven.is_assignable(&java.object), Some(true));
        assert_eq!(woven.is_assignable(&java.string), None);
        assert_eq!(java.string.is_assignable(&woven), Some(false));
        assert_eq!(missing.name.as_str(), "lib/Unknown");
    }

    #[test]
    fn instanceof_feasibility() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&class_graph);
        let class = |name: &str, flags: ClassAccessFlags| {
            class_graph.add_class(ClassData::new(
                BinaryName::from_string(name.to_owned()).unwrap(),
                ClassOrigin::Woven,
                Some(java.object),
                vec![],
                flags,
            ))
        };
        let type_b = RefType::Object(class("app/TypeB", ClassAccessFlags::PUBLIC));
        let type_c = RefType::Object(class("app/TypeC", ClassAccessFlags::PUBLIC));
        let final_d = RefType::Object(class(
            "app/FinalD",
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
        ));
        let iface = RefType::Object(class(
            "app/Iface",
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        ));
        let object = RefType::Object(java.object);

        assert_eq!(narrowing(&type_c, &type_b), Narrowing::Impossible);
        assert_eq!(narrowing(&type_b, &object), Narrowing::Always);
        assert_eq!(narrowing(&object, &type_b), Narrowing::Possible);
        assert_eq!(narrowing(&type_c, &iface), Narrowing::Possible);
        assert_eq!(narrowing(&final_d, &iface), Narrowing::Impossible);
        assert_eq!(narrowing(&iface, &final_d), Narrowing::Impossible);
    }
}
