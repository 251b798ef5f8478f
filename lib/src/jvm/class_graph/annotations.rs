use crate::jvm::class_file::{Annotation, ConstantsPool, ElementValue};
use crate::jvm::{BinaryName, ConstantData, Error, FieldType, Name, ParseDescriptor, RefType};

/// Annotation on a class or member, with its element values resolved
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationData {
    pub type_name: BinaryName,

    /// Whether the annotation is retained at runtime
    pub visible: bool,

    pub elements: Vec<(String, AnnotationValue)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationValue {
    Constant(ConstantData),
    Boolean(bool),
    Enum { type_name: String, constant: String },
    Class(String),
    Annotation(AnnotationData),
    Array(Vec<AnnotationValue>),
}

impl AnnotationData {
    pub fn new(type_name: BinaryName, visible: bool) -> AnnotationData {
        AnnotationData {
            type_name,
            visible,
            elements: vec![],
        }
    }

    pub fn element(&self, name: &str) -> Option<&AnnotationValue> {
        self.elements
            .iter()
            .find(|(element, _)| element == name)
            .map(|(_, value)| value)
    }

    /// String valued element
    pub fn string_element(&self, name: &str) -> Option<&str> {
        match self.element(name)? {
            AnnotationValue::Constant(ConstantData::String(string)) => Some(string.as_str()),
            _ => None,
        }
    }

    /// Array of strings element (a single string is accepted as a one element array)
    pub fn string_array_element(&self, name: &str) -> Option<Vec<&str>> {
        match self.element(name)? {
            AnnotationValue::Constant(ConstantData::String(string)) => Some(vec![string.as_str()]),
            AnnotationValue::Array(values) => values
                .iter()
                .map(|value| match value {
                    AnnotationValue::Constant(ConstantData::String(string)) => {
                        Some(string.as_str())
                    }
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Resolve an annotation from a class file
    pub fn resolve(
        annotation: &Annotation,
        visible: bool,
        constants: &ConstantsPool,
    ) -> Result<AnnotationData, Error> {
        let descriptor = constants.utf8(annotation.type_index)?;
        let type_name = match FieldType::parse(descriptor) {
            Ok(FieldType::Ref(RefType::Object(name))) => name,
            _ => return Err(Error::BadDescriptor(descriptor.to_owned())),
        };
        let mut elements = vec![];
        for (name, value) in &annotation.elements {
            elements.push((
                constants.utf8(*name)?.to_owned(),
                AnnotationValue::resolve(value, visible, constants)?,
            ));
        }
        Ok(AnnotationData {
            type_name,
            visible,
            elements,
        })
    }
}

impl AnnotationValue {
    fn resolve(
        value: &ElementValue,
        visible: bool,
        constants: &ConstantsPool,
    ) -> Result<AnnotationValue, Error> {
        Ok(match value {
            ElementValue::Constant(b'Z', idx) => {
                AnnotationValue::Boolean(constants.loadable(*idx)? != ConstantData::Integer(0))
            }
            ElementValue::Constant(b's', idx) => AnnotationValue::Constant(ConstantData::String(
                constants
                    .utf8(crate::jvm::class_file::Utf8ConstantIndex(*idx))?
                    .to_owned(),
            )),
            ElementValue::Constant(_, idx) => AnnotationValue::Constant(constants.loadable(*idx)?),
            ElementValue::Enum {
                type_name,
                const_name,
            } => AnnotationValue::Enum {
                type_name: constants.utf8(*type_name)?.to_owned(),
                constant: constants.utf8(*const_name)?.to_owned(),
            },
            ElementValue::Class(idx) => AnnotationValue::Class(constants.utf8(*idx)?.to_owned()),
            ElementValue::Annotation(annotation) => {
                AnnotationValue::Annotation(AnnotationData::resolve(annotation, visible, constants)?)
            }
            ElementValue::Array(values) => AnnotationValue::Array(
                values
                    .iter()
                    .map(|value| AnnotationValue::resolve(value, visible, constants))
                    .collect::<Result<_, Error>>()?,
            ),
        })
    }
}

impl std::fmt::Display for AnnotationData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.type_name.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;

    #[test]
    fn resolve_string_elements() {
        let mut constants = ConstantsPool::new();
        let type_index = constants
            .get_utf8("Lorg/aspectj/lang/annotation/Before;")
            .unwrap();
        let value_name = constants.get_utf8("value").unwrap();
        let value = constants.get_utf8("execution(* *(..))").unwrap();
        let arg_names = constants.get_utf8("argNames").unwrap();
        let first = constants.get_utf8("x").unwrap();
        let annotation = Annotation {
            type_index,
            elements: vec![
                (value_name, ElementValue::Constant(b's', value.0)),
                (
                    arg_names,
                    ElementValue::Array(vec![ElementValue::Constant(b's', first.0)]),
                ),
            ],
        };

        let resolved = AnnotationData::resolve(&annotation, true, &constants).unwrap();
        assert_eq!(resolved.type_name, BinaryName::BEFORE);
        assert_eq!(resolved.string_element("value"), Some("execution(* *(..))"));
        assert_eq!(resolved.string_array_element("argNames"), Some(vec!["x"]));
        assert_eq!(resolved.string_element("missing"), None);
        assert_eq!(format!("{}", resolved), "@org/aspectj/lang/annotation/Before");

        let bad = Annotation {
            type_index,
            elements: vec![(value_name, ElementValue::Constant(b'I', ConstantIndex(99)))],
        };
        assert!(AnnotationData::resolve(&bad, true, &constants).is_err());
    }
}
