//! Static patterns over names, types, modifiers, and member signatures
//!
//! Patterns are written with source-level names (`java.lang.String`) and are matched against
//! resolved types from the class graph. None of them produce residual tests: a pattern either
//! matches a declaration or it doesn't.

use crate::jvm::class_graph::{AnnotationData, ClassId};
use crate::jvm::{BaseType, BinaryName, FieldType, Name, RefType, UnqualifiedName};
use crate::weaver::shadow::ShadowSignature;
use std::fmt;

/// Identifier pattern in which `*` matches any (possibly empty) run of characters
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct NamePattern(String);

impl NamePattern {
    pub fn new(pattern: impl Into<String>) -> NamePattern {
        NamePattern(pattern.into())
    }

    pub fn any() -> NamePattern {
        NamePattern(String::from("*"))
    }

    pub fn is_any(&self) -> bool {
        self.0 == "*"
    }

    /// Does the pattern match exactly one name?
    pub fn is_exact(&self) -> bool {
        !self.0.contains('*')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, name: &str) -> bool {
        glob_match(self.0.as_bytes(), name.as_bytes())
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wildcard match with `*` as the only special character
///
/// Uses the usual single backtrack point: on a mismatch, the last `*` absorbs one more character.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, star_t)) = backtrack {
            p = star + 1;
            t = star_t + 1;
            backtrack = Some((star, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == b'*')
}

/// Segment of a dotted class name pattern
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NameSegment {
    Name(NamePattern),

    /// `..`, matching any number of package segments (including none)
    Ellipsis,
}

/// Pattern over fully qualified class names (`java.util.*`, `com..*Service`, `Object`)
///
/// A pattern made of a single plain segment has no package and matches the simple name of a
/// class in any package.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassNamePattern {
    pub segments: Vec<NameSegment>,
}

impl ClassNamePattern {
    pub fn is_simple(&self) -> bool {
        matches!(self.segments.as_slice(), [NameSegment::Name(_)])
    }

    /// The class name, if the pattern has no wildcards
    pub fn exact_name(&self) -> Option<String> {
        let mut parts = vec![];
        for segment in &self.segments {
            match segment {
                NameSegment::Name(name) if name.is_exact() => parts.push(name.as_str()),
                _ => return None,
            }
        }
        Some(parts.join("/"))
    }

    pub fn matches(&self, class: &BinaryName) -> bool {
        if let [NameSegment::Name(simple)] = self.segments.as_slice() {
            return simple.matches(class.simple_name());
        }
        let parts: Vec<&str> = class.as_str().split('/').collect();
        segments_match(&self.segments, &parts)
    }
}

fn segments_match(segments: &[NameSegment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((NameSegment::Ellipsis, rest)) => {
            (0..=parts.len()).any(|skip| segments_match(rest, &parts[skip..]))
        }
        Some((NameSegment::Name(name), rest)) => match parts.split_first() {
            Some((part, parts)) => name.matches(part) && segments_match(rest, parts),
            None => false,
        },
    }
}

impl fmt::Display for ClassNamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut after_name = false;
        for segment in &self.segments {
            match segment {
                NameSegment::Ellipsis => {
                    f.write_str("..")?;
                    after_name = false;
                }
                NameSegment::Name(name) => {
                    if after_name {
                        f.write_str(".")?;
                    }
                    write!(f, "{}", name)?;
                    after_name = true;
                }
            }
        }
        Ok(())
    }
}

/// What a type pattern says about the element type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ElementPattern {
    /// `*`
    Any,
    Void,
    Primitive(BaseType),
    Class(ClassNamePattern),
}

/// Pattern over types, including `void`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypePattern {
    Element {
        element: ElementPattern,

        /// `+` suffix: the named class or any of its subtypes
        include_subtypes: bool,

        /// Number of `[]` suffixes
        dimensions: usize,
    },
    Not(Box<TypePattern>),
    And(Box<TypePattern>, Box<TypePattern>),
    Or(Box<TypePattern>, Box<TypePattern>),
}

/// Type being matched, where `None` is `void`
pub type TypeRef<'a, 'g> = Option<&'a FieldType<ClassId<'g>>>;

enum MatchedElement<'g> {
    Void,
    Primitive(BaseType),
    Class(ClassId<'g>),
}

impl TypePattern {
    pub const ANY: TypePattern = TypePattern::Element {
        element: ElementPattern::Any,
        include_subtypes: false,
        dimensions: 0,
    };

    pub fn is_any(&self) -> bool {
        self == &TypePattern::ANY
    }

    pub fn matches(&self, typ: TypeRef<'_, '_>) -> bool {
        match self {
            TypePattern::Not(pattern) => !pattern.matches(typ),
            TypePattern::And(left, right) => left.matches(typ) && right.matches(typ),
            TypePattern::Or(left, right) => left.matches(typ) || right.matches(typ),
            TypePattern::Element {
                element,
                include_subtypes,
                dimensions,
            } => {
                let (matched, actual_dimensions) = match typ {
                    None => (MatchedElement::Void, 0),
                    Some(FieldType::Base(base)) => (MatchedElement::Primitive(*base), 0),
                    Some(FieldType::Ref(RefType::Object(class))) => {
                        (MatchedElement::Class(*class), 0)
                    }
                    Some(FieldType::Ref(RefType::ObjectArray(arr))) => (
                        MatchedElement::Class(arr.element_type),
                        arr.dimensions(),
                    ),
                    Some(FieldType::Ref(RefType::PrimitiveArray(arr))) => (
                        MatchedElement::Primitive(arr.element_type),
                        arr.dimensions(),
                    ),
                };

                // `*[]` matches every array, including arrays of arrays
                if let ElementPattern::Any = element {
                    return match matched {
                        MatchedElement::Void => *dimensions == 0,
                        _ => actual_dimensions >= *dimensions,
                    };
                }
                if actual_dimensions != *dimensions {
                    return false;
                }
                match (element, matched) {
                    (ElementPattern::Void, MatchedElement::Void) => true,
                    (ElementPattern::Primitive(expected), MatchedElement::Primitive(found)) => {
                        *expected == found
                    }
                    (ElementPattern::Class(pattern), MatchedElement::Class(class)) => {
                        if *include_subtypes {
                            class
                                .all_supertypes()
                                .iter()
                                .any(|super_type| pattern.matches(&super_type.name))
                        } else {
                            pattern.matches(&class.name)
                        }
                    }
                    _ => false,
                }
            }
        }
    }

    /// Exact class or primitive named by the pattern, for designators that test runtime types
    pub fn exact(&self) -> Option<ExactType> {
        match self {
            TypePattern::Element {
                element,
                include_subtypes: false,
                dimensions,
            } => {
                let element = match element {
                    ElementPattern::Primitive(base) => ExactElement::Primitive(*base),
                    ElementPattern::Class(name) => ExactElement::Class(name.clone()),
                    _ => return None,
                };
                Some(ExactType {
                    element,
                    dimensions: *dimensions,
                })
            }
            _ => None,
        }
    }
}

/// A type pattern naming exactly one type (modulo resolving a simple class name)
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExactType {
    pub element: ExactElement,
    pub dimensions: usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExactElement {
    Primitive(BaseType),
    Class(ClassNamePattern),
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePattern::Element {
                element,
                include_subtypes,
                dimensions,
            } => {
                match element {
                    ElementPattern::Any => f.write_str("*")?,
                    ElementPattern::Void => f.write_str("void")?,
                    ElementPattern::Primitive(base) => f.write_str(base.java_name())?,
                    ElementPattern::Class(name) => write!(f, "{}", name)?,
                }
                if *include_subtypes {
                    f.write_str("+")?;
                }
                for _ in 0..*dimensions {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            TypePattern::Not(pattern) => write!(f, "!{}", pattern),
            TypePattern::And(left, right) => write!(f, "({} && {})", left, right),
            TypePattern::Or(left, right) => write!(f, "({} || {})", left, right),
        }
    }
}

/// Modifiers that must (or must not) be present
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ModifiersPattern {
    pub required: u16,
    pub forbidden: u16,
}

impl ModifiersPattern {
    pub fn is_empty(&self) -> bool {
        self.required == 0 && self.forbidden == 0
    }

    /// Flags are `None` when the member could not be resolved
    pub fn matches(&self, flags: Option<u16>) -> bool {
        match flags {
            Some(flags) => flags & self.required == self.required && flags & self.forbidden == 0,
            None => self.is_empty(),
        }
    }
}

/// `@Name` or `!@Name`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AnnotationPattern {
    pub annotation: ClassNamePattern,
    pub negated: bool,
}

impl AnnotationPattern {
    pub fn matches(&self, annotations: &[AnnotationData]) -> bool {
        let present = annotations
            .iter()
            .any(|annotation| self.annotation.matches(&annotation.type_name));
        present != self.negated
    }
}

/// Element of a parameter list pattern
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ParamPattern {
    /// `..`, matching any number of parameters
    Ellipsis,
    Type(TypePattern),
}

pub fn params_match<'g>(patterns: &[ParamPattern], params: &[FieldType<ClassId<'g>>]) -> bool {
    match patterns.split_first() {
        None => params.is_empty(),
        Some((ParamPattern::Ellipsis, rest)) => {
            (0..=params.len()).any(|skip| params_match(rest, &params[skip..]))
        }
        Some((ParamPattern::Type(pattern), rest)) => match params.split_first() {
            Some((param, params)) => pattern.matches(Some(param)) && params_match(rest, params),
            None => false,
        },
    }
}

/// Pattern over the signature of a method, constructor, or field
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SignaturePattern {
    pub annotations: Vec<AnnotationPattern>,
    pub modifiers: ModifiersPattern,
    pub kind: MemberPatternKind,

    /// `None` when the pattern doesn't constrain the declaring type (`* run(..)`)
    pub declaring_type: Option<TypePattern>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MemberPatternKind {
    Method {
        return_type: TypePattern,
        name: NamePattern,
        params: Vec<ParamPattern>,
    },
    Constructor {
        params: Vec<ParamPattern>,
    },
    Field {
        field_type: TypePattern,
        name: NamePattern,
    },
}

impl SignaturePattern {
    pub fn is_field(&self) -> bool {
        matches!(self.kind, MemberPatternKind::Field { .. })
    }

    pub fn matches(&self, signature: &ShadowSignature<'_>) -> bool {
        let name = match &signature.name {
            Some(name) => name,
            None => return false,
        };
        let is_special = name == &UnqualifiedName::INIT || name == &UnqualifiedName::CLINIT;
        let member_matches = match &self.kind {
            MemberPatternKind::Method {
                return_type,
                name: name_pattern,
                params,
            } => {
                !is_special
                    && !signature.is_field
                    && name_pattern.matches(name.as_str())
                    && return_type.matches(signature.return_type.as_ref())
                    && params_match(params, &signature.parameters)
            }
            MemberPatternKind::Constructor { params } => {
                name == &UnqualifiedName::INIT && params_match(params, &signature.parameters)
            }
            MemberPatternKind::Field {
                field_type,
                name: name_pattern,
            } => {
                signature.is_field
                    && name_pattern.matches(name.as_str())
                    && field_type.matches(signature.return_type.as_ref())
            }
        };
        if !member_matches || !self.modifiers.matches(signature.modifiers()) {
            return false;
        }
        if !self.annotations.is_empty() {
            let annotations = signature.annotations().unwrap_or(&[]);
            if !self.annotations.iter().all(|ann| ann.matches(annotations)) {
                return false;
            }
        }
        match &self.declaring_type {
            None => true,
            Some(declaring) => signature
                .declaring_types()
                .into_iter()
                .any(|class| declaring.matches(Some(&FieldType::object(class)))),
        }
    }
}
