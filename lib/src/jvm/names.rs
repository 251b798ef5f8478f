use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in internal form (`java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

/// Displays the source-level name (`java.lang.Object`)
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(&self.java_name())
    }
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Parse a dotted source-level name (`java.lang.Object`)
    pub fn from_java_name(name: &str) -> Result<BinaryName, String> {
        BinaryName::from_string(name.replace('.', "/"))
    }

    /// Dotted source-level name, with nested class separators left as `$`
    pub fn java_name(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Package prefix in internal form (empty for the default package)
    pub fn package(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Name without the package prefix
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => self.0.as_ref(),
        }
    }

    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const ANNOTATED_ELEMENT: Self = Self::name("java/lang/reflect/AnnotatedElement");
    pub const GENERIC_DECLARATION: Self = Self::name("java/lang/reflect/GenericDeclaration");
    pub const REFLECT_TYPE: Self = Self::name("java/lang/reflect/Type");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ANNOTATION: Self = Self::name("java/lang/annotation/Annotation");

    // Weaver runtime support
    pub const CFLOW_COUNTER: Self = Self::name("jweave/runtime/CFlowCounter");

    // Annotation-style aspect declarations
    pub const ASPECT: Self = Self::name("org/aspectj/lang/annotation/Aspect");
    pub const POINTCUT: Self = Self::name("org/aspectj/lang/annotation/Pointcut");
    pub const BEFORE: Self = Self::name("org/aspectj/lang/annotation/Before");
    pub const AFTER: Self = Self::name("org/aspectj/lang/annotation/After");
    pub const AFTER_RETURNING: Self = Self::name("org/aspectj/lang/annotation/AfterReturning");
    pub const AFTER_THROWING: Self = Self::name("org/aspectj/lang/annotation/AfterThrowing");
    pub const DECLARE_PRECEDENCE: Self =
        Self::name("org/aspectj/lang/annotation/DeclarePrecedence");
}

impl UnqualifiedName {
    /// Concatenate the contents of two unqualified names to produce a third
    pub fn concat(&self, other: &UnqualifiedName) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Construct an unqualified name that is just a number
    pub fn number(n: usize) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(n.to_string()))
    }

    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Special methods
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // JDK names
    pub const GETCLASS: Self = Self::name("getClass");
    pub const ISANNOTATIONPRESENT: Self = Self::name("isAnnotationPresent");
    pub const GETANNOTATION: Self = Self::name("getAnnotation");
    pub const VALUEOF: Self = Self::name("valueOf");
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");

    // Weaver runtime names
    pub const ASPECTOF: Self = Self::name("aspectOf");
    pub const INC: Self = Self::name("inc");
    pub const DEC: Self = Self::name("dec");
    pub const ISVALID: Self = Self::name("isValid");
    pub const CFLOW_COUNTER_PREFIX: Self = Self::name("ajc$cflowCounter$");

    // Annotation elements
    pub const VALUE: Self = Self::name("value");
    pub const ARGNAMES: Self = Self::name("argNames");
    pub const POINTCUT: Self = Self::name("pointcut");
    pub const RETURNING: Self = Self::name("returning");
    pub const THROWING: Self = Self::name("throwing");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn java_names() {
        let name = BinaryName::from_java_name("com.example.Service").unwrap();
        assert_eq!(name.as_str(), "com/example/Service");
        assert_eq!(name.java_name(), "com.example.Service");
        assert_eq!(name.package(), "com/example");
        assert_eq!(name.simple_name(), "Service");
        assert_eq!(BinaryName::from_java_name("Bare").unwrap().package(), "");
    }

    #[test]
    fn invalid_names() {
        assert!(UnqualifiedName::from_string(String::from("a.b")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
        assert!(BinaryName::from_string(String::from("a//b")).is_err());
    }
}
