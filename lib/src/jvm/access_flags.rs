use crate::jvm::class_file::Serialize;
use bitflags::bitflags;
use byteorder::WriteBytesExt;
use std::io::Result;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on fields
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// Modifier keywords, in the order `javac` would print them
const MODIFIER_KEYWORDS: [(u16, &str); 9] = [
    (0x0001, "public"),
    (0x0004, "protected"),
    (0x0002, "private"),
    (0x0400, "abstract"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0020, "synchronized"),
    (0x0100, "native"),
    (0x0080, "transient"),
];

/// Parse a Java modifier keyword into its access flag bit
///
/// `volatile`/`transient` and `synchronized`/`varargs` share bits across member kinds, so this is
/// only meaningful once the kind of member being matched is known.
pub fn modifier_bit(keyword: &str) -> Option<u16> {
    match keyword {
        "volatile" => Some(0x0040),
        "strictfp" => Some(0x0800),
        other => MODIFIER_KEYWORDS
            .iter()
            .find(|(_, name)| *name == other)
            .map(|(bit, _)| *bit),
    }
}

impl MethodAccessFlags {
    pub fn is_static(&self) -> bool {
        self.contains(MethodAccessFlags::STATIC)
    }
}

impl FieldAccessFlags {
    pub fn is_static(&self) -> bool {
        self.contains(FieldAccessFlags::STATIC)
    }
}

impl Serialize for ClassAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for MethodAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for FieldAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modifier_keywords() {
        assert_eq!(modifier_bit("public"), Some(MethodAccessFlags::PUBLIC.bits()));
        assert_eq!(modifier_bit("static"), Some(FieldAccessFlags::STATIC.bits()));
        assert_eq!(
            modifier_bit("synchronized"),
            Some(MethodAccessFlags::SYNCHRONIZED.bits())
        );
        assert_eq!(modifier_bit("volatile"), Some(FieldAccessFlags::VOLATILE.bits()));
        assert_eq!(modifier_bit("sealed"), None);
    }
}
