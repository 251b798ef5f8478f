//! Raw representation of the [`class` file format][0]
//!
//! Everything here is index-based, mirroring the bytes on disk. Symbolic views (descriptors,
//! member references, annotations by name) are obtained by resolving indices against the
//! [`ConstantsPool`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

mod attribute;
mod binary_format;
mod constants;

pub use attribute::*;
pub use binary_format::*;
pub use constants::*;

use crate::jvm::{ClassAccessFlags, Error, FieldAccessFlags, MethodAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{ErrorKind, Result};

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    /// Java SE 5, the first version with annotations and the last without stack map frames
    pub const JAVA5: Version = Version {
        major_version: 49,
        minor_version: 0,
    };

    /// Java SE 8
    pub const JAVA8: Version = Version {
        major_version: 52,
        minor_version: 0,
    };
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let minor_version = u16::deserialize(reader)?;
        let major_version = u16::deserialize(reader)?;
        Ok(Version {
            major_version,
            minor_version,
        })
    }
}

/// Field or method declared by a class or interface
///
/// The access flags are kept as raw bits since fields and methods interpret them differently.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug, Clone)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Member {
    pub fn field_access_flags(&self) -> FieldAccessFlags {
        FieldAccessFlags::from_bits_truncate(self.access_flags)
    }

    pub fn method_access_flags(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_bits_truncate(self.access_flags)
    }
}

impl Serialize for Member {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Member {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(Member {
            access_flags: u16::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Index `0` only for `java/lang/Object`
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a class file from its bytes
    pub fn parse(bytes: &[u8]) -> std::result::Result<ClassFile, Error> {
        let mut reader = bytes;
        let class_file = ClassFile::deserialize(&mut reader).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                Error::MalformedClassFile(String::from("truncated class file"))
            } else {
                Error::MalformedClassFile(err.to_string())
            }
        })?;
        if !reader.is_empty() {
            let msg = format!("{} trailing bytes after class file", reader.len());
            return Err(Error::MalformedClassFile(msg));
        }
        Ok(class_file)
    }

    /// Encode the class file into bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, Error> {
        self.constants.check_version(self.version.major_version)?;
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Find the first attribute with a given name
    pub fn find_attribute<'a>(&self, attributes: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
        attributes
            .iter()
            .find(|attribute| self.constants.utf8(attribute.name_index).ok() == Some(name))
    }

    /// Parse the first attribute of the given type, if present
    pub fn parse_attribute<A: AttributeLike + Deserialize>(
        &self,
        attributes: &[Attribute],
    ) -> std::result::Result<Option<A>, Error> {
        match self.find_attribute(attributes, A::NAME) {
            None => Ok(None),
            Some(attribute) => attribute
                .parse()
                .map(Some)
                .map_err(|err| Error::MalformedClassFile(format!("{}: {}", A::NAME, err))),
        }
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ClassFile::MAGIC {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "missing 0xCAFEBABE header",
            ));
        }
        Ok(ClassFile {
            version: Version::deserialize(reader)?,
            constants: ConstantsPool::deserialize(reader)?,
            access_flags: ClassAccessFlags::from_bits_truncate(u16::deserialize(reader)?),
            this_class: ClassConstantIndex::deserialize(reader)?,
            super_class: ClassConstantIndex::deserialize(reader)?,
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{BinaryName, Name, RefType};

    fn empty_class() -> ClassFile {
        let mut constants = ConstantsPool::new();
        let this_class = constants
            .intern_class_ref(&RefType::Object(BinaryName::from_string(String::from("a/B")).unwrap()))
            .unwrap();
        let super_class = constants
            .intern_class_ref(&RefType::Object(BinaryName::OBJECT))
            .unwrap();
        ClassFile {
            version: Version::JAVA5,
            constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        }
    }

    #[test]
    fn round_trip_bytes() {
        let bytes = empty_class().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed.version, Version::JAVA5);
        assert_eq!(
            parsed.constants.class_name(parsed.this_class).unwrap().as_str(),
            "a/B"
        );
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn truncated_class_file() {
        let bytes = empty_class().to_bytes().unwrap();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 3]),
            Err(Error::MalformedClassFile(_))
        ));
    }
}
