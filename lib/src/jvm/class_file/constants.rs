use crate::jvm::class_file::{read_bytes, Attribute, AttributeLike, Deserialize, Serialize};
use crate::jvm::{
    BinaryName, ConstantData, Error, FieldRef, FieldType, MethodDescriptor, MethodRef, Name,
    ParseDescriptor, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::result::Result;

/// Class file constants pool builder
///
/// The pool is append only. When re-emitting a class that was read in, the pool starts out with
/// every constant of the original class so that indices inside untouched attributes stay valid,
/// and new constants get appended (or reused, when an equal constant is already present).
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, StringConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<u32, ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<u64, ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), FieldRefConstantIndex>,
    methodrefs:
        HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
        }
    }

    /// Make a pool that starts out with existing constants (at the same indices)
    pub fn from_constants(constants: &OffsetVec<Constant>) -> ConstantsPool {
        let mut pool = ConstantsPool::new();
        for (_, _, constant) in constants.iter() {
            let offset = pool.constants.push(constant.clone());
            pool.index_constant(ConstantIndex(offset.0 as u16), constant);
        }
        pool
    }

    /// Record a constant in the lookup tables (first occurrence wins)
    fn index_constant(&mut self, idx: ConstantIndex, constant: &Constant) {
        match constant {
            Constant::Utf8(string) => {
                self.utf8s
                    .entry(string.clone())
                    .or_insert(Utf8ConstantIndex(idx));
            }
            Constant::Class(name) => {
                self.classes.entry(*name).or_insert(ClassConstantIndex(idx));
            }
            Constant::String(utf8) => {
                self.strings.entry(*utf8).or_insert(StringConstantIndex(idx));
            }
            Constant::Integer(integer) => {
                self.integers.entry(*integer).or_insert(idx);
            }
            Constant::Float(float) => {
                self.floats.entry(float.to_bits()).or_insert(idx);
            }
            Constant::Long(long) => {
                self.longs.entry(*long).or_insert(idx);
            }
            Constant::Double(double) => {
                self.doubles.entry(double.to_bits()).or_insert(idx);
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_types
                    .entry((*name, *descriptor))
                    .or_insert(NameAndTypeConstantIndex(idx));
            }
            Constant::FieldRef(class, name_and_type) => {
                self.fieldrefs
                    .entry((*class, *name_and_type))
                    .or_insert(FieldRefConstantIndex(idx));
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                self.methodrefs
                    .entry((*class, *name_and_type, *is_interface))
                    .or_insert(MethodRefConstantIndex(idx));
            }
            _ => (),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow {
                constant,
                offset: offset as u16,
            });
        }
        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Number of slots used, including the unusable `0` slot and the shadow slots of wide constants
    pub fn slot_count(&self) -> u16 {
        self.constants.offset_len().0 as u16
    }

    /// Look up a constant by index
    pub fn get(&self, idx: ConstantIndex) -> Option<&Constant> {
        self.constants.get_offset(Offset(idx.0 as usize))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter().map(|(_, _, constant)| constant)
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();
        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    pub fn get_class(
        &mut self,
        name: Utf8ConstantIndex,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(name))?);
            self.classes.insert(name, idx);
            Ok(idx)
        }
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(
        &mut self,
        utf8: Utf8ConstantIndex,
    ) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.strings.get(&utf8) {
            Ok(*idx)
        } else {
            let idx = StringConstantIndex(self.push_constant(Constant::String(utf8))?);
            self.strings.insert(utf8, idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let key = (name, descriptor);
        if let Some(idx) = self.name_and_types.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert(key, idx);
            Ok(idx)
        }
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.integers.get(&integer) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Integer(integer))?;
        self.integers.insert(integer, idx);
        Ok(idx)
    }

    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.floats.get(&float.to_bits()) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Float(float))?;
        self.floats.insert(float.to_bits(), idx);
        Ok(idx)
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.longs.get(&long) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Long(long))?;
        self.longs.insert(long, idx);
        Ok(idx)
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.doubles.get(&double.to_bits()) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Double(double))?;
        self.doubles.insert(double.to_bits(), idx);
        Ok(idx)
    }

    /// Get or insert a string constant for the given text
    pub fn intern_string(&mut self, string: &str) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.get_utf8(string)?;
        self.get_string(utf8)
    }

    /// Get or insert a class constant
    ///
    /// Object types are named by their binary name, arrays by their descriptor.
    pub fn intern_class_ref(
        &mut self,
        class: &RefType<BinaryName>,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let name = match class {
            RefType::Object(name) => self.get_utf8(name.as_str())?,
            other => self.get_utf8(other.render())?,
        };
        self.get_class(name)
    }

    /// Get or insert a field reference constant
    pub fn intern_field_ref(
        &mut self,
        field: &FieldRef,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        let class = self.intern_class_ref(&RefType::Object(field.class.clone()))?;
        let name = self.get_utf8(field.name.as_str())?;
        let descriptor = self.get_utf8(field.descriptor.render())?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        let key = (class, name_and_type);
        if let Some(idx) = self.fieldrefs.get(&key) {
            Ok(*idx)
        } else {
            let idx = FieldRefConstantIndex(self.push_constant(Constant::FieldRef(class, name_and_type))?);
            self.fieldrefs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a method reference constant
    pub fn intern_method_ref(
        &mut self,
        method: &MethodRef,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class = self.intern_class_ref(&method.class)?;
        let name = self.get_utf8(method.name.as_str())?;
        let descriptor = self.get_utf8(method.descriptor.render())?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        let key = (class, name_and_type, method.is_interface);
        if let Some(idx) = self.methodrefs.get(&key) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface: method.is_interface,
            };
            let idx = MethodRefConstantIndex(self.push_constant(constant)?);
            self.methodrefs.insert(key, idx);
            Ok(idx)
        }
    }

    /// Get or insert a loadable constant
    pub fn intern_constant(
        &mut self,
        constant: &ConstantData,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match constant {
            ConstantData::String(string) => Ok(self.intern_string(string)?.0),
            ConstantData::Class(class) => Ok(self.intern_class_ref(class)?.0),
            ConstantData::Integer(integer) => self.get_integer(*integer),
            ConstantData::Float(float) => self.get_float(*float),
            ConstantData::Long(long) => self.get_long(*long),
            ConstantData::Double(double) => self.get_double(*double),
        }
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];
        attribute.serialize(&mut info)?;
        Ok(Attribute { name_index, info })
    }

    fn expect<'a, T>(
        &'a self,
        idx: ConstantIndex,
        expected: &'static str,
        extract: impl FnOnce(&'a Constant) -> Option<T>,
    ) -> Result<T, Error> {
        self.get(idx).and_then(extract).ok_or(Error::BadConstant {
            index: idx.0,
            expected,
        })
    }

    /// Resolve a `CONSTANT_Utf8` index
    pub fn utf8(&self, idx: Utf8ConstantIndex) -> Result<&str, Error> {
        self.expect(idx.0, "Utf8", |constant| match constant {
            Constant::Utf8(string) => Some(string.as_str()),
            _ => None,
        })
    }

    /// Resolve a `CONSTANT_Class` index into the class or array type it names
    pub fn class_ref(&self, idx: ClassConstantIndex) -> Result<RefType<BinaryName>, Error> {
        let name = self.expect(idx.0, "Class", |constant| match constant {
            Constant::Class(name) => Some(*name),
            _ => None,
        })?;
        let name = self.utf8(name)?;
        if name.starts_with('[') {
            RefType::parse(name).map_err(|_| Error::BadDescriptor(name.to_owned()))
        } else {
            BinaryName::from_string(name.to_owned())
                .map(RefType::Object)
                .map_err(|_| Error::BadDescriptor(name.to_owned()))
        }
    }

    /// Resolve a `CONSTANT_Class` index that must name an object (not array) type
    pub fn class_name(&self, idx: ClassConstantIndex) -> Result<BinaryName, Error> {
        match self.class_ref(idx)? {
            RefType::Object(name) => Ok(name),
            _ => Err(Error::BadConstant {
                index: (idx.0).0,
                expected: "non-array Class",
            }),
        }
    }

    fn name_and_type(&self, idx: NameAndTypeConstantIndex) -> Result<(&str, &str), Error> {
        let (name, descriptor) = self.expect(idx.0, "NameAndType", |constant| match constant {
            Constant::NameAndType { name, descriptor } => Some((*name, *descriptor)),
            _ => None,
        })?;
        Ok((self.utf8(name)?, self.utf8(descriptor)?))
    }

    /// Resolve a `CONSTANT_Fieldref` index
    pub fn field_ref(&self, idx: FieldRefConstantIndex) -> Result<FieldRef, Error> {
        let (class, name_and_type) = self.expect(idx.0, "Fieldref", |constant| match constant {
            Constant::FieldRef(class, name_and_type) => Some((*class, *name_and_type)),
            _ => None,
        })?;
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(FieldRef {
            class: self.class_name(class)?,
            name: parse_name(name)?,
            descriptor: FieldType::parse(descriptor)
                .map_err(|_| Error::BadDescriptor(descriptor.to_owned()))?,
        })
    }

    /// Resolve a `CONSTANT_Methodref` or `CONSTANT_InterfaceMethodref` index
    pub fn method_ref(&self, idx: MethodRefConstantIndex) -> Result<MethodRef, Error> {
        let (class, name_and_type, is_interface) =
            self.expect(idx.0, "Methodref", |constant| match constant {
                Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface,
                } => Some((*class, *name_and_type, *is_interface)),
                _ => None,
            })?;
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MethodRef {
            class: self.class_ref(class)?,
            name: parse_name(name)?,
            descriptor: MethodDescriptor::parse(descriptor)
                .map_err(|_| Error::BadDescriptor(descriptor.to_owned()))?,
            is_interface,
        })
    }

    /// Resolve a constant loaded by `ldc`, `ldc_w`, or `ldc2_w`
    pub fn loadable(&self, idx: ConstantIndex) -> Result<ConstantData, Error> {
        match self.get(idx) {
            Some(Constant::Integer(integer)) => Ok(ConstantData::Integer(*integer)),
            Some(Constant::Float(float)) => Ok(ConstantData::Float(*float)),
            Some(Constant::Long(long)) => Ok(ConstantData::Long(*long)),
            Some(Constant::Double(double)) => Ok(ConstantData::Double(*double)),
            Some(Constant::String(utf8)) => Ok(ConstantData::String(self.utf8(*utf8)?.to_owned())),
            Some(Constant::Class(_)) => Ok(ConstantData::Class(
                self.class_ref(ClassConstantIndex(idx))?,
            )),
            Some(other) => Err(Error::UnsupportedConstant(other.clone())),
            None => Err(Error::BadConstant {
                index: idx.0,
                expected: "loadable constant",
            }),
        }
    }

    /// Check that every constant can be written at the given major version
    pub fn check_version(&self, major_version: u16) -> Result<(), Error> {
        match self.iter().find(|c| c.minimum_major_version() > major_version) {
            None => Ok(()),
            Some(constant) => Err(Error::UnsupportedConstant(constant.clone())),
        }
    }
}

fn parse_name(name: &str) -> Result<UnqualifiedName, Error> {
    UnqualifiedName::from_string(name.to_owned()).map_err(|_| Error::BadDescriptor(name.to_owned()))
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

/// The `u16` count is one more than the number of slots (index `0` is never valid)
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.slot_count().serialize(writer)?;
        for constant in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for ConstantsPool {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let count = u16::deserialize(reader)? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            constants.push(Constant::deserialize(reader)?);
        }
        Ok(ConstantsPool::from_constants(&constants))
    }
}

#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: u16,
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (see [`encode_modified_utf8`]).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: u8,
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    Module(Utf8ConstantIndex),
    Package(Utf8ConstantIndex),
}

impl Constant {
    /// First class file major version in which the constant may appear
    pub fn minimum_major_version(&self) -> u16 {
        match self {
            Constant::MethodHandle { .. }
            | Constant::MethodType { .. }
            | Constant::InvokeDynamic { .. } => 51,
            Constant::Module(_) | Constant::Package(_) => 53,
            Constant::Dynamic { .. } => 55,
            _ => 45,
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        let tag = u8::deserialize(reader)?;
        let constant = match tag {
            1 => {
                let len = u16::deserialize(reader)? as usize;
                let bytes = read_bytes(reader, len)?;
                Constant::Utf8(decode_modified_utf8(&bytes)?)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: u8::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => {
                let msg = format!("unknown constant pool tag {}", other);
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
            }
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    let mut units = [0u16; 2];
    for c in string.chars() {
        for unit in c.encode_utf16(&mut units).iter() {
            let code = *unit as u32;
            if code != 0 && code < 0x80 {
                buffer.push(code as u8);
            } else if code < 0x800 {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            } else {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Unpaired surrogates have no `String` representation, so they are rejected.
pub fn decode_modified_utf8(bytes: &[u8]) -> std::io::Result<String> {
    let invalid = || {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "invalid modified UTF-8 constant",
        )
    };
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or_else(invalid)? as u16;
            units.push((b0 & 0x1F) << 6 | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or_else(invalid)? as u16;
            let b2 = *bytes.get(i + 2).ok_or_else(invalid)? as u16;
            units.push((b0 & 0x0F) << 12 | (b1 & 0x3F) << 6 | (b2 & 0x3F));
            i += 3;
        } else {
            return Err(invalid());
        }
    }
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| invalid())
}


/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// JVMS §4.4.5:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

macro_rules! constant_index {
    ($name:ident) => {
        #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
        pub struct $name(pub ConstantIndex);

        impl From<$name> for ConstantIndex {
            fn from(idx: $name) -> ConstantIndex {
                idx.0
            }
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
                Ok($name(ConstantIndex::deserialize(reader)?))
            }
        }
    };
}

constant_index!(Utf8ConstantIndex);
constant_index!(StringConstantIndex);
constant_index!(NameAndTypeConstantIndex);
constant_index!(ClassConstantIndex);
constant_index!(FieldRefConstantIndex);
constant_index!(MethodRefConstantIndex);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::io::Result<Self> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;
    use crate::jvm::BaseType;

    #[test]
    fn interning_reuses_entries() {
        let mut pool = ConstantsPool::new();
        let a = pool.intern_string("hello").unwrap();
        let b = pool.intern_string("hello").unwrap();
        assert_eq!(a, b);

        let long = pool.get_long(7).unwrap();
        let next = pool.get_integer(1).unwrap();
        assert_eq!(next.0, long.0 + 2, "longs take two slots");
    }

    #[test]
    fn seeded_pool_keeps_indices() {
        let mut original = ConstantsPool::new();
        let method = MethodRef {
            class: RefType::Object(BinaryName::STRING),
            name: UnqualifiedName::VALUEOF,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::Base(BaseType::Int)],
                return_type: Some(FieldType::object(BinaryName::STRING)),
            },
            is_interface: false,
        };
        let idx = original.intern_method_ref(&method).unwrap();

        let mut bytes = vec![];
        original.serialize(&mut bytes).unwrap();
        let mut reread = ConstantsPool::deserialize(&mut bytes.as_slice()).unwrap();

        assert_eq!(reread.method_ref(idx).unwrap(), method);
        assert_eq!(reread.intern_method_ref(&method).unwrap(), idx);
        assert_eq!(reread.slot_count(), original.slot_count());
    }

    #[test]
    fn wrong_constant_kind() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("x").unwrap();
        assert!(matches!(
            pool.class_ref(ClassConstantIndex(utf8.0)),
            Err(Error::BadConstant { .. })
        ));
    }
}
