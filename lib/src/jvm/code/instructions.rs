//! The representation is slightly different from the usual presentation of JVM bytecode:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches and also simplifies tasks like inverting a
//!     branch condition.
//!
//!   - `jsr`, `ret`, and `invokedynamic` are omitted. Methods using them can't be rewritten.

use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, MethodRefConstantIndex, Serialize,
};
use crate::jvm::{BaseType, BinaryName, ConstantData, FieldRef, MethodRef, RefType};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::TryFrom;
use std::io::Result;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
///
/// The default type parameters give the symbolic form used when analysing and rewriting code. The
/// [`RawInstruction`] form refers to constants by index and is what gets read and written.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<
    Class = RefType<BinaryName>,
    Constant = ConstantData,
    Field = FieldRef,
    Method = MethodRef,
> {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers both `ldc` and `ldc_w`
    Ldc2(Constant),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(Field),
    PutStatic(Field),
    GetField(Field),
    PutField(Field),
    Invoke(InvokeType, Method),
    New(Class),
    NewArray(BaseType),
    ANewArray(Class),
    ArrayLength,
    CheckCast(Class),
    InstanceOf(Class),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(Class, u8),
}

/// Instruction as it is encoded in the code array
pub type RawInstruction =
    Instruction<ClassConstantIndex, ConstantIndex, FieldRefConstantIndex, MethodRefConstantIndex>;

impl<Class, Constant, Field, Method> Instruction<Class, Constant, Field, Method> {
    /// Map over the constant operands of the instruction
    pub fn map<Class2, Constant2, Field2, Method2, E>(
        &self,
        mut map_class: impl FnMut(&Class) -> std::result::Result<Class2, E>,
        mut map_constant: impl FnMut(&Constant) -> std::result::Result<Constant2, E>,
        mut map_field: impl FnMut(&Field) -> std::result::Result<Field2, E>,
        mut map_method: impl FnMut(&Method) -> std::result::Result<Method2, E>,
    ) -> std::result::Result<Instruction<Class2, Constant2, Field2, Method2>, E> {
        use Instruction::*;
        Ok(match self {
            Nop => Nop,
            AConstNull => AConstNull,
            IConstM1 => IConstM1,
            IConst0 => IConst0,
            IConst1 => IConst1,
            IConst2 => IConst2,
            IConst3 => IConst3,
            IConst4 => IConst4,
            IConst5 => IConst5,
            LConst0 => LConst0,
            LConst1 => LConst1,
            FConst0 => FConst0,
            FConst1 => FConst1,
            FConst2 => FConst2,
            DConst0 => DConst0,
            DConst1 => DConst1,
            BiPush(b) => BiPush(*b),
            SiPush(s) => SiPush(*s),
            Ldc(constant) => Ldc(map_constant(constant)?),
            Ldc2(constant) => Ldc2(map_constant(constant)?),
            ILoad(idx) => ILoad(*idx),
            LLoad(idx) => LLoad(*idx),
            FLoad(idx) => FLoad(*idx),
            DLoad(idx) => DLoad(*idx),
            ALoad(idx) => ALoad(*idx),
            IALoad => IALoad,
            LALoad => LALoad,
            FALoad => FALoad,
            DALoad => DALoad,
            AALoad => AALoad,
            BALoad => BALoad,
            CALoad => CALoad,
            SALoad => SALoad,
            IStore(idx) => IStore(*idx),
            LStore(idx) => LStore(*idx),
            FStore(idx) => FStore(*idx),
            DStore(idx) => DStore(*idx),
            AStore(idx) => AStore(*idx),
            IAStore => IAStore,
            LAStore => LAStore,
            FAStore => FAStore,
            DAStore => DAStore,
            AAStore => AAStore,
            BAStore => BAStore,
            CAStore => CAStore,
            SAStore => SAStore,
            Pop => Pop,
            Pop2 => Pop2,
            Dup => Dup,
            DupX1 => DupX1,
            DupX2 => DupX2,
            Dup2 => Dup2,
            Dup2X1 => Dup2X1,
            Dup2X2 => Dup2X2,
            Swap => Swap,
            IAdd => IAdd,
            LAdd => LAdd,
            FAdd => FAdd,
            DAdd => DAdd,
            ISub => ISub,
            LSub => LSub,
            FSub => FSub,
            DSub => DSub,
            IMul => IMul,
            LMul => LMul,
            FMul => FMul,
            DMul => DMul,
            IDiv => IDiv,
            LDiv => LDiv,
            FDiv => FDiv,
            DDiv => DDiv,
            IRem => IRem,
            LRem => LRem,
            FRem => FRem,
            DRem => DRem,
            INeg => INeg,
            LNeg => LNeg,
            FNeg => FNeg,
            DNeg => DNeg,
            ISh(s) => ISh(*s),
            LSh(s) => LSh(*s),
            IAnd => IAnd,
            LAnd => LAnd,
            IOr => IOr,
            LOr => LOr,
            IXor => IXor,
            LXor => LXor,
            IInc(idx, by) => IInc(*idx, *by),
            I2L => I2L,
            I2F => I2F,
            I2D => I2D,
            L2I => L2I,
            L2F => L2F,
            L2D => L2D,
            F2I => F2I,
            F2L => F2L,
            F2D => F2D,
            D2I => D2I,
            D2L => D2L,
            D2F => D2F,
            I2B => I2B,
            I2C => I2C,
            I2S => I2S,
            LCmp => LCmp,
            FCmp(m) => FCmp(*m),
            DCmp(m) => DCmp(*m),
            GetStatic(field) => GetStatic(map_field(field)?),
            PutStatic(field) => PutStatic(map_field(field)?),
            GetField(field) => GetField(map_field(field)?),
            PutField(field) => PutField(map_field(field)?),
            Invoke(typ, method) => Invoke(*typ, map_method(method)?),
            New(class) => New(map_class(class)?),
            NewArray(bt) => NewArray(*bt),
            ANewArray(class) => ANewArray(map_class(class)?),
            ArrayLength => ArrayLength,
            CheckCast(class) => CheckCast(map_class(class)?),
            InstanceOf(class) => InstanceOf(map_class(class)?),
            MonitorEnter => MonitorEnter,
            MonitorExit => MonitorExit,
            MultiANewArray(class, dims) => MultiANewArray(map_class(class)?, *dims),
        })
    }
}

impl Instruction {
    /// Load a constant, picking `ldc2_w` for `long`/`double`
    pub fn ldc(constant: ConstantData) -> Instruction {
        if constant.is_wide() {
            Instruction::Ldc2(constant)
        } else {
            Instruction::Ldc(constant)
        }
    }

    /// Push an `int` constant using the shortest encoding
    pub fn iconst(value: i32) -> Instruction {
        match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => match (i8::try_from(value), i16::try_from(value)) {
                (Ok(b), _) => Instruction::BiPush(b),
                (_, Ok(s)) => Instruction::SiPush(s),
                _ => Instruction::Ldc(ConstantData::Integer(value)),
            },
        }
    }

    /// Number of stack slots popped and pushed by the instruction
    ///
    /// `long` and `double` values take two slots, everything else one.
    pub fn stack_effect(&self) -> (usize, usize) {
        use Instruction::*;
        match self {
            Nop | IInc(_, _) => (0, 0),
            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) => (0, 1),
            LConst0 | LConst1 | DConst0 | DConst1 => (0, 2),
            Ldc(_) => (0, 1),
            Ldc2(_) => (0, 2),
            ILoad(_) | FLoad(_) | ALoad(_) => (0, 1),
            LLoad(_) | DLoad(_) => (0, 2),
            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => (2, 1),
            LALoad | DALoad => (2, 2),
            IStore(_) | FStore(_) | AStore(_) => (1, 0),
            LStore(_) | DStore(_) => (2, 0),
            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => (3, 0),
            LAStore | DAStore => (4, 0),
            Pop => (1, 0),
            Pop2 => (2, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),
            IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IRem | FRem | ISh(_)
            | IAnd | IOr | IXor => (2, 1),
            LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv | DDiv | LRem | DRem | LAnd | LOr
            | LXor => (4, 2),
            LSh(_) => (3, 2),
            INeg | FNeg => (1, 1),
            LNeg | DNeg => (2, 2),
            I2F | F2I | I2B | I2C | I2S => (1, 1),
            I2L | I2D | F2L | F2D => (1, 2),
            L2I | L2F | D2I | D2F => (2, 1),
            L2D | D2L => (2, 2),
            LCmp | DCmp(_) => (4, 1),
            FCmp(_) => (2, 1),
            GetStatic(field) => (0, field.descriptor.width()),
            PutStatic(field) => (field.descriptor.width(), 0),
            GetField(field) => (1, field.descriptor.width()),
            PutField(field) => (1 + field.descriptor.width(), 0),
            Invoke(typ, method) => {
                let has_this = !matches!(typ, InvokeType::Static);
                let pops = method.descriptor.parameter_length(has_this);
                let pushes = method.descriptor.return_type.as_ref().map_or(0, Width::width);
                (pops, pushes)
            }
            New(_) => (0, 1),
            NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => (1, 1),
            MonitorEnter | MonitorExit => (1, 0),
            MultiANewArray(_, dims) => (*dims as usize, 1),
        }
    }
}

impl Width for RawInstruction {
    fn width(&self) -> usize {
        use Instruction::*;
        match self {
            ILoad(0..=3) | LLoad(0..=3) | FLoad(0..=3) | DLoad(0..=3) | ALoad(0..=3)
            | IStore(0..=3) | LStore(0..=3) | FStore(0..=3) | DStore(0..=3) | AStore(0..=3) => 1,

            ILoad(0..=255) | LLoad(0..=255) | FLoad(0..=255) | DLoad(0..=255)
            | ALoad(0..=255) | IStore(0..=255) | LStore(0..=255) | FStore(0..=255)
            | DStore(0..=255) | AStore(0..=255) => 2,

            ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) | IStore(_) | LStore(_)
            | FStore(_) | DStore(_) | AStore(_) => 4,

            BiPush(_) | NewArray(_) | Ldc(ConstantIndex(0..=255)) => 2,

            SiPush(_) | Ldc(_) | Ldc2(_) | GetStatic(_) | PutStatic(_) | GetField(_)
            | PutField(_) | New(_) | ANewArray(_) | CheckCast(_) | InstanceOf(_) => 3,
            IInc(0..=255, -128..=127) => 3,
            IInc(_, _) => 6,

            Invoke(InvokeType::Interface(_), _) => 5,
            Invoke(_, _) => 3,
            MultiANewArray(_, _) => 4,

            _ => 1,
        }
    }
}

impl Serialize for RawInstruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `iload` plus a byte operand
         *   - wide form (255-65535) use `wide iload` plus two byte operands
         */
        fn load_or_store<W: WriteBytesExt>(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            writer: &mut W,
        ) -> Result<()> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(writer),
                Ok(n) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                Err(_) => {
                    0xC4u8.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        fn with_index<W: WriteBytesExt, I: Serialize>(
            opcode: u8,
            idx: &I,
            writer: &mut W,
        ) -> Result<()> {
            opcode.serialize(writer)?;
            idx.serialize(writer)
        }

        use Instruction::*;
        match self {
            ILoad(idx) => return load_or_store(*idx, 0x1A, 0x15, writer),
            LLoad(idx) => return load_or_store(*idx, 0x1E, 0x16, writer),
            FLoad(idx) => return load_or_store(*idx, 0x22, 0x17, writer),
            DLoad(idx) => return load_or_store(*idx, 0x26, 0x18, writer),
            ALoad(idx) => return load_or_store(*idx, 0x2A, 0x19, writer),
            IStore(idx) => return load_or_store(*idx, 0x3B, 0x36, writer),
            LStore(idx) => return load_or_store(*idx, 0x3F, 0x37, writer),
            FStore(idx) => return load_or_store(*idx, 0x43, 0x38, writer),
            DStore(idx) => return load_or_store(*idx, 0x47, 0x39, writer),
            AStore(idx) => return load_or_store(*idx, 0x4B, 0x3A, writer),
            BiPush(b) => {
                0x10u8.serialize(writer)?;
                return b.serialize(writer);
            }
            SiPush(s) => return with_index(0x11, s, writer),
            Ldc(ConstantIndex(idx)) => {
                return match u8::try_from(*idx) {
                    Ok(b) => with_index(0x12, &b, writer),
                    Err(_) => with_index(0x13, idx, writer),
                }
            }
            Ldc2(idx) => return with_index(0x14, idx, writer),
            IInc(idx, diff) => {
                return match (u8::try_from(*idx), i8::try_from(*diff)) {
                    (Ok(b), Ok(d)) => {
                        0x84u8.serialize(writer)?;
                        b.serialize(writer)?;
                        d.serialize(writer)
                    }
                    _ => {
                        0xC4u8.serialize(writer)?;
                        0x84u8.serialize(writer)?;
                        idx.serialize(writer)?;
                        diff.serialize(writer)
                    }
                }
            }
            GetStatic(idx) => return with_index(0xB2, idx, writer),
            PutStatic(idx) => return with_index(0xB3, idx, writer),
            GetField(idx) => return with_index(0xB4, idx, writer),
            PutField(idx) => return with_index(0xB5, idx, writer),
            Invoke(InvokeType::Virtual, idx) => return with_index(0xB6, idx, writer),
            Invoke(InvokeType::Special, idx) => return with_index(0xB7, idx, writer),
            Invoke(InvokeType::Static, idx) => return with_index(0xB8, idx, writer),
            Invoke(InvokeType::Interface(count), idx) => {
                with_index(0xB9, idx, writer)?;
                count.serialize(writer)?;
                return 0u8.serialize(writer);
            }
            New(idx) => return with_index(0xBB, idx, writer),
            NewArray(base_type) => return with_index(0xBC, &array_type_code(*base_type), writer),
            ANewArray(idx) => return with_index(0xBD, idx, writer),
            CheckCast(idx) => return with_index(0xC0, idx, writer),
            InstanceOf(idx) => return with_index(0xC1, idx, writer),
            MultiANewArray(idx, dims) => {
                with_index(0xC5, idx, writer)?;
                return dims.serialize(writer);
            }
            _ => (),
        }

        // Everything left is a single opcode byte
        let opcode: u8 = match self {
            Nop => 0x00,
            AConstNull => 0x01,
            IConstM1 => 0x02,
            IConst0 => 0x03,
            IConst1 => 0x04,
            IConst2 => 0x05,
            IConst3 => 0x06,
            IConst4 => 0x07,
            IConst5 => 0x08,
            LConst0 => 0x09,
            LConst1 => 0x0a,
            FConst0 => 0x0b,
            FConst1 => 0x0c,
            FConst2 => 0x0d,
            DConst0 => 0x0e,
            DConst1 => 0x0f,
            IALoad => 0x2e,
            LALoad => 0x2f,
            FALoad => 0x30,
            DALoad => 0x31,
            AALoad => 0x32,
            BALoad => 0x33,
            CALoad => 0x34,
            SALoad => 0x35,
            IAStore => 0x4f,
            LAStore => 0x50,
            FAStore => 0x51,
            DAStore => 0x52,
            AAStore => 0x53,
            BAStore => 0x54,
            CAStore => 0x55,
            SAStore => 0x56,
            Pop => 0x57,
            Pop2 => 0x58,
            Dup => 0x59,
            DupX1 => 0x5a,
            DupX2 => 0x5b,
            Dup2 => 0x5c,
            Dup2X1 => 0x5d,
            Dup2X2 => 0x5e,
            Swap => 0x5f,
            IAdd => 0x60,
            LAdd => 0x61,
            FAdd => 0x62,
            DAdd => 0x63,
            ISub => 0x64,
            LSub => 0x65,
            FSub => 0x66,
            DSub => 0x67,
            IMul => 0x68,
            LMul => 0x69,
            FMul => 0x6a,
            DMul => 0x6b,
            IDiv => 0x6c,
            LDiv => 0x6d,
            FDiv => 0x6e,
            DDiv => 0x6f,
            IRem => 0x70,
            LRem => 0x71,
            FRem => 0x72,
            DRem => 0x73,
            INeg => 0x74,
            LNeg => 0x75,
            FNeg => 0x76,
            DNeg => 0x77,
            ISh(ShiftType::Left) => 0x78,
            LSh(ShiftType::Left) => 0x79,
            ISh(ShiftType::ArithmeticRight) => 0x7a,
            LSh(ShiftType::ArithmeticRight) => 0x7b,
            ISh(ShiftType::LogicalRight) => 0x7c,
            LSh(ShiftType::LogicalRight) => 0x7d,
            IAnd => 0x7e,
            LAnd => 0x7f,
            IOr => 0x80,
            LOr => 0x81,
            IXor => 0x82,
            LXor => 0x83,
            I2L => 0x85,
            I2F => 0x86,
            I2D => 0x87,
            L2I => 0x88,
            L2F => 0x89,
            L2D => 0x8a,
            F2I => 0x8b,
            F2L => 0x8c,
            F2D => 0x8d,
            D2I => 0x8e,
            D2L => 0x8f,
            D2F => 0x90,
            I2B => 0x91,
            I2C => 0x92,
            I2S => 0x93,
            LCmp => 0x94,
            FCmp(CompareMode::L) => 0x95,
            FCmp(CompareMode::G) => 0x96,
            DCmp(CompareMode::L) => 0x97,
            DCmp(CompareMode::G) => 0x98,
            ArrayLength => 0xbe,
            MonitorEnter => 0xc2,
            MonitorExit => 0xc3,
            _ => unreachable!("instruction with operands handled above"),
        };
        opcode.serialize(writer)
    }
}

/// `atype` operand of `newarray`
pub fn array_type_code(base_type: BaseType) -> u8 {
    match base_type {
        BaseType::Boolean => 4,
        BaseType::Char => 5,
        BaseType::Float => 6,
        BaseType::Double => 7,
        BaseType::Byte => 8,
        BaseType::Short => 9,
        BaseType::Int => 10,
        BaseType::Long => 11,
    }
}

/// Inverse of [`array_type_code`]
pub fn array_type_from_code(code: u8) -> Option<BaseType> {
    BaseType::ALL
        .iter()
        .copied()
        .find(|base_type| array_type_code(*base_type) == code)
}

/// Branching JVM bytecode instruction
///
/// Targets are labels while the code is being edited, and become offsets relative to the start
/// of the instruction when the code array is laid out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Lbl), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),                 // covers `goto` and `goto_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Lbl,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Lbl,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl> BranchInstruction<Lbl> {
    /// Can execution continue with the next instruction?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(..)
                | BranchInstruction::IfICmp(..)
                | BranchInstruction::IfACmp(..)
                | BranchInstruction::IfNull(..)
        )
    }

    /// Is this one of the `*return` instructions?
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            BranchInstruction::IReturn
                | BranchInstruction::LReturn
                | BranchInstruction::FReturn
                | BranchInstruction::DReturn
                | BranchInstruction::AReturn
                | BranchInstruction::Return
        )
    }

    /// All explicit jump targets
    pub fn jump_targets(&self) -> Vec<&Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfACmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl) => vec![lbl],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(default).chain(targets.iter()).collect(),
            BranchInstruction::LookupSwitch { default, targets } => std::iter::once(default)
                .chain(targets.iter().map(|(_, lbl)| lbl))
                .collect(),
            _ => vec![],
        }
    }

    /// Number of stack slots consumed
    pub fn stack_pops(&self) -> usize {
        match self {
            BranchInstruction::IfICmp(..) | BranchInstruction::IfACmp(..) => 2,
            BranchInstruction::If(..)
            | BranchInstruction::IfNull(..)
            | BranchInstruction::TableSwitch { .. }
            | BranchInstruction::LookupSwitch { .. }
            | BranchInstruction::IReturn
            | BranchInstruction::FReturn
            | BranchInstruction::AReturn
            | BranchInstruction::AThrow => 1,
            BranchInstruction::LReturn | BranchInstruction::DReturn => 2,
            BranchInstruction::Goto(_) | BranchInstruction::Return => 0,
        }
    }

    pub fn map_labels<Lbl2, E>(
        &self,
        mut map_label: impl FnMut(&Lbl) -> std::result::Result<Lbl2, E>,
    ) -> std::result::Result<BranchInstruction<Lbl2>, E> {
        use BranchInstruction::*;
        Ok(match self {
            If(op, lbl) => If(*op, map_label(lbl)?),
            IfICmp(op, lbl) => IfICmp(*op, map_label(lbl)?),
            IfACmp(op, lbl) => IfACmp(*op, map_label(lbl)?),
            IfNull(op, lbl) => IfNull(*op, map_label(lbl)?),
            Goto(lbl) => Goto(map_label(lbl)?),
            TableSwitch {
                default,
                low,
                targets,
            } => TableSwitch {
                default: map_label(default)?,
                low: *low,
                targets: targets
                    .iter()
                    .map(&mut map_label)
                    .collect::<std::result::Result<_, E>>()?,
            },
            LookupSwitch { default, targets } => LookupSwitch {
                default: map_label(default)?,
                targets: targets
                    .iter()
                    .map(|(key, lbl)| Ok((*key, map_label(lbl)?)))
                    .collect::<std::result::Result<_, E>>()?,
            },
            IReturn => IReturn,
            LReturn => LReturn,
            FReturn => FReturn,
            DReturn => DReturn,
            AReturn => AReturn,
            Return => Return,
            AThrow => AThrow,
        })
    }

    /// Single-byte opcode of the non-jumping branch instructions
    pub(crate) fn terminal_opcode(&self) -> Option<u8> {
        match self {
            BranchInstruction::IReturn => Some(0xac),
            BranchInstruction::LReturn => Some(0xad),
            BranchInstruction::FReturn => Some(0xae),
            BranchInstruction::DReturn => Some(0xaf),
            BranchInstruction::AReturn => Some(0xb0),
            BranchInstruction::Return => Some(0xb1),
            BranchInstruction::AThrow => Some(0xbf),
            _ => None,
        }
    }

    /// Opcode of the conditional branches
    pub(crate) fn conditional_opcode(&self) -> Option<u8> {
        match self {
            BranchInstruction::If(comp, _) => Some(0x99 + comp.opcode_offset()),
            BranchInstruction::IfICmp(comp, _) => Some(0x9f + comp.opcode_offset()),
            BranchInstruction::IfACmp(EqComparison::EQ, _) => Some(0xa5),
            BranchInstruction::IfACmp(EqComparison::NE, _) => Some(0xa6),
            BranchInstruction::IfNull(EqComparison::EQ, _) => Some(0xc6),
            BranchInstruction::IfNull(EqComparison::NE, _) => Some(0xc7),
            _ => None,
        }
    }

    /// Flip the condition of a conditional branch
    pub fn negate(self) -> BranchInstruction<Lbl> {
        match self {
            BranchInstruction::If(comp, lbl) => BranchInstruction::If(!comp, lbl),
            BranchInstruction::IfICmp(comp, lbl) => BranchInstruction::IfICmp(!comp, lbl),
            BranchInstruction::IfACmp(comp, lbl) => BranchInstruction::IfACmp(!comp, lbl),
            BranchInstruction::IfNull(comp, lbl) => BranchInstruction::IfNull(!comp, lbl),
            other => other,
        }
    }
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

impl OrdComparison {
    pub const ALL: [OrdComparison; 6] = [
        OrdComparison::EQ,
        OrdComparison::NE,
        OrdComparison::LT,
        OrdComparison::GE,
        OrdComparison::GT,
        OrdComparison::LE,
    ];

    /// Opcodes of `if<cond>` and `if_icmp<cond>` are laid out in this order
    fn opcode_offset(&self) -> u8 {
        match self {
            OrdComparison::EQ => 0,
            OrdComparison::NE => 1,
            OrdComparison::LT => 2,
            OrdComparison::GE => 3,
            OrdComparison::GT => 4,
            OrdComparison::LE => 5,
        }
    }

    pub(crate) fn from_opcode_offset(offset: u8) -> Option<OrdComparison> {
        OrdComparison::ALL.get(offset as usize).copied()
    }

    /// Evaluate the comparison
    pub fn holds(&self, lhs: i32, rhs: i32) -> bool {
        match self {
            OrdComparison::EQ => lhs == rhs,
            OrdComparison::NE => lhs != rhs,
            OrdComparison::LT => lhs < rhs,
            OrdComparison::GE => lhs >= rhs,
            OrdComparison::GT => lhs > rhs,
            OrdComparison::LE => lhs <= rhs,
        }
    }
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::NE => OrdComparison::EQ,
        }
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

impl InvokeType {
    /// Usual way of invoking a method, given how it was declared
    pub fn infer(is_static: bool, is_interface: bool, method: &MethodRef) -> InvokeType {
        if is_static {
            InvokeType::Static
        } else if method.is_init() {
            InvokeType::Special
        } else if is_interface {
            InvokeType::Interface(method.descriptor.parameter_length(true) as u8)
        } else {
            InvokeType::Virtual
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{FieldType, MethodDescriptor, UnqualifiedName};

    fn encode(insn: RawInstruction) -> Vec<u8> {
        let mut bytes = vec![];
        insn.serialize(&mut bytes).unwrap();
        assert_eq!(bytes.len(), insn.width(), "width of {:?}", insn);
        bytes
    }

    #[test]
    fn load_store_forms() {
        assert_eq!(encode(Instruction::ALoad(0)), vec![0x2a]);
        assert_eq!(encode(Instruction::ILoad(7)), vec![0x15, 7]);
        assert_eq!(encode(Instruction::AStore(300)), vec![0xc4, 0x3a, 1, 44]);
        assert_eq!(encode(Instruction::IInc(2, 1)), vec![0x84, 2, 1]);
        assert_eq!(encode(Instruction::IInc(2, 1000)), vec![0xc4, 0x84, 0, 2, 3, 232]);
    }

    #[test]
    fn constant_operands() {
        assert_eq!(encode(Instruction::Ldc(ConstantIndex(4))), vec![0x12, 4]);
        assert_eq!(encode(Instruction::Ldc(ConstantIndex(260))), vec![0x13, 1, 4]);
        assert_eq!(
            encode(Instruction::Invoke(
                InvokeType::Interface(2),
                MethodRefConstantIndex(ConstantIndex(9))
            )),
            vec![0xb9, 0, 9, 2, 0]
        );
        assert_eq!(encode(Instruction::NewArray(BaseType::Int)), vec![0xbc, 10]);
    }

    #[test]
    fn invoke_stack_effect() {
        let method = MethodRef {
            class: RefType::Object(BinaryName::STRING),
            name: UnqualifiedName::VALUEOF,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::long(), FieldType::int()],
                return_type: Some(FieldType::object(BinaryName::STRING)),
            },
            is_interface: false,
        };
        assert_eq!(
            Instruction::Invoke(InvokeType::Static, method.clone()).stack_effect(),
            (3, 1)
        );
        assert_eq!(
            Instruction::Invoke(InvokeType::Virtual, method).stack_effect(),
            (4, 1)
        );
    }

    #[test]
    fn shortest_int_constants() {
        assert_eq!(Instruction::iconst(3), Instruction::IConst3);
        assert_eq!(Instruction::iconst(-100), Instruction::BiPush(-100));
        assert_eq!(Instruction::iconst(1000), Instruction::SiPush(1000));
        assert_eq!(
            Instruction::iconst(100_000),
            Instruction::Ldc(ConstantData::Integer(100_000))
        );
    }

    #[test]
    fn negated_conditions() {
        for comp in OrdComparison::ALL {
            assert_ne!(comp.holds(1, 2), (!comp).holds(1, 2));
            assert_eq!(!!comp, comp);
        }
    }
}
