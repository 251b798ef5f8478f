use crate::jvm::class_file::{
    self, Attribute, BytecodeArray, BytecodeIndex, ClassConstantIndex, ConstantIndex,
    ConstantsPool, FieldRefConstantIndex, LineNumber, LineNumberTable, MethodRefConstantIndex,
    Serialize,
};
use crate::jvm::code::{
    array_type_from_code, BranchInstruction, CompareMode, EqComparison, Instruction, InvokeType,
    OrdComparison, RawInstruction, ShiftType, SynLabel, SynLabelGenerator,
};
use crate::jvm::class_file::AttributeLike;
use crate::jvm::{BinaryName, Error, RefType};
use crate::util::{Offset, Width};
use byteorder::{BigEndian, ReadBytesExt};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;

/// Semantic representation of a method body
///
/// The body is a flat sequence of items in which jump targets are labels instead of offsets.
/// Items can be inserted anywhere without invalidating any other part of the body, and offsets
/// only get recomputed when the body is encoded again.
#[derive(Clone, Debug)]
pub struct Code {
    /// Number of local variable slots (including parameters and `this`)
    pub max_locals: u16,

    /// Body of the method
    pub items: Vec<CodeItem>,

    /// Exception handlers, in order of priority
    pub exception_table: Vec<ExceptionHandler>,

    labels: SynLabelGenerator,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CodeItem {
    /// Position which branches and handlers can refer to
    Label(SynLabel),
    Instruction(Instruction),
    Branch(BranchInstruction<SynLabel>),

    /// Source line of the instructions which follow
    LineNumber(u16),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start: SynLabel,

    /// End of the protected range (exclusive)
    pub end: SynLabel,

    /// Start of the handler code
    pub handler: SynLabel,

    /// `None` catches anything
    pub catch_type: Option<BinaryName>,
}

impl Code {
    /// Empty method body
    pub fn new(max_locals: u16) -> Code {
        Code {
            max_locals,
            items: vec![],
            exception_table: vec![],
            labels: SynLabelGenerator::new(),
        }
    }

    pub fn fresh_label(&mut self) -> SynLabel {
        self.labels.fresh_label()
    }

    /// Reserve a new local variable of the given width (in slots)
    pub fn fresh_local(&mut self, width: usize) -> Result<u16, Error> {
        let idx = self.max_locals;
        let next = idx as usize + width;
        self.max_locals = u16::try_from(next)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(Offset(next)))?;
        Ok(idx)
    }

    /// Index in `items` of every label
    pub fn label_positions(&self) -> Result<HashMap<SynLabel, usize>, Error> {
        let mut positions = HashMap::new();
        for (idx, item) in self.items.iter().enumerate() {
            if let CodeItem::Label(lbl) = item {
                if positions.insert(*lbl, idx).is_some() {
                    return Err(Error::DuplicateLabel(*lbl));
                }
            }
        }
        Ok(positions)
    }

    /// Source line in effect at the item with the given index
    pub fn line_number_at(&self, index: usize) -> Option<u16> {
        self.items[..index.min(self.items.len())]
            .iter()
            .rev()
            .find_map(|item| match item {
                CodeItem::LineNumber(line) => Some(*line),
                _ => None,
            })
    }

    /// Decode a `Code` attribute
    ///
    /// Labels are introduced at every branch target, at every exception handler boundary, and
    /// at the end of the code (if something refers to it). `LineNumberTable` entries become
    /// [`CodeItem::LineNumber`] items. Other attributes of the code are dropped.
    pub fn decode(code: &class_file::Code, constants: &ConstantsPool) -> Result<Code, Error> {
        let bytes: &[u8] = &code.code_array.0;
        let mut cursor = Cursor::new(bytes);
        let mut decoded: Vec<(usize, Decoded)> = vec![];
        while (cursor.position() as usize) < bytes.len() {
            let offset = cursor.position() as usize;
            decoded.push((offset, decode_instruction(&mut cursor, offset)?));
        }

        let mut offsets = OffsetLabels {
            boundaries: decoded
                .iter()
                .map(|(offset, _)| *offset)
                .chain(std::iter::once(bytes.len()))
                .collect(),
            labels: HashMap::new(),
            generator: SynLabelGenerator::new(),
        };

        // Create every label before emitting items, since targets can be forward
        for (_, insn) in &decoded {
            if let Decoded::Branch(branch) = insn {
                for target in branch.jump_targets() {
                    offsets.label(*target)?;
                }
            }
        }
        let mut exception_table = vec![];
        for handler in &code.exception_table {
            let catch_type = if handler.catch_type.0 .0 == 0 {
                None
            } else {
                Some(constants.class_name(handler.catch_type)?)
            };
            exception_table.push(ExceptionHandler {
                start: offsets.label(handler.start_pc.0 as usize)?,
                end: offsets.label(handler.end_pc.0 as usize)?,
                handler: offsets.label(handler.handler_pc.0 as usize)?,
                catch_type,
            });
        }

        let mut line_numbers: BTreeMap<usize, Vec<u16>> = BTreeMap::new();
        for attribute in &code.attributes {
            if constants.utf8(attribute.name_index)? == LineNumberTable::NAME {
                let table = attribute.parse::<LineNumberTable>()?;
                for LineNumber {
                    start_pc,
                    line_number,
                } in table.0
                {
                    line_numbers
                        .entry(start_pc.0 as usize)
                        .or_default()
                        .push(line_number);
                }
            }
        }

        let mut items = vec![];
        for (offset, insn) in decoded {
            if let Some(lbl) = offsets.labels.get(&offset) {
                items.push(CodeItem::Label(*lbl));
            }
            if let Some(lines) = line_numbers.remove(&offset) {
                items.extend(lines.into_iter().map(CodeItem::LineNumber));
            }
            let item = match insn {
                Decoded::Instruction(raw) => CodeItem::Instruction(raw.map(
                    |class| constants.class_ref(*class),
                    |constant| constants.loadable(*constant),
                    |field| constants.field_ref(*field),
                    |method| constants.method_ref(*method),
                )?),
                Decoded::Branch(branch) => {
                    CodeItem::Branch(branch.map_labels(|target| offsets.label(*target))?)
                }
            };
            items.push(item);
        }
        if let Some(lbl) = offsets.labels.get(&bytes.len()) {
            items.push(CodeItem::Label(*lbl));
        }
        if !line_numbers.is_empty() {
            log::debug!("Dropping line numbers not on instruction boundaries");
        }

        Ok(Code {
            max_locals: code.max_locals,
            items,
            exception_table,
            labels: offsets.generator,
        })
    }

    /// Compute the maximum operand stack depth (in slots)
    ///
    /// Every path through the body is followed from the entry and from each exception handler
    /// (where the stack holds just the exception). Paths must agree on the depth wherever they
    /// meet, and no path may fall off the end of the code.
    pub fn max_stack(&self) -> Result<usize, Error> {
        let positions = self.label_positions()?;
        let position_of = |lbl: &SynLabel| -> Result<usize, Error> {
            positions.get(lbl).copied().ok_or(Error::UndefinedLabel(*lbl))
        };

        let mut depths: Vec<Option<usize>> = vec![None; self.items.len()];
        let mut worklist: Vec<(usize, usize)> = vec![(0, 0)];
        for handler in &self.exception_table {
            position_of(&handler.start)?;
            position_of(&handler.end)?;
            worklist.push((position_of(&handler.handler)?, 1));
        }

        let mut max_depth = 0;
        while let Some((start, mut depth)) = worklist.pop() {
            let mut idx = start;
            loop {
                let item = match self.items.get(idx) {
                    Some(item) => item,
                    None if self.items.is_empty() => return Ok(0),
                    None => {
                        return Err(Error::MalformedClassFile(String::from(
                            "Control flow falls off the end of the code",
                        )))
                    }
                };
                match depths[idx] {
                    Some(expected) if expected == depth => break,
                    Some(expected) => {
                        return Err(Error::InconsistentStackDepth {
                            item: idx,
                            expected,
                            found: depth,
                        })
                    }
                    None => depths[idx] = Some(depth),
                }
                max_depth = max_depth.max(depth);

                match item {
                    CodeItem::Label(_) | CodeItem::LineNumber(_) => (),
                    CodeItem::Instruction(insn) => {
                        let (pops, pushes) = insn.stack_effect();
                        depth = depth.checked_sub(pops).ok_or(Error::StackUnderflow(idx))?;
                        depth += pushes;
                        max_depth = max_depth.max(depth);
                    }
                    CodeItem::Branch(branch) => {
                        depth = depth
                            .checked_sub(branch.stack_pops())
                            .ok_or(Error::StackUnderflow(idx))?;
                        for target in branch.jump_targets() {
                            worklist.push((position_of(target)?, depth));
                        }
                        if !branch.falls_through() {
                            break;
                        }
                    }
                }
                idx += 1;
            }
        }

        Ok(max_depth)
    }

    /// Encode back into a `Code` attribute, adding whatever constants are needed to the pool
    ///
    /// Jumps whose offsets don't fit in 16 bits are rewritten to use `goto_w` (conditional jumps
    /// become an inverted conditional jump over a `goto_w`). No stack map is produced.
    pub fn encode(&self, constants: &mut ConstantsPool) -> Result<class_file::Code, Error> {
        let max_stack = self.max_stack()?;
        let max_stack =
            u16::try_from(max_stack).map_err(|_| Error::MethodCodeMaxStackOverflow(Offset(max_stack)))?;
        let positions = self.label_positions()?;
        for lbl in self.exception_table.iter().flat_map(|h| [h.start, h.end, h.handler]) {
            if !positions.contains_key(&lbl) {
                return Err(Error::UndefinedLabel(lbl));
            }
        }

        // Interning happens first since the width of `ldc` depends on the constant index
        let mut encodable: Vec<Encodable> = Vec::with_capacity(self.items.len());
        let pool = RefCell::new(&mut *constants);
        for item in &self.items {
            encodable.push(match item {
                CodeItem::Instruction(insn) => Encodable::Instruction(insn.map(
                    |class| pool.borrow_mut().intern_class_ref(class),
                    |constant| pool.borrow_mut().intern_constant(constant),
                    |field| pool.borrow_mut().intern_field_ref(field),
                    |method| pool.borrow_mut().intern_method_ref(method),
                )?),
                CodeItem::Branch(branch) => {
                    for target in branch.jump_targets() {
                        if !positions.contains_key(target) {
                            return Err(Error::UndefinedLabel(*target));
                        }
                    }
                    Encodable::Branch(branch)
                }
                CodeItem::Label(_) | CodeItem::LineNumber(_) => Encodable::Marker,
            });
        }
        drop(pool);

        // Widen jumps until all of the narrow ones are in range. This terminates since jumps only
        // ever go from narrow to wide.
        let mut wide = vec![false; encodable.len()];
        let offsets = loop {
            let offsets = layout(&encodable, &wide);
            let mut changed = false;
            for (idx, item) in encodable.iter().enumerate() {
                if let Encodable::Branch(branch) = item {
                    let is_short_jump = matches!(
                        branch,
                        BranchInstruction::Goto(_)
                            | BranchInstruction::If(..)
                            | BranchInstruction::IfICmp(..)
                            | BranchInstruction::IfACmp(..)
                            | BranchInstruction::IfNull(..)
                    );
                    if is_short_jump && !wide[idx] {
                        let target = offsets[positions[branch.jump_targets()[0]]];
                        let jump = target as isize - offsets[idx] as isize;
                        if i16::try_from(jump).is_err() {
                            wide[idx] = true;
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break offsets;
            }
        };
        let code_length = offsets[encodable.len()];
        if code_length > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(Offset(code_length)));
        }
        let label_offset = |lbl: &SynLabel| offsets[positions[lbl]];

        let mut bytes: Vec<u8> = Vec::with_capacity(code_length);
        let mut line_numbers = vec![];
        for (idx, item) in encodable.iter().enumerate() {
            match item {
                Encodable::Instruction(raw) => raw.serialize(&mut bytes)?,
                Encodable::Branch(branch) => {
                    write_branch(&mut bytes, branch, offsets[idx], wide[idx], label_offset)?
                }
                Encodable::Marker => {
                    if let CodeItem::LineNumber(line_number) = self.items[idx] {
                        line_numbers.push(LineNumber {
                            start_pc: BytecodeIndex(offsets[idx] as u16),
                            line_number,
                        });
                    }
                }
            }
            debug_assert_eq!(bytes.len(), offsets[idx + 1], "width mismatch at {}", idx);
        }

        let mut exception_table = vec![];
        for handler in &self.exception_table {
            let catch_type = match &handler.catch_type {
                None => ClassConstantIndex(ConstantIndex(0)),
                Some(name) => constants.intern_class_ref(&RefType::Object(name.clone()))?,
            };
            exception_table.push(class_file::ExceptionHandler {
                start_pc: BytecodeIndex(label_offset(&handler.start) as u16),
                end_pc: BytecodeIndex(label_offset(&handler.end) as u16),
                handler_pc: BytecodeIndex(label_offset(&handler.handler) as u16),
                catch_type,
            });
        }

        let mut attributes: Vec<Attribute> = vec![];
        if !line_numbers.is_empty() {
            attributes.push(constants.get_attribute(LineNumberTable(line_numbers))?);
        }

        Ok(class_file::Code {
            max_stack,
            max_locals: self.max_locals,
            code_array: BytecodeArray(bytes),
            exception_table,
            attributes,
        })
    }
}

enum Encodable<'a> {
    Instruction(RawInstruction),
    Branch(&'a BranchInstruction<SynLabel>),
    Marker,
}

/// Offset of every item, followed by the total length
fn layout(items: &[Encodable], wide: &[bool]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(items.len() + 1);
    let mut offset = 0;
    for (item, is_wide) in items.iter().zip(wide) {
        offsets.push(offset);
        offset += match item {
            Encodable::Instruction(raw) => raw.width(),
            Encodable::Branch(branch) => branch_width(branch, offset, *is_wide),
            Encodable::Marker => 0,
        };
    }
    offsets.push(offset);
    offsets
}

/// Padding after a switch opcode so that its operands are four-byte aligned
fn switch_padding(offset: usize) -> usize {
    3 - (offset % 4)
}

fn branch_width(branch: &BranchInstruction<SynLabel>, offset: usize, wide: bool) -> usize {
    match branch {
        BranchInstruction::Goto(_) if wide => 5,
        BranchInstruction::Goto(_) => 3,
        BranchInstruction::TableSwitch { targets, .. } if !targets.is_empty() => {
            1 + switch_padding(offset) + 12 + 4 * targets.len()
        }
        // An empty table is written as an empty `lookupswitch`
        BranchInstruction::TableSwitch { .. } => 1 + switch_padding(offset) + 8,
        BranchInstruction::LookupSwitch { targets, .. } => {
            1 + switch_padding(offset) + 8 + 8 * targets.len()
        }
        _ if branch.falls_through() && wide => 8,
        _ if branch.falls_through() => 3,
        _ => 1,
    }
}

fn write_branch(
    bytes: &mut Vec<u8>,
    branch: &BranchInstruction<SynLabel>,
    offset: usize,
    wide: bool,
    label_offset: impl Fn(&SynLabel) -> usize,
) -> Result<(), Error> {
    let relative = |lbl: &SynLabel, from: usize| label_offset(lbl) as i32 - from as i32;
    let pad = |bytes: &mut Vec<u8>| bytes.resize(bytes.len() + switch_padding(offset), 0);

    if let Some(opcode) = branch.terminal_opcode() {
        return Ok(opcode.serialize(bytes)?);
    }
    match branch {
        BranchInstruction::Goto(lbl) if wide => {
            0xC8u8.serialize(bytes)?;
            relative(lbl, offset).serialize(bytes)?;
        }
        BranchInstruction::Goto(lbl) => {
            0xA7u8.serialize(bytes)?;
            (relative(lbl, offset) as i16).serialize(bytes)?;
        }
        BranchInstruction::TableSwitch {
            default,
            low,
            targets,
        } if !targets.is_empty() => {
            0xAAu8.serialize(bytes)?;
            pad(bytes);
            relative(default, offset).serialize(bytes)?;
            low.serialize(bytes)?;
            (*low + targets.len() as i32 - 1).serialize(bytes)?;
            for target in targets {
                relative(target, offset).serialize(bytes)?;
            }
        }
        BranchInstruction::TableSwitch { default, .. } => {
            0xABu8.serialize(bytes)?;
            pad(bytes);
            relative(default, offset).serialize(bytes)?;
            0i32.serialize(bytes)?;
        }
        BranchInstruction::LookupSwitch { default, targets } => {
            0xABu8.serialize(bytes)?;
            pad(bytes);
            relative(default, offset).serialize(bytes)?;
            (targets.len() as i32).serialize(bytes)?;
            let mut sorted: Vec<&(i32, SynLabel)> = targets.iter().collect();
            sorted.sort_by_key(|(key, _)| *key);
            for (key, target) in sorted {
                key.serialize(bytes)?;
                relative(target, offset).serialize(bytes)?;
            }
        }
        conditional => {
            let target = conditional.jump_targets()[0];
            if wide {
                let inverted = conditional.clone().negate();
                inverted.conditional_opcode().unwrap_or_default().serialize(bytes)?;
                8i16.serialize(bytes)?;
                0xC8u8.serialize(bytes)?;
                relative(target, offset + 3).serialize(bytes)?;
            } else {
                conditional.conditional_opcode().unwrap_or_default().serialize(bytes)?;
                (relative(target, offset) as i16).serialize(bytes)?;
            }
        }
    }
    Ok(())
}

/// Assigns labels to bytecode offsets
struct OffsetLabels {
    /// Offsets at which an instruction starts (and the end of the code)
    boundaries: HashSet<usize>,
    labels: HashMap<usize, SynLabel>,
    generator: SynLabelGenerator,
}

impl OffsetLabels {
    fn label(&mut self, offset: usize) -> Result<SynLabel, Error> {
        if !self.boundaries.contains(&offset) {
            return Err(Error::MalformedClassFile(format!(
                "Offset {} is not on an instruction boundary",
                offset
            )));
        }
        let generator = &mut self.generator;
        Ok(*self
            .labels
            .entry(offset)
            .or_insert_with(|| generator.fresh_label()))
    }
}

/// Instruction as it appears in the code array, with branch targets as absolute offsets
enum Decoded {
    Instruction(RawInstruction),
    Branch(BranchInstruction<usize>),
}

fn truncated(_: std::io::Error) -> Error {
    Error::MalformedClassFile(String::from("Truncated instruction"))
}

fn decode_instruction(cursor: &mut Cursor<&[u8]>, offset: usize) -> Result<Decoded, Error> {
    use Instruction::*;

    let code_length = cursor.get_ref().len();
    let target = |relative: i32| -> Result<usize, Error> {
        let target = offset as i64 + relative as i64;
        if target < 0 || target as usize >= code_length {
            Err(Error::MalformedClassFile(format!(
                "Jump at {} to {} is outside the code",
                offset, target
            )))
        } else {
            Ok(target as usize)
        }
    };
    let opcode = cursor.read_u8().map_err(truncated)?;

    let u8_operand = |cursor: &mut Cursor<&[u8]>| cursor.read_u8().map_err(truncated);
    let u16_operand = |cursor: &mut Cursor<&[u8]>| cursor.read_u16::<BigEndian>().map_err(truncated);
    let i16_operand = |cursor: &mut Cursor<&[u8]>| cursor.read_i16::<BigEndian>().map_err(truncated);
    let i32_operand = |cursor: &mut Cursor<&[u8]>| cursor.read_i32::<BigEndian>().map_err(truncated);
    let constant = |cursor: &mut Cursor<&[u8]>| u16_operand(cursor).map(ConstantIndex);
    let class = |cursor: &mut Cursor<&[u8]>| constant(cursor).map(ClassConstantIndex);
    let field = |cursor: &mut Cursor<&[u8]>| constant(cursor).map(FieldRefConstantIndex);
    let method = |cursor: &mut Cursor<&[u8]>| constant(cursor).map(MethodRefConstantIndex);

    let insn: RawInstruction = match opcode {
        0x00 => Nop,
        0x01 => AConstNull,
        0x02 => IConstM1,
        0x03 => IConst0,
        0x04 => IConst1,
        0x05 => IConst2,
        0x06 => IConst3,
        0x07 => IConst4,
        0x08 => IConst5,
        0x09 => LConst0,
        0x0a => LConst1,
        0x0b => FConst0,
        0x0c => FConst1,
        0x0d => FConst2,
        0x0e => DConst0,
        0x0f => DConst1,
        0x10 => BiPush(cursor.read_i8().map_err(truncated)?),
        0x11 => SiPush(i16_operand(cursor)?),
        0x12 => Ldc(ConstantIndex(u8_operand(cursor)? as u16)),
        0x13 => Ldc(constant(cursor)?),
        0x14 => Ldc2(constant(cursor)?),
        0x15 => ILoad(u8_operand(cursor)? as u16),
        0x16 => LLoad(u8_operand(cursor)? as u16),
        0x17 => FLoad(u8_operand(cursor)? as u16),
        0x18 => DLoad(u8_operand(cursor)? as u16),
        0x19 => ALoad(u8_operand(cursor)? as u16),
        0x1a..=0x1d => ILoad((opcode - 0x1a) as u16),
        0x1e..=0x21 => LLoad((opcode - 0x1e) as u16),
        0x22..=0x25 => FLoad((opcode - 0x22) as u16),
        0x26..=0x29 => DLoad((opcode - 0x26) as u16),
        0x2a..=0x2d => ALoad((opcode - 0x2a) as u16),
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x36 => IStore(u8_operand(cursor)? as u16),
        0x37 => LStore(u8_operand(cursor)? as u16),
        0x38 => FStore(u8_operand(cursor)? as u16),
        0x39 => DStore(u8_operand(cursor)? as u16),
        0x3a => AStore(u8_operand(cursor)? as u16),
        0x3b..=0x3e => IStore((opcode - 0x3b) as u16),
        0x3f..=0x42 => LStore((opcode - 0x3f) as u16),
        0x43..=0x46 => FStore((opcode - 0x43) as u16),
        0x47..=0x4a => DStore((opcode - 0x47) as u16),
        0x4b..=0x4e => AStore((opcode - 0x4b) as u16),
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => ISh(ShiftType::Left),
        0x79 => LSh(ShiftType::Left),
        0x7a => ISh(ShiftType::ArithmeticRight),
        0x7b => LSh(ShiftType::ArithmeticRight),
        0x7c => ISh(ShiftType::LogicalRight),
        0x7d => LSh(ShiftType::LogicalRight),
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x84 => IInc(
            u8_operand(cursor)? as u16,
            cursor.read_i8().map_err(truncated)? as i16,
        ),
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmp(CompareMode::L),
        0x96 => FCmp(CompareMode::G),
        0x97 => DCmp(CompareMode::L),
        0x98 => DCmp(CompareMode::G),

        0x99..=0x9e => {
            let comparison = OrdComparison::from_opcode_offset(opcode - 0x99)
                .ok_or(Error::UnsupportedOpcode { opcode, offset })?;
            let lbl = target(i16_operand(cursor)? as i32)?;
            return Ok(Decoded::Branch(BranchInstruction::If(comparison, lbl)));
        }
        0x9f..=0xa4 => {
            let comparison = OrdComparison::from_opcode_offset(opcode - 0x9f)
                .ok_or(Error::UnsupportedOpcode { opcode, offset })?;
            let lbl = target(i16_operand(cursor)? as i32)?;
            return Ok(Decoded::Branch(BranchInstruction::IfICmp(comparison, lbl)));
        }
        0xa5 | 0xa6 | 0xc6 | 0xc7 => {
            let comparison = if opcode == 0xa5 || opcode == 0xc6 {
                EqComparison::EQ
            } else {
                EqComparison::NE
            };
            let lbl = target(i16_operand(cursor)? as i32)?;
            return Ok(Decoded::Branch(if opcode < 0xc0 {
                BranchInstruction::IfACmp(comparison, lbl)
            } else {
                BranchInstruction::IfNull(comparison, lbl)
            }));
        }
        0xa7 => {
            let lbl = target(i16_operand(cursor)? as i32)?;
            return Ok(Decoded::Branch(BranchInstruction::Goto(lbl)));
        }
        0xc8 => {
            let lbl = target(i32_operand(cursor)?)?;
            return Ok(Decoded::Branch(BranchInstruction::Goto(lbl)));
        }
        0xaa | 0xab => {
            while cursor.position() % 4 != 0 {
                u8_operand(cursor)?;
            }
            let default = target(i32_operand(cursor)?)?;
            let branch = if opcode == 0xaa {
                let low = i32_operand(cursor)?;
                let high = i32_operand(cursor)?;
                let count = (high as i64 - low as i64 + 1).max(0);
                let mut targets = vec![];
                for _ in 0..count {
                    targets.push(target(i32_operand(cursor)?)?);
                }
                BranchInstruction::TableSwitch {
                    default,
                    low,
                    targets,
                }
            } else {
                let count = i32_operand(cursor)?.max(0);
                let mut targets = vec![];
                for _ in 0..count {
                    let key = i32_operand(cursor)?;
                    targets.push((key, target(i32_operand(cursor)?)?));
                }
                BranchInstruction::LookupSwitch { default, targets }
            };
            return Ok(Decoded::Branch(branch));
        }
        0xac => return Ok(Decoded::Branch(BranchInstruction::IReturn)),
        0xad => return Ok(Decoded::Branch(BranchInstruction::LReturn)),
        0xae => return Ok(Decoded::Branch(BranchInstruction::FReturn)),
        0xaf => return Ok(Decoded::Branch(BranchInstruction::DReturn)),
        0xb0 => return Ok(Decoded::Branch(BranchInstruction::AReturn)),
        0xb1 => return Ok(Decoded::Branch(BranchInstruction::Return)),
        0xbf => return Ok(Decoded::Branch(BranchInstruction::AThrow)),

        0xb2 => GetStatic(field(cursor)?),
        0xb3 => PutStatic(field(cursor)?),
        0xb4 => GetField(field(cursor)?),
        0xb5 => PutField(field(cursor)?),
        0xb6 => Invoke(InvokeType::Virtual, method(cursor)?),
        0xb7 => Invoke(InvokeType::Special, method(cursor)?),
        0xb8 => Invoke(InvokeType::Static, method(cursor)?),
        0xb9 => {
            let method = method(cursor)?;
            let count = u8_operand(cursor)?;
            u8_operand(cursor)?;
            Invoke(InvokeType::Interface(count), method)
        }
        0xbb => New(class(cursor)?),
        0xbc => {
            let code = u8_operand(cursor)?;
            NewArray(array_type_from_code(code).ok_or_else(|| {
                Error::MalformedClassFile(format!("Bad `newarray` type {} at {}", code, offset))
            })?)
        }
        0xbd => ANewArray(class(cursor)?),
        0xbe => ArrayLength,
        0xc0 => CheckCast(class(cursor)?),
        0xc1 => InstanceOf(class(cursor)?),
        0xc2 => MonitorEnter,
        0xc3 => MonitorExit,
        0xc4 => {
            let modified = u8_operand(cursor)?;
            let idx = u16_operand(cursor)?;
            match modified {
                0x15 => ILoad(idx),
                0x16 => LLoad(idx),
                0x17 => FLoad(idx),
                0x18 => DLoad(idx),
                0x19 => ALoad(idx),
                0x36 => IStore(idx),
                0x37 => LStore(idx),
                0x38 => FStore(idx),
                0x39 => DStore(idx),
                0x3a => AStore(idx),
                0x84 => IInc(idx, i16_operand(cursor)?),
                _ => {
                    return Err(Error::UnsupportedOpcode {
                        opcode: modified,
                        offset,
                    })
                }
            }
        }
        0xc5 => {
            let class = class(cursor)?;
            MultiANewArray(class, u8_operand(cursor)?)
        }

        // `jsr`, `ret`, `invokedynamic`, `jsr_w`, and reserved opcodes
        _ => return Err(Error::UnsupportedOpcode { opcode, offset }),
    };
    Ok(Decoded::Instruction(insn))
}
