use crate::jvm::class_file::{self, ConstantsPool, Member};
use crate::jvm::class_graph::MethodId;
use crate::jvm::code::{Code, CodeItem, ExceptionHandler};
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::names::Name;
use crate::jvm::Error;

/// Semantic representation of a method
#[derive(Clone)]
pub struct Method<'g> {
    /// The current method
    pub id: MethodId<'g>,

    /// Method code implementation (`None` for abstract and native methods)
    pub code_impl: Option<Code>,

    /// Index of the method in the class file it was read from (`None` for methods added by the
    /// weaver)
    pub(super) origin: Option<usize>,

    /// Whether the body needs to be encoded again
    pub(super) edited: bool,
}

/// Change to a method body
///
/// Positions are indices into [`Code::items`] as they were before any edit of the batch was
/// applied, which lets edits be computed against a single snapshot of the body.
#[derive(Debug, Clone)]
pub enum InstructionEdit {
    /// Insert items before the item at `position` (`position` may be the length of the body)
    ///
    /// Insertions at the same position end up in the order they appear in the batch.
    Insert {
        position: usize,
        items: Vec<CodeItem>,
    },

    /// Replace the item at `position` with `items`
    ///
    /// Insertions at the same position go in front of the replacement.
    Replace {
        position: usize,
        items: Vec<CodeItem>,
    },

    /// Add exception handlers, keeping their relative order
    ///
    /// Innermost handlers go in front of all existing handlers, others go after them.
    AddHandlers {
        handlers: Vec<ExceptionHandler>,
        innermost: bool,
    },
}

impl<'g> Method<'g> {
    /// Create a new method
    pub fn new(id: MethodId<'g>, code_impl: Option<Code>) -> Method<'g> {
        Method {
            id,
            code_impl,
            origin: None,
            edited: true,
        }
    }

    /// Whether the method was added or edited since being read
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Mutable access to the body, for allocating labels and locals ahead of a patch
    pub fn code_mut(&mut self) -> Result<&mut Code, Error> {
        let id = self.id;
        self.code_impl
            .as_mut()
            .ok_or_else(|| Error::MissingMember(format!("body of {:?}", id)))
    }

    /// Apply a batch of edits to the body
    pub fn patch(&mut self, edits: Vec<InstructionEdit>) -> Result<(), Error> {
        let code = self.code_mut()?;
        let len = code.items.len();

        // `(position, replaces, items)`
        let mut splices: Vec<(usize, bool, Vec<CodeItem>)> = vec![];
        let mut front_handlers = vec![];
        let mut back_handlers = vec![];
        for edit in edits {
            match edit {
                InstructionEdit::Insert { position, items } => {
                    if position > len {
                        let msg = format!("insert at {} in a body of {} items", position, len);
                        return Err(Error::InvalidEdit(msg));
                    }
                    splices.push((position, false, items));
                }
                InstructionEdit::Replace { position, items } => {
                    if position >= len {
                        let msg = format!("replace at {} in a body of {} items", position, len);
                        return Err(Error::InvalidEdit(msg));
                    }
                    if splices.iter().any(|(p, replaces, _)| *replaces && *p == position) {
                        let msg = format!("item {} replaced twice", position);
                        return Err(Error::InvalidEdit(msg));
                    }
                    splices.push((position, true, items));
                }
                InstructionEdit::AddHandlers {
                    handlers,
                    innermost: true,
                } => front_handlers.extend(handlers),
                InstructionEdit::AddHandlers {
                    handlers,
                    innermost: false,
                } => back_handlers.extend(handlers),
            }
        }

        // Back to front so that earlier positions stay valid. The sort is stable, and reversing
        // it makes later insertions at a shared position go in first (ending up further back).
        // A replacement sorts after the insertions at its position, so it is applied first.
        splices.sort_by_key(|(position, replaces, _)| (*position, *replaces));
        for (position, replaces, items) in splices.into_iter().rev() {
            let end = if replaces { position + 1 } else { position };
            code.items.splice(position..end, items);
        }

        front_handlers.append(&mut code.exception_table);
        front_handlers.extend(back_handlers);
        code.exception_table = front_handlers;

        // Catch dangling labels now rather than at serialization
        code.label_positions()?;
        self.edited = true;
        Ok(())
    }

    /// Serialize the method
    ///
    /// Methods which were read in and not edited are passed through exactly as they were.
    /// Otherwise the `Code` attribute is regenerated and every other attribute is kept.
    pub fn serialize_method(
        self,
        originals: &[Member],
        constants_pool: &mut ConstantsPool,
    ) -> Result<Member, Error> {
        let original = match self.origin {
            Some(index) => Some(originals.get(index).ok_or_else(|| {
                Error::MalformedClassFile(format!("no method at index {}", index))
            })?),
            None => None,
        };
        if let (Some(original), false) = (original, self.edited) {
            return Ok(original.clone());
        }

        let (name_index, descriptor_index, mut attributes) = match original {
            Some(original) => (
                original.name_index,
                original.descriptor_index,
                original
                    .attributes
                    .iter()
                    .filter(|attribute| {
                        constants_pool.utf8(attribute.name_index).ok()
                            != Some(<class_file::Code as class_file::AttributeLike>::NAME)
                    })
                    .cloned()
                    .collect(),
            ),
            None => (
                constants_pool.get_utf8(self.id.name.as_str())?,
                constants_pool.get_utf8(self.id.descriptor.render())?,
                vec![],
            ),
        };

        // `Code` attribute
        if let Some(code) = self.code_impl {
            let code = code.encode(constants_pool)?;
            attributes.push(constants_pool.get_attribute(code)?);
        }

        Ok(Member {
            access_flags: self.id.access_flags.bits(),
            name_index,
            descriptor_index,
            attributes,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::{ClassGraph, ClassGraphArenas, JavaLibrary, MethodData};
    use crate::jvm::code::{BranchInstruction, Instruction};
    use crate::jvm::{MethodAccessFlags, MethodDescriptor, UnqualifiedName};

    fn body(code: &Code) -> Vec<CodeItem> {
        code.items.clone()
    }

    #[test]
    fn inserts_keep_batch_order() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let id = graph.add_method(MethodData {
            class: java.object,
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC,
            annotations: vec![],
        });

        let mut code = Code::new(1);
        code.items.push(CodeItem::Instruction(Instruction::Nop));
        code.items.push(CodeItem::Branch(BranchInstruction::Return));
        let mut method = Method::new(id, Some(code));

        method.patch(vec![
            InstructionEdit::Insert {
                position: 1,
                items: vec![CodeItem::Instruction(Instruction::IConst0)],
            },
            InstructionEdit::Insert {
                position: 1,
                items: vec![CodeItem::Instruction(Instruction::Pop)],
            },
            InstructionEdit::Insert {
                position: 0,
                items: vec![CodeItem::LineNumber(3)],
            },
        ])?;

        assert_eq!(
            body(method.code_impl.as_ref().unwrap()),
            vec![
                CodeItem::LineNumber(3),
                CodeItem::Instruction(Instruction::Nop),
                CodeItem::Instruction(Instruction::IConst0),
                CodeItem::Instruction(Instruction::Pop),
                CodeItem::Branch(BranchInstruction::Return),
            ]
        );
        assert!(method.is_edited());
        Ok(())
    }

    #[test]
    fn replace_after_inserts() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);

        let mut code = Code::new(1);
        code.items.push(CodeItem::Instruction(Instruction::Nop));
        code.items.push(CodeItem::Branch(BranchInstruction::Return));
        let mut method = Method::new(java.object_init, Some(code));

        method.patch(vec![
            InstructionEdit::Replace {
                position: 1,
                items: vec![
                    CodeItem::Instruction(Instruction::Pop),
                    CodeItem::Branch(BranchInstruction::Return),
                ],
            },
            InstructionEdit::Insert {
                position: 1,
                items: vec![CodeItem::Instruction(Instruction::IConst0)],
            },
            InstructionEdit::Replace {
                position: 0,
                items: vec![],
            },
        ])?;

        assert_eq!(
            body(method.code_impl.as_ref().unwrap()),
            vec![
                CodeItem::Instruction(Instruction::IConst0),
                CodeItem::Instruction(Instruction::Pop),
                CodeItem::Branch(BranchInstruction::Return),
            ]
        );

        let twice = method.patch(vec![
            InstructionEdit::Replace {
                position: 0,
                items: vec![],
            },
            InstructionEdit::Replace {
                position: 0,
                items: vec![],
            },
        ]);
        assert!(matches!(twice, Err(Error::InvalidEdit(_))));
        Ok(())
    }

    #[test]
    fn handler_placement() -> Result<(), Error> {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let id = graph.add_method(MethodData {
            class: java.object,
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC,
            annotations: vec![],
        });

        let mut code = Code::new(1);
        let labels: Vec<_> = (0..3).map(|_| code.fresh_label()).collect();
        code.items = labels.iter().map(|l| CodeItem::Label(*l)).collect();
        let handler = |catch: Option<&str>| ExceptionHandler {
            start: labels[0],
            end: labels[1],
            handler: labels[2],
            catch_type: catch.map(|c| crate::jvm::BinaryName::from_string(c.to_owned()).unwrap()),
        };
        code.exception_table.push(handler(Some("a/Existing")));
        let mut method = Method::new(id, Some(code));

        method.patch(vec![
            InstructionEdit::AddHandlers {
                handlers: vec![handler(Some("a/Outer"))],
                innermost: false,
            },
            InstructionEdit::AddHandlers {
                handlers: vec![handler(Some("a/Inner1")), handler(Some("a/Inner2"))],
                innermost: true,
            },
        ])?;

        let order: Vec<String> = method
            .code_impl
            .unwrap()
            .exception_table
            .iter()
            .map(|h| h.catch_type.as_ref().unwrap().as_str().to_owned())
            .collect();
        assert_eq!(order, vec!["a/Inner1", "a/Inner2", "a/Existing", "a/Outer"]);
        Ok(())
    }

    #[test]
    fn out_of_range_insert() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = JavaLibrary::add_to_graph(&graph);
        let mut method = Method::new(java.object_init, Some(Code::new(1)));
        let result = method.patch(vec![InstructionEdit::Insert {
            position: 2,
            items: vec![],
        }]);
        assert!(matches!(result, Err(Error::InvalidEdit(_))));
    }
}
