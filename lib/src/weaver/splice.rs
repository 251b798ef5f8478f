//! Splice advice into a shadow
//!
//! Advice at a shadow is applied from the lowest precedence (closest to the shadow) to the
//! highest. Each piece of advice wraps what is already there: `before` advice goes in front,
//! `after returning` advice goes behind, and the `after throwing` and `after` kinds protect
//! everything so far with a new exception handler. Nothing here changes a body directly: the
//! result is a batch of [`InstructionEdit`]s against the body as it was read.

use crate::jvm::class_graph::{ClassGraph, ClassId, FieldId, JavaLibrary, MethodId};
use crate::jvm::code::{
    BranchInstruction, Code, CodeItem, ExceptionHandler, Instruction, InvokeType, OrdComparison,
    SynLabel,
};
use crate::jvm::model::InstructionEdit;
use crate::jvm::{BinaryName, FieldType, RefType};
use crate::util::Width;
use crate::weaver::advice::{Advice, AdviceAction, AdviceKind, AdviceMatch};
use crate::weaver::render::{load_local, return_instruction, store_local, Renderer, VarLocations};
use crate::weaver::residue::{Slot, Test};
use crate::weaver::shadow::{Shadow, ShadowKind, ShadowPosition};
use crate::weaver::{Diagnostic, Error};

/// Advice applying to a shadow, with the result of matching it there
#[derive(Copy, Clone)]
pub struct Applied<'a, 'g> {
    pub advice: &'a Advice<'g>,
    pub matched: &'a AdviceMatch<'g>,
}

/// Head and tail built up around a shadow
struct Wrapped {
    head: Vec<CodeItem>,
    tail: Vec<CodeItem>,

    /// Innermost first
    handlers: Vec<ExceptionHandler>,
}

pub struct Splicer<'a, 'g> {
    class_graph: &'a ClassGraph<'g>,
    java: &'a JavaLibrary<'g>,
}

impl<'a, 'g> Splicer<'a, 'g> {
    pub fn new(class_graph: &'a ClassGraph<'g>, java: &'a JavaLibrary<'g>) -> Splicer<'a, 'g> {
        Splicer { class_graph, java }
    }

    /// Compute the edits applying advice to a shadow in `code`
    ///
    /// `applied` is ordered from the lowest precedence to the highest. `position` is where the
    /// shadow is in `code` (which only differs from the shadow's own position for classes
    /// getting a fresh static initializer). Labels and locals are allocated in `code`, but its
    /// items are left alone.
    pub fn splice(
        &self,
        code: &mut Code,
        shadow: &Shadow<'g>,
        position: ShadowPosition,
        applied: &[Applied<'_, 'g>],
        edits: &mut Vec<InstructionEdit>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), Error> {
        if applied.is_empty() {
            return Ok(());
        }
        match position {
            ShadowPosition::Instruction(index) => {
                self.splice_instruction(code, shadow, index, applied, edits)
            }
            ShadowPosition::Body { start } => {
                self.splice_body(code, shadow, start, applied, edits)
            }
            ShadowPosition::Handler(index) => {
                self.splice_handler(code, shadow, index, applied, edits, diagnostics)
            }
            ShadowPosition::NoInitializer => Err(Error::Internal(format!(
                "{} has no static initializer to splice into",
                shadow
            ))),
        }
    }

    /// Calls and field accesses
    fn splice_instruction(
        &self,
        code: &mut Code,
        shadow: &Shadow<'g>,
        index: usize,
        applied: &[Applied<'_, 'g>],
        edits: &mut Vec<InstructionEdit>,
    ) -> Result<(), Error> {
        let needed = needed_slots(applied);
        let mut locations = VarLocations::new();
        if shadow.this_type.is_some() {
            locations.insert(Slot::This, 0);
        }

        // Spill the operands of the instruction so that advice can read them
        let mut spill = vec![];
        let mut reload = vec![];
        let spills_operands = needed
            .iter()
            .any(|slot| matches!(slot, Slot::Target | Slot::Arg(_)));
        if spills_operands {
            let target = match (shadow.kind, shadow.target_type) {
                (ShadowKind::ConstructorCall, _) | (_, None) => None,
                (_, Some(target)) => Some(FieldType::Ref(target)),
            };
            let mut operands: Vec<(Slot, FieldType<ClassId<'g>>)> = vec![];
            if let Some(target) = target {
                operands.push((Slot::Target, target));
            }
            for (idx, typ) in shadow.arg_types.iter().enumerate() {
                operands.push((Slot::Arg(idx), *typ));
            }
            for (slot, typ) in operands.iter().rev() {
                let local = code.fresh_local(typ.width())?;
                spill.push(CodeItem::Instruction(store_local(typ, local)));
                locations.insert(*slot, local);
            }
            for (slot, typ) in &operands {
                if let Some(local) = locations.get(*slot) {
                    reload.push(CodeItem::Instruction(load_local(typ, local)));
                }
            }
        }

        // Capture the result
        let mut capture = vec![];
        if let (true, Some(returned)) = (needed.contains(&Slot::Returned), shadow.return_type) {
            let local = code.fresh_local(returned.width())?;
            let dup = if returned.width() == 2 {
                Instruction::Dup2
            } else {
                Instruction::Dup
            };
            capture.push(CodeItem::Instruction(dup));
            capture.push(CodeItem::Instruction(store_local(&returned, local)));
            locations.insert(Slot::Returned, local);
        }

        let wrapped = self.wrap(code, &locations, applied, vec![], capture)?;
        let mut head = spill;
        head.extend(wrapped.head);
        head.extend(reload);
        if !head.is_empty() {
            edits.push(InstructionEdit::Insert {
                position: index,
                items: head,
            });
        }
        if !wrapped.tail.is_empty() {
            edits.push(InstructionEdit::Insert {
                position: index + 1,
                items: wrapped.tail,
            });
        }
        if !wrapped.handlers.is_empty() {
            edits.push(InstructionEdit::AddHandlers {
                handlers: wrapped.handlers,
                innermost: true,
            });
        }
        Ok(())
    }

    /// Method executions, constructor executions, and static initialization
    fn splice_body(
        &self,
        code: &mut Code,
        shadow: &Shadow<'g>,
        start: usize,
        applied: &[Applied<'_, 'g>],
        edits: &mut Vec<InstructionEdit>,
    ) -> Result<(), Error> {
        let mut locations = VarLocations::new();
        let mut next_local = 0;
        if shadow.this_type.is_some() {
            locations.insert(Slot::This, 0);
            locations.insert(Slot::Target, 0);
            next_local = 1;
        }
        for (idx, typ) in shadow.arg_types.iter().enumerate() {
            locations.insert(Slot::Arg(idx), next_local);
            next_local += typ.width() as u16;
        }

        // After advice needs every way of completing normally to go through one exit
        let needs_exit = applied.iter().any(|applied| applied.advice.kind.is_after());
        let mut returned = None;
        let mut tail = vec![];
        if needs_exit {
            if let Some(typ) = shadow.return_type {
                let local = code.fresh_local(typ.width())?;
                locations.insert(Slot::Returned, local);
                returned = Some((typ, local));
            }
            let exit = code.fresh_label();
            for (idx, item) in code.items.iter().enumerate().skip(start) {
                if let CodeItem::Branch(branch) = item {
                    if branch.is_return() {
                        let mut items = vec![];
                        if let Some((typ, local)) = returned {
                            items.push(CodeItem::Instruction(store_local(&typ, local)));
                        }
                        items.push(CodeItem::Branch(BranchInstruction::Goto(exit)));
                        edits.push(InstructionEdit::Replace {
                            position: idx,
                            items,
                        });
                    }
                }
            }
            tail.push(CodeItem::Label(exit));
        }

        let mut wrapped = self.wrap(code, &locations, applied, vec![], tail)?;
        if needs_exit {
            if let Some((typ, local)) = returned {
                wrapped
                    .tail
                    .push(CodeItem::Instruction(load_local(&typ, local)));
            }
            wrapped.tail.push(CodeItem::Branch(return_instruction(
                returned.as_ref().map(|(typ, _)| typ),
            )));
            edits.push(InstructionEdit::Insert {
                position: code.items.len(),
                items: wrapped.tail,
            });
        }
        if !wrapped.head.is_empty() {
            edits.push(InstructionEdit::Insert {
                position: start,
                items: wrapped.head,
            });
        }
        if !wrapped.handlers.is_empty() {
            edits.push(InstructionEdit::AddHandlers {
                handlers: wrapped.handlers,
                innermost: false,
            });
        }
        Ok(())
    }

    /// Exception handlers (only `before` advice can run there)
    fn splice_handler(
        &self,
        code: &mut Code,
        shadow: &Shadow<'g>,
        index: usize,
        applied: &[Applied<'_, 'g>],
        edits: &mut Vec<InstructionEdit>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), Error> {
        let mut before = vec![];
        for applied in applied {
            if applied.advice.kind == AdviceKind::Before {
                before.push(*applied);
            } else {
                diagnostics.push(Diagnostic::lint(
                    format!(
                        "{} can't apply to exception handlers, skipped at {}",
                        applied.advice.describe(),
                        shadow
                    ),
                    shadow.location.clone(),
                ));
            }
        }
        if before.is_empty() {
            return Ok(());
        }

        let exception = code.fresh_local(1)?;
        let mut locations = VarLocations::new();
        locations.insert(Slot::Arg(0), exception);
        if shadow.this_type.is_some() {
            locations.insert(Slot::This, 0);
        }
        let mut head = vec![
            CodeItem::Instruction(Instruction::Dup),
            CodeItem::Instruction(Instruction::AStore(exception)),
        ];
        head.extend(self.wrap(code, &locations, &before, vec![], vec![])?.head);
        edits.push(InstructionEdit::Insert {
            position: index + 1,
            items: head,
        });
        Ok(())
    }

    fn wrap(
        &self,
        code: &mut Code,
        locations: &VarLocations,
        applied: &[Applied<'_, 'g>],
        mut head: Vec<CodeItem>,
        mut tail: Vec<CodeItem>,
    ) -> Result<Wrapped, Error> {
        let mut handlers = vec![];
        for Applied { advice, matched } in applied {
            match (&advice.action, advice.kind) {
                (AdviceAction::CflowEntry { counter, .. }, _) => {
                    let flag = match matched.test {
                        Test::Literal(true) => None,
                        _ => Some(code.fresh_local(1)?),
                    };
                    let mut enter =
                        self.enter_counter(code, locations, *counter, &matched.test, flag)?;
                    let normal = self.leave_counter(code, *counter, flag);
                    let exceptional = self.leave_counter(code, *counter, flag);
                    let labels = self.protect(code, None, &mut handlers)?;
                    enter.push(CodeItem::Label(labels.start));
                    enter.append(&mut head);
                    head = enter;
                    close(labels, &mut tail, normal, exceptional);
                }
                (_, AdviceKind::Before) => {
                    let mut call = self.invoke(code, locations, advice, matched)?;
                    call.append(&mut head);
                    head = call;
                }
                (_, AdviceKind::AfterReturning) => {
                    tail.extend(self.invoke(code, locations, advice, matched)?);
                }
                (_, AdviceKind::AfterThrowing) => {
                    let catch_type = matched.catch_type.map(|class| class.name.clone());
                    let labels = self.protect(code, catch_type, &mut handlers)?;
                    head.insert(0, CodeItem::Label(labels.start));

                    let mut with_thrown = locations.clone();
                    with_thrown.insert(Slot::Thrown, labels.exception);
                    let exceptional = self.invoke(code, &with_thrown, advice, matched)?;
                    close(labels, &mut tail, vec![], exceptional);
                }
                (_, AdviceKind::After) => {
                    let labels = self.protect(code, None, &mut handlers)?;
                    head.insert(0, CodeItem::Label(labels.start));
                    let normal = self.invoke(code, locations, advice, matched)?;
                    let exceptional = self.invoke(code, locations, advice, matched)?;
                    close(labels, &mut tail, normal, exceptional);
                }
            }
        }
        Ok(Wrapped {
            head,
            tail,
            handlers,
        })
    }

    /// Allocate the labels and local of a new handler protecting everything so far
    fn protect(
        &self,
        code: &mut Code,
        catch_type: Option<BinaryName>,
        handlers: &mut Vec<ExceptionHandler>,
    ) -> Result<Protected, Error> {
        let labels = Protected {
            start: code.fresh_label(),
            end: code.fresh_label(),
            handler: code.fresh_label(),
            resume: code.fresh_label(),
            exception: code.fresh_local(1)?,
        };
        handlers.push(ExceptionHandler {
            start: labels.start,
            end: labels.end,
            handler: labels.handler,
            catch_type,
        });
        Ok(labels)
    }

    /// Call the advice method, guarded by the residual test
    fn invoke(
        &self,
        code: &mut Code,
        locations: &VarLocations,
        advice: &Advice<'g>,
        matched: &AdviceMatch<'g>,
    ) -> Result<Vec<CodeItem>, Error> {
        let (method, aspect_of) = match &advice.action {
            AdviceAction::Invoke {
                method, aspect_of, ..
            } => (*method, *aspect_of),
            AdviceAction::CflowEntry { .. } => {
                return Err(Error::Internal(String::from("cflow entry isn't a call")))
            }
        };
        let mut renderer = Renderer::new(self.class_graph, self.java, locations, code);
        let mut call = vec![];
        if let Some(aspect_of) = aspect_of {
            call.push(invoke_instruction(aspect_of));
        }
        if matched.args.len() != method.descriptor.parameters.len() {
            return Err(Error::Internal(format!(
                "{} takes {} arguments but {} were matched",
                advice.describe(),
                method.descriptor.parameters.len(),
                matched.args.len()
            )));
        }
        for (arg, param) in matched.args.iter().zip(&method.descriptor.parameters) {
            let param = self.class_graph.resolve_field_type(param);
            call.extend(renderer.render_expr(arg, &param)?);
        }
        call.push(invoke_instruction(method));
        renderer.guard(&matched.test, call)
    }

    /// Increment the counter (if the test holds), remembering in `flag` whether it was
    fn enter_counter(
        &self,
        code: &mut Code,
        locations: &VarLocations,
        counter: FieldId<'g>,
        test: &Test<'g>,
        flag: Option<u16>,
    ) -> Result<Vec<CodeItem>, Error> {
        let mut inc = self.counter_call(counter, self.java.cflow_counter.inc);
        let flag = match flag {
            None => return Ok(inc),
            Some(flag) => flag,
        };
        inc.push(CodeItem::Instruction(Instruction::IConst1));
        inc.push(CodeItem::Instruction(Instruction::IStore(flag)));
        let mut items = vec![
            CodeItem::Instruction(Instruction::IConst0),
            CodeItem::Instruction(Instruction::IStore(flag)),
        ];
        let mut renderer = Renderer::new(self.class_graph, self.java, locations, code);
        items.extend(renderer.guard(test, inc)?);
        Ok(items)
    }

    /// Decrement the counter (if it was incremented)
    fn leave_counter(
        &self,
        code: &mut Code,
        counter: FieldId<'g>,
        flag: Option<u16>,
    ) -> Vec<CodeItem> {
        let dec = self.counter_call(counter, self.java.cflow_counter.dec);
        let flag = match flag {
            None => return dec,
            Some(flag) => flag,
        };
        let skip = code.fresh_label();
        let mut items = vec![
            CodeItem::Instruction(Instruction::ILoad(flag)),
            CodeItem::Branch(BranchInstruction::If(OrdComparison::EQ, skip)),
        ];
        items.extend(dec);
        items.push(CodeItem::Label(skip));
        items
    }

    fn counter_call(&self, counter: FieldId<'g>, operation: MethodId<'g>) -> Vec<CodeItem> {
        vec![
            CodeItem::Instruction(Instruction::GetStatic(counter.as_ref())),
            invoke_instruction(operation),
        ]
    }

    /// Instructions creating the counters, for the start of the aspect's static initializer
    pub fn counter_initializers(&self, counters: &[FieldId<'g>]) -> Vec<CodeItem> {
        let class = RefType::Object(self.java.cflow_counter.class.name.clone());
        let init = self.java.cflow_counter.init;
        counters
            .iter()
            .flat_map(|counter| {
                vec![
                    CodeItem::Instruction(Instruction::New(class.clone())),
                    CodeItem::Instruction(Instruction::Dup),
                    CodeItem::Instruction(Instruction::Invoke(InvokeType::Special, init.as_ref())),
                    CodeItem::Instruction(Instruction::PutStatic(counter.as_ref())),
                ]
            })
            .collect()
    }
}

/// Labels of a handler protecting part of a shadow
struct Protected {
    start: SynLabel,
    end: SynLabel,
    handler: SynLabel,
    resume: SynLabel,

    /// Local holding the exception in the handler
    exception: u16,
}

/// End the protected range: run `normal` when it completes normally, otherwise run `exceptional`
/// and rethrow
fn close(
    labels: Protected,
    tail: &mut Vec<CodeItem>,
    normal: Vec<CodeItem>,
    exceptional: Vec<CodeItem>,
) {
    tail.push(CodeItem::Label(labels.end));
    tail.extend(normal);
    tail.push(CodeItem::Branch(BranchInstruction::Goto(labels.resume)));
    tail.push(CodeItem::Label(labels.handler));
    tail.push(CodeItem::Instruction(Instruction::AStore(labels.exception)));
    tail.extend(exceptional);
    tail.push(CodeItem::Instruction(Instruction::ALoad(labels.exception)));
    tail.push(CodeItem::Branch(BranchInstruction::AThrow));
    tail.push(CodeItem::Label(labels.resume));
}

fn invoke_instruction(method: MethodId<'_>) -> CodeItem {
    CodeItem::Instruction(Instruction::Invoke(
        method.infer_invoke_type(),
        method.as_ref(),
    ))
}

/// Slots read by any of the advice
fn needed_slots(applied: &[Applied<'_, '_>]) -> Vec<Slot> {
    let mut slots = vec![];
    for Applied { matched, .. } in applied {
        slots.extend(matched.test.slots());
        for arg in &matched.args {
            arg.slots(&mut slots);
        }
    }
    slots
}
