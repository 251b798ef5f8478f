//! Lower residual tests to bytecode
//!
//! Tests are rendered into branching fragments given three labels: where to go when the test
//! holds, where to go when it doesn't, and which of those (if either) immediately follows the
//! fragment. Composite tests render their right operand first so that the left operand knows
//! where the right one starts, and a leaf only emits the jumps that can't be replaced by falling
//! through.

use crate::jvm::class_graph::{Assignable, ClassGraph, ClassId, JavaLibrary};
use crate::jvm::code::{
    BranchInstruction, Code, CodeItem, EqComparison, Instruction, InvokeType, OrdComparison,
    SynLabel,
};
use crate::jvm::{
    BaseType, ConstantData, FieldType, MethodDescriptor, MethodRef, RefType, UnqualifiedName,
};
use crate::weaver::residue::{Expr, Slot, Test};
use crate::weaver::Error;
use std::collections::HashMap;

/// Local variables holding the values of slots at a shadow
#[derive(Clone, Debug, Default)]
pub struct VarLocations {
    locals: HashMap<Slot, u16>,
}

impl VarLocations {
    pub fn new() -> VarLocations {
        VarLocations::default()
    }

    pub fn insert(&mut self, slot: Slot, local: u16) {
        self.locals.insert(slot, local);
    }

    pub fn get(&self, slot: Slot) -> Option<u16> {
        self.locals.get(&slot).copied()
    }
}

pub struct Renderer<'a, 'g> {
    class_graph: &'a ClassGraph<'g>,
    java: &'a JavaLibrary<'g>,
    locations: &'a VarLocations,

    /// Body the fragments are destined for (fresh labels come from here)
    code: &'a mut Code,
}

impl<'a, 'g> Renderer<'a, 'g> {
    pub fn new(
        class_graph: &'a ClassGraph<'g>,
        java: &'a JavaLibrary<'g>,
        locations: &'a VarLocations,
        code: &'a mut Code,
    ) -> Renderer<'a, 'g> {
        Renderer {
            class_graph,
            java,
            locations,
            code,
        }
    }

    /// Run `body` only when `test` holds
    ///
    /// A test that is literally true leaves the body unguarded.
    pub fn guard(&mut self, test: &Test<'g>, body: Vec<CodeItem>) -> Result<Vec<CodeItem>, Error> {
        if test == &Test::Literal(true) {
            return Ok(body);
        }
        let run = self.code.fresh_label();
        let skip = self.code.fresh_label();
        let mut items = self.render_test(test, run, skip, Some(run))?;
        items.push(CodeItem::Label(run));
        items.extend(body);
        items.push(CodeItem::Label(skip));
        Ok(items)
    }

    /// Render a test into a fragment that jumps to `on_true` or `on_false`
    ///
    /// When `fallthrough` is one of the two targets, the fragment may reach it by running off its
    /// end instead of jumping.
    pub fn render_test(
        &mut self,
        test: &Test<'g>,
        on_true: SynLabel,
        on_false: SynLabel,
        fallthrough: Option<SynLabel>,
    ) -> Result<Vec<CodeItem>, Error> {
        match test {
            Test::Literal(value) => {
                let target = if *value { on_true } else { on_false };
                Ok(self.jump(target, fallthrough))
            }
            Test::And(left, right) => {
                let right_items = self.render_test(right, on_true, on_false, fallthrough)?;
                let right_start = self.code.fresh_label();
                let mut items =
                    self.render_test(left, right_start, on_false, Some(right_start))?;
                items.push(CodeItem::Label(right_start));
                items.extend(right_items);
                Ok(items)
            }
            Test::Or(left, right) => {
                let right_items = self.render_test(right, on_true, on_false, fallthrough)?;
                let right_start = self.code.fresh_label();
                let mut items = self.render_test(left, on_true, right_start, Some(right_start))?;
                items.push(CodeItem::Label(right_start));
                items.extend(right_items);
                Ok(items)
            }
            Test::Not(inner) => self.render_test(inner, on_false, on_true, fallthrough),
            Test::InstanceOf { value, typ } => {
                if on_true == on_false {
                    return Ok(self.jump(on_true, fallthrough));
                }
                let mut items = self.render_value(value)?;
                let class = typ.map(|class| class.name.clone());
                items.push(CodeItem::Instruction(Instruction::InstanceOf(class)));
                items.extend(self.branch(on_true, on_false, fallthrough));
                Ok(items)
            }
            Test::HasAnnotation { value, annotation } => {
                if on_true == on_false {
                    return Ok(self.jump(on_true, fallthrough));
                }
                let receiver = self.render_value(value)?;
                let mut items = receiver.clone();
                items.push(CodeItem::Branch(BranchInstruction::IfNull(
                    EqComparison::EQ,
                    on_false,
                )));
                items.extend(receiver);
                items.push(CodeItem::Instruction(Instruction::Invoke(
                    InvokeType::Virtual,
                    self.java.object_get_class.as_ref(),
                )));
                items.push(CodeItem::Instruction(Instruction::Ldc(ConstantData::Class(
                    RefType::Object(annotation.name.clone()),
                ))));
                items.push(CodeItem::Instruction(Instruction::Invoke(
                    InvokeType::Virtual,
                    self.java.class_is_annotation_present.as_ref(),
                )));
                items.extend(self.branch(on_true, on_false, fallthrough));
                Ok(items)
            }
            Test::Expr(expr) => {
                let mut items = self.render_expr(expr, &FieldType::boolean())?;
                if on_true == on_false {
                    // Calls still happen, for their effects
                    if !matches!(expr, Expr::Call { .. }) {
                        return Ok(self.jump(on_true, fallthrough));
                    }
                    items.push(CodeItem::Instruction(Instruction::Pop));
                    items.extend(self.jump(on_true, fallthrough));
                } else {
                    items.extend(self.branch(on_true, on_false, fallthrough));
                }
                Ok(items)
            }
        }
    }

    /// Unconditional jump, unless the target is reached by falling through
    fn jump(&self, target: SynLabel, fallthrough: Option<SynLabel>) -> Vec<CodeItem> {
        if Some(target) == fallthrough {
            vec![]
        } else {
            vec![CodeItem::Branch(BranchInstruction::Goto(target))]
        }
    }

    /// Branch on the `int` boolean on top of the stack
    fn branch(
        &self,
        on_true: SynLabel,
        on_false: SynLabel,
        fallthrough: Option<SynLabel>,
    ) -> Vec<CodeItem> {
        if Some(on_true) == fallthrough {
            vec![CodeItem::Branch(BranchInstruction::If(
                OrdComparison::EQ,
                on_false,
            ))]
        } else if Some(on_false) == fallthrough {
            vec![CodeItem::Branch(BranchInstruction::If(
                OrdComparison::NE,
                on_true,
            ))]
        } else {
            vec![
                CodeItem::Branch(BranchInstruction::If(OrdComparison::NE, on_true)),
                CodeItem::Branch(BranchInstruction::Goto(on_false)),
            ]
        }
    }

    /// Render an expression with its natural type
    fn render_value(&mut self, expr: &Expr<'g>) -> Result<Vec<CodeItem>, Error> {
        match expr.typ(self.class_graph) {
            Some(typ) => self.render_expr(expr, &typ),
            None => Err(Error::Internal(format!("`{}` produces no value", expr))),
        }
    }

    /// Render an expression, converting the value it produces to `desired`
    pub fn render_expr(
        &mut self,
        expr: &Expr<'g>,
        desired: &FieldType<ClassId<'g>>,
    ) -> Result<Vec<CodeItem>, Error> {
        let natural = expr
            .typ(self.class_graph)
            .ok_or_else(|| Error::Internal(format!("`{}` produces no value", expr)))?;

        let mut items = vec![];
        match expr {
            Expr::Var(var) => {
                let local = self.locations.get(var.slot).ok_or_else(|| {
                    Error::Internal(format!("no local variable holds `{}`", var.slot))
                })?;
                items.push(CodeItem::Instruction(load_local(&var.typ, local)));
            }
            Expr::FieldGet { field, receiver } => {
                let field_ref = field.as_ref();
                match receiver {
                    Some(receiver) => {
                        let receiver_type = FieldType::object(field.class);
                        items.extend(self.render_expr(receiver, &receiver_type)?);
                        items.push(CodeItem::Instruction(Instruction::GetField(field_ref)));
                    }
                    None => items.push(CodeItem::Instruction(Instruction::GetStatic(field_ref))),
                }
            }
            Expr::Call {
                method,
                receiver,
                args,
            } => {
                if let Some(receiver) = receiver {
                    let receiver_type = FieldType::object(method.class);
                    items.extend(self.render_expr(receiver, &receiver_type)?);
                }
                if args.len() != method.descriptor.parameters.len() {
                    return Err(Error::Internal(format!(
                        "{:?} called with {} arguments",
                        method,
                        args.len()
                    )));
                }
                for (arg, param) in args.iter().zip(&method.descriptor.parameters) {
                    let param = self.class_graph.resolve_field_type(param);
                    items.extend(self.render_expr(arg, &param)?);
                }
                items.push(CodeItem::Instruction(Instruction::Invoke(
                    method.infer_invoke_type(),
                    method.as_ref(),
                )));
            }
            Expr::ClassConstant(class) => {
                items.push(CodeItem::Instruction(Instruction::Ldc(ConstantData::Class(
                    RefType::Object(class.name.clone()),
                ))));
            }
        }
        items.extend(self.coerce(&natural, desired)?);
        Ok(items)
    }

    /// Instructions converting a value of type `from` on the stack into one of type `to`
    pub fn coerce(
        &self,
        from: &FieldType<ClassId<'g>>,
        to: &FieldType<ClassId<'g>>,
    ) -> Result<Vec<CodeItem>, Error> {
        let insns = match (from, to) {
            _ if from == to => vec![],
            (FieldType::Base(from), FieldType::Base(BaseType::Int)) if from.is_int_like() => vec![],
            (FieldType::Base(base), FieldType::Ref(to_ref)) => {
                let boxed = self.java.boxed(*base);
                let mut insns = vec![Instruction::Invoke(InvokeType::Static, box_method(*base))];
                if RefType::Object(boxed).is_assignable(to_ref) != Some(true) {
                    insns.push(Instruction::CheckCast(to_ref.map(|c| c.name.clone())));
                }
                insns
            }
            (FieldType::Ref(from_ref), FieldType::Base(base)) => {
                let boxed = self.java.boxed(*base);
                let mut insns = vec![];
                if from_ref.is_assignable(&RefType::Object(boxed)) != Some(true) {
                    insns.push(Instruction::CheckCast(RefType::Object(base.boxed_class())));
                }
                insns.push(Instruction::Invoke(InvokeType::Virtual, unbox_method(*base)));
                insns
            }
            (FieldType::Ref(from_ref), FieldType::Ref(to_ref)) => {
                if from_ref.is_assignable(to_ref) == Some(true) {
                    vec![]
                } else {
                    vec![Instruction::CheckCast(to_ref.map(|c| c.name.clone()))]
                }
            }
            (FieldType::Base(from), FieldType::Base(to)) => {
                return Err(Error::Internal(format!(
                    "can't convert {} to {}",
                    from.java_name(),
                    to.java_name()
                )))
            }
        };
        Ok(insns.into_iter().map(CodeItem::Instruction).collect())
    }
}

/// `Integer.valueOf(int)` and friends
pub fn box_method(base: BaseType) -> MethodRef {
    let boxed = base.boxed_class();
    MethodRef {
        class: RefType::Object(boxed.clone()),
        name: UnqualifiedName::VALUEOF,
        descriptor: MethodDescriptor {
            parameters: vec![FieldType::Base(base)],
            return_type: Some(FieldType::object(boxed)),
        },
        is_interface: false,
    }
}

/// `Integer.intValue()` and friends
pub fn unbox_method(base: BaseType) -> MethodRef {
    let name = match base {
        BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
        BaseType::Byte => UnqualifiedName::BYTEVALUE,
        BaseType::Char => UnqualifiedName::CHARVALUE,
        BaseType::Short => UnqualifiedName::SHORTVALUE,
        BaseType::Int => UnqualifiedName::INTVALUE,
        BaseType::Long => UnqualifiedName::LONGVALUE,
        BaseType::Float => UnqualifiedName::FLOATVALUE,
        BaseType::Double => UnqualifiedName::DOUBLEVALUE,
    };
    MethodRef {
        class: RefType::Object(base.boxed_class()),
        name,
        descriptor: MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::Base(base)),
        },
        is_interface: false,
    }
}

pub fn load_local<C>(typ: &FieldType<C>, local: u16) -> Instruction {
    match typ {
        FieldType::Base(BaseType::Long) => Instruction::LLoad(local),
        FieldType::Base(BaseType::Float) => Instruction::FLoad(local),
        FieldType::Base(BaseType::Double) => Instruction::DLoad(local),
        FieldType::Base(_) => Instruction::ILoad(local),
        FieldType::Ref(_) => Instruction::ALoad(local),
    }
}

pub fn store_local<C>(typ: &FieldType<C>, local: u16) -> Instruction {
    match typ {
        FieldType::Base(BaseType::Long) => Instruction::LStore(local),
        FieldType::Base(BaseType::Float) => Instruction::FStore(local),
        FieldType::Base(BaseType::Double) => Instruction::DStore(local),
        FieldType::Base(_) => Instruction::IStore(local),
        FieldType::Ref(_) => Instruction::AStore(local),
    }
}

/// Return instruction for a method with this return type
pub fn return_instruction<C>(typ: Option<&FieldType<C>>) -> BranchInstruction<SynLabel> {
    match typ {
        None => BranchInstruction::Return,
        Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
        Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
        Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
        Some(FieldType::Base(_)) => BranchInstruction::IReturn,
        Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
    }
}
