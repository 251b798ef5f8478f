use crate::weaver::residue::Expr;
use crate::weaver::Error;

/// Values bound to the formals of a pointcut during one match attempt
///
/// There is one slot per formal. A slot is written at most once per attempt: resolution rejects
/// pointcuts that could bind a formal twice, so a second write means the matcher is broken.
#[derive(Clone, Debug)]
pub struct ExposedState<'g> {
    slots: Vec<Option<Expr<'g>>>,
}

impl<'g> ExposedState<'g> {
    pub fn new(size: usize) -> ExposedState<'g> {
        ExposedState {
            slots: vec![None; size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn bind(&mut self, formal: usize, value: Expr<'g>) -> Result<(), Error> {
        match self.slots.get_mut(formal) {
            Some(slot @ None) => {
                *slot = Some(value);
                Ok(())
            }
            Some(Some(_)) => Err(Error::Internal(format!("formal {} bound twice", formal))),
            None => Err(Error::Internal(format!(
                "formal {} is out of range ({} formals)",
                formal,
                self.slots.len()
            ))),
        }
    }

    pub fn get(&self, formal: usize) -> Option<&Expr<'g>> {
        self.slots.get(formal).and_then(Option::as_ref)
    }

    /// Forget every binding, ready for the next attempt
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn bound(&self) -> impl Iterator<Item = (usize, &Expr<'g>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|expr| (idx, expr)))
    }
}
