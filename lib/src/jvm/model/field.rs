use crate::jvm::class_file::{ConstantsPool, Member};
use crate::jvm::class_graph::FieldId;
use crate::jvm::descriptors::RenderDescriptor;
use crate::jvm::names::Name;
use crate::jvm::Error;

/// Field added to a class by the weaver
///
/// Fields read from a class file are never changed, so they stay in their raw form.
#[derive(Clone)]
pub struct Field<'g> {
    /// The current field
    pub id: FieldId<'g>,
}

impl<'g> Field<'g> {
    pub fn new(id: FieldId<'g>) -> Field<'g> {
        Field { id }
    }

    /// Serialize the field
    pub fn serialize_field(self, constants_pool: &mut ConstantsPool) -> Result<Member, Error> {
        Ok(Member {
            access_flags: self.id.access_flags.bits(),
            name_index: constants_pool.get_utf8(self.id.name.as_str())?,
            descriptor_index: constants_pool.get_utf8(self.id.descriptor.render())?,
            attributes: vec![],
        })
    }
}
