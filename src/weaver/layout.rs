//! Byte layout of packed components.
//!
//! Offsets are assigned in field declaration order, each field aligned to its own size. The
//! stride, the distance between two consecutive slots in the backing buffer, is the end of
//! the last field rounded up to the largest alignment, so every slot starts aligned. The
//! layout depends on nothing but the ordered field kinds: reordering fields is a breaking
//! layout change.

use crate::classfile::{descriptor::ValueKind, Field};

/// One packed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedField {
    /// Field name
    pub name: String,
    /// Value kind
    pub kind: ValueKind,
    /// Byte offset inside a slot
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

/// The layout of one packed component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedLayout {
    /// Bytes per slot
    pub stride: u32,
    /// Fields in declaration order
    pub fields: Vec<PackedField>,
}

impl PackedLayout {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&PackedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Compute the layout for the instance fields of a unit, in declaration order.
///
/// Static fields are skipped.
#[must_use]
pub fn compute(fields: &[Field]) -> PackedLayout {
    let mut offset = 0_u32;
    let mut alignment = 1_u32;
    let mut packed = Vec::with_capacity(fields.len());

    for field in fields.iter().filter(|f| !f.is_static) {
        let size = field.kind.packed_size();
        offset = align(offset, size);
        alignment = alignment.max(size);
        packed.push(PackedField {
            name: field.name.clone(),
            kind: field.kind.clone(),
            offset,
            size,
        });
        offset += size;
    }

    PackedLayout {
        stride: align(offset, alignment),
        fields: packed,
    }
}

fn align(offset: u32, alignment: u32) -> u32 {
    offset.div_ceil(alignment) * alignment
}
