//! The packed strategy: instance fields move into a shared, slot-indexed byte buffer.
//!
//! After weaving, a packed unit `T` looks like this (in Java terms):
//!
//! ```text
//! public int $index;                          // slot of this instance
//! private static java.nio.ByteBuffer $data;   // backing buffer shared by all instances
//! public static final int $stride = N;        // bytes per slot
//!
//! static { $data = ByteBuffer.allocateDirect($stride * 64); }
//!
//! private static void $ensureCapacity(int slot) { ... }   // grow and copy on demand
//!
//! private float $get_x() {
//!     $ensureCapacity($index);
//!     return $data.getFloat($index * $stride + 0);
//! }
//! private void $set_x(float v) {
//!     $ensureCapacity($index);
//!     $data.putFloat($index * $stride + 0, v);
//! }
//! ```
//!
//! A unit that already has a static initializer keeps it untouched. Its buffer is then
//! allocated by the first accessor call instead.
//!
//! Every `getfield`/`putfield` of a packed field inside the unit's own methods becomes an
//! `invokespecial` of the matching accessor. Both instructions are three bytes long and
//! have the same operand stack effect, so the rest of each method body is left as it was.
//!
//! A field whose type is itself a packed component is stored as that component's slot
//! index. Its getter hands out a per-instance flyweight (`$fw_<name>`) that is created on
//! first use and repositioned to the stored slot on every read.
//!
//! `$index` is public because flyweights of other packed units reposition it.

use crate::{
    classfile::{
        attribute::{Attribute, AttributeData, CONSTANT_VALUE},
        bytecode::Bytecode,
        descriptor::ValueKind,
        member::{FieldAccess, MethodAccess},
        opcodes::{
            DUP, GETFIELD, GETSTATIC, IADD, IFNONNULL, IF_ICMPGE, ILOAD_0, ILOAD_1, IMUL,
            INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL, ISTORE_1, NEW, POP, PUTFIELD, PUTSTATIC,
        },
        ClassFile,
    },
    file::io::write_be,
    weaver::{
        index::TypeIndex,
        layout::{self, PackedField, PackedLayout},
        transform::{add_field, add_method, reparent, rewrite_sites},
        COMPONENT, PACKED_COMPONENT,
    },
    Error, Result,
};

/// Instance field holding the slot index.
pub const INDEX_FIELD: &str = "$index";
/// Static field holding the shared backing buffer.
pub const DATA_FIELD: &str = "$data";
/// Static constant holding the bytes per slot.
pub const STRIDE_FIELD: &str = "$stride";
/// Static method growing `$data` until a slot fits.
pub const CAPACITY_METHOD: &str = "$ensureCapacity";
/// Descriptor of [`CAPACITY_METHOD`].
pub const CAPACITY_DESCRIPTOR: &str = "(I)V";
/// Slots allocated by the static initializer.
pub const INITIAL_SLOTS: i32 = 64;

const STATIC_INIT: &str = "<clinit>";
const BUFFER: &str = "java/nio/Buffer";
const BYTE_BUFFER: &str = "java/nio/ByteBuffer";
const BYTE_BUFFER_DESCRIPTOR: &str = "Ljava/nio/ByteBuffer;";
const ALLOCATE: &str = "allocateDirect";
const ALLOCATE_DESCRIPTOR: &str = "(I)Ljava/nio/ByteBuffer;";

/// Getter prefix of the generated accessors.
pub const GETTER_PREFIX: &str = "$get_";
/// Setter prefix of the generated accessors.
pub const SETTER_PREFIX: &str = "$set_";
/// Field prefix of nested flyweights.
pub const FLYWEIGHT_PREFIX: &str = "$fw_";

/// Apply the packed strategy in place and return the layout it used.
///
/// # Errors
/// - [`Error::UnresolvedReference`] if a nested field type is not a packed type of the index
/// - [`Error::MalformedUnit`] if a method body cannot be decoded or a table overflows
pub fn apply(unit: &mut ClassFile, index: &TypeIndex) -> Result<PackedLayout> {
    let owner = unit.name()?.to_string();
    let layout = layout::compute(&unit.fields_view()?);

    for field in &layout.fields {
        if let ValueKind::Object(nested) = &field.kind {
            if !index.is_packed(nested) {
                return Err(Error::UnresolvedReference(nested.clone()));
            }
        }
    }

    let rewritten = rewrite_access_sites(unit, &owner, &layout)?;

    unit.fields.retain(|field| !field.is_instance());
    add_field(
        unit,
        FieldAccess::PUBLIC | FieldAccess::SYNTHETIC,
        INDEX_FIELD,
        "I",
    )?;
    add_field(
        unit,
        FieldAccess::PRIVATE | FieldAccess::STATIC | FieldAccess::SYNTHETIC,
        DATA_FIELD,
        BYTE_BUFFER_DESCRIPTOR,
    )?;
    add_stride_constant(unit, &layout)?;
    add_static_init(unit, &owner, &layout)?;
    add_capacity_method(unit, &owner, &layout)?;

    for field in &layout.fields {
        if let ValueKind::Object(nested) = &field.kind {
            add_field(
                unit,
                FieldAccess::PRIVATE | FieldAccess::SYNTHETIC,
                &format!("{FLYWEIGHT_PREFIX}{}", field.name),
                &field.kind.descriptor(),
            )?;
            add_flyweight_getter(unit, &owner, &layout, field, nested)?;
            add_flyweight_setter(unit, &owner, &layout, field, nested)?;
        } else {
            add_getter(unit, &owner, &layout, field)?;
            add_setter(unit, &owner, &layout, field)?;
        }
    }

    reparent(unit, COMPONENT, PACKED_COMPONENT)?;
    log::debug!(
        "{owner}: packed {} field(s) into a {}-byte stride, {rewritten} access site(s) rewritten",
        layout.fields.len(),
        layout.stride
    );
    Ok(layout)
}

fn getter_descriptor(field: &PackedField) -> String {
    format!("(){}", field.kind.descriptor())
}

fn setter_descriptor(field: &PackedField) -> String {
    format!("({})V", field.kind.descriptor())
}

fn rewrite_access_sites(unit: &mut ClassFile, owner: &str, layout: &PackedLayout) -> Result<usize> {
    rewrite_sites(
        unit,
        |pool, _, opcode, operand| {
            if opcode != GETFIELD && opcode != PUTFIELD {
                return Ok(false);
            }
            let target = pool.member_ref(operand)?;
            Ok(target.owner == owner && layout.field(target.name).is_some())
        },
        |pool, opcode, operand| {
            let name = pool.member_ref(operand)?.name.to_string();
            let field = layout
                .field(&name)
                .ok_or_else(|| malformed_error!("no packed field named {}", name))?;
            let (accessor, descriptor) = if opcode == GETFIELD {
                (format!("{GETTER_PREFIX}{name}"), getter_descriptor(field))
            } else {
                (format!("{SETTER_PREFIX}{name}"), setter_descriptor(field))
            };
            let accessor = pool.intern_method_ref(owner, &accessor, &descriptor)?;
            Ok((INVOKESPECIAL, accessor))
        },
    )
}

fn add_stride_constant(unit: &mut ClassFile, layout: &PackedLayout) -> Result<()> {
    let stride = stride_of(layout)?;
    let value = unit.pool.intern_integer(stride)?;
    let name_index = unit.pool.intern_utf8(CONSTANT_VALUE)?;

    add_field(
        unit,
        FieldAccess::PUBLIC | FieldAccess::STATIC | FieldAccess::FINAL | FieldAccess::SYNTHETIC,
        STRIDE_FIELD,
        "I",
    )?;

    let mut payload = Vec::with_capacity(2);
    write_be(&mut payload, value);
    if let Some(field) = unit.fields.last_mut() {
        field.attributes.push(Attribute {
            name_index,
            data: AttributeData::Raw(payload),
        });
    }
    Ok(())
}

fn stride_of(layout: &PackedLayout) -> Result<i32> {
    i32::try_from(layout.stride).map_err(|_| malformed_error!("stride {} too large", layout.stride))
}

/// `static { $data = ByteBuffer.allocateDirect($stride * INITIAL_SLOTS); }`, unless the unit
/// already has a static initializer.
fn add_static_init(unit: &mut ClassFile, owner: &str, layout: &PackedLayout) -> Result<()> {
    if unit.find_method(STATIC_INIT, "()V")?.is_some() {
        log::debug!("{owner}: keeping existing static initializer, buffer allocated lazily");
        return Ok(());
    }

    let bytes = stride_of(layout)?
        .checked_mul(INITIAL_SLOTS)
        .ok_or_else(|| malformed_error!("initial buffer of {} slots too large", INITIAL_SLOTS))?;
    let allocate = unit
        .pool
        .intern_method_ref(BYTE_BUFFER, ALLOCATE, ALLOCATE_DESCRIPTOR)?;
    let data = unit
        .pool
        .intern_field_ref(owner, DATA_FIELD, BYTE_BUFFER_DESCRIPTOR)?;

    let mut body = Bytecode::new();
    body.push_int(&mut unit.pool, bytes)?
        .op_u16(INVOKESTATIC, allocate, 0)
        .op_u16(PUTSTATIC, data, -1)
        .ret(None);

    add_method(unit, MethodAccess::STATIC, STATIC_INIT, "()V", body, 0, None)
}

/// `$ensureCapacity(slot)`: allocate `$data` if it is still null, then replace it with a
/// buffer of `max((slot + 1) * $stride, 2 * capacity)` bytes holding a copy of the old
/// contents whenever the slot does not fit.
///
/// The old buffer is rewound before the bulk copy because `put(ByteBuffer)` advances both
/// positions. Accessors only use absolute offsets, so positions carry no other meaning.
fn add_capacity_method(unit: &mut ClassFile, owner: &str, layout: &PackedLayout) -> Result<()> {
    let stride = stride_of(layout)?;
    let data = unit
        .pool
        .intern_field_ref(owner, DATA_FIELD, BYTE_BUFFER_DESCRIPTOR)?;
    let allocate = unit
        .pool
        .intern_method_ref(BYTE_BUFFER, ALLOCATE, ALLOCATE_DESCRIPTOR)?;
    let capacity = unit.pool.intern_method_ref(BUFFER, "capacity", "()I")?;
    let rewind = unit
        .pool
        .intern_method_ref(BUFFER, "rewind", "()Ljava/nio/Buffer;")?;
    let copy = unit.pool.intern_method_ref(
        BYTE_BUFFER,
        "put",
        "(Ljava/nio/ByteBuffer;)Ljava/nio/ByteBuffer;",
    )?;
    let max = unit.pool.intern_method_ref("java/lang/Math", "max", "(II)I")?;

    let mut body = Bytecode::new();
    body.op_u16(GETSTATIC, data, 1);
    let allocated = body.branch(IFNONNULL, -1);
    body.push_int(&mut unit.pool, 0)?
        .op_u16(INVOKESTATIC, allocate, 0)
        .op_u16(PUTSTATIC, data, -1);
    let first_frame = body.position();
    body.patch(allocated)?;

    // required = (slot + 1) * stride
    body.op(ILOAD_0, 1)
        .push_int(&mut unit.pool, 1)?
        .op(IADD, -1)
        .push_int(&mut unit.pool, stride)?
        .op(IMUL, -1)
        .op(ISTORE_1, -1);

    body.op_u16(GETSTATIC, data, 1)
        .op_u16(INVOKEVIRTUAL, capacity, 0)
        .op(ILOAD_1, 1);
    let fits = body.branch(IF_ICMPGE, -2);

    body.op_u16(GETSTATIC, data, 1)
        .op_u16(INVOKEVIRTUAL, rewind, 0)
        .op(POP, -1)
        .op(ILOAD_1, 1)
        .op_u16(GETSTATIC, data, 1)
        .op_u16(INVOKEVIRTUAL, capacity, 0)
        .push_int(&mut unit.pool, 2)?
        .op(IMUL, -1)
        .op_u16(INVOKESTATIC, max, -1)
        .op_u16(INVOKESTATIC, allocate, 0)
        .op(DUP, 1)
        .op_u16(GETSTATIC, data, 1)
        .op_u16(INVOKEVIRTUAL, copy, -1)
        .op(POP, -1)
        .op_u16(PUTSTATIC, data, -1);
    let second_frame = body.position();
    body.patch(fits)?;
    body.ret(None);

    // same_frame once `$data` is set, then append_frame adding the int `required`.
    let first = u8::try_from(first_frame)
        .ok()
        .filter(|offset| *offset <= 63)
        .ok_or_else(|| malformed_error!("capacity frame offset {} out of range", first_frame))?;
    let delta = u16::try_from(second_frame - first_frame - 1)
        .map_err(|_| malformed_error!("capacity frame offset {} out of range", second_frame))?;
    let mut frames = Vec::with_capacity(7);
    write_be(&mut frames, 2_u16);
    frames.push(first);
    frames.push(252);
    write_be(&mut frames, delta);
    frames.push(1);

    add_method(
        unit,
        MethodAccess::PRIVATE | MethodAccess::STATIC | MethodAccess::SYNTHETIC,
        CAPACITY_METHOD,
        CAPACITY_DESCRIPTOR,
        body,
        2,
        Some(frames),
    )
}

/// Emit `$ensureCapacity($index)`.
fn ensure_slot(unit: &mut ClassFile, body: &mut Bytecode, owner: &str) -> Result<()> {
    let slot = unit.pool.intern_field_ref(owner, INDEX_FIELD, "I")?;
    let grow = unit
        .pool
        .intern_method_ref(owner, CAPACITY_METHOD, CAPACITY_DESCRIPTOR)?;
    body.this()
        .op_u16(GETFIELD, slot, 0)
        .op_u16(INVOKESTATIC, grow, -1);
    Ok(())
}

/// Emit `$data, $index * $stride + offset`, the buffer and byte address of `field`.
fn push_address(
    unit: &mut ClassFile,
    body: &mut Bytecode,
    owner: &str,
    layout: &PackedLayout,
    field: &PackedField,
) -> Result<()> {
    let data = unit
        .pool
        .intern_field_ref(owner, DATA_FIELD, BYTE_BUFFER_DESCRIPTOR)?;
    let slot = unit.pool.intern_field_ref(owner, INDEX_FIELD, "I")?;
    let stride = stride_of(layout)?;
    let offset = i32::try_from(field.offset)
        .map_err(|_| malformed_error!("offset {} too large", field.offset))?;

    body.op_u16(GETSTATIC, data, 1)
        .this()
        .op_u16(GETFIELD, slot, 0)
        .push_int(&mut unit.pool, stride)?
        .op(IMUL, -1)
        .push_int(&mut unit.pool, offset)?
        .op(IADD, -1);
    Ok(())
}

/// The `ByteBuffer` accessor pair for a primitive kind: `(get, get descriptor, put, put
/// descriptor)`.
fn buffer_methods(kind: &ValueKind) -> (&'static str, &'static str, &'static str, &'static str) {
    match kind {
        ValueKind::Boolean | ValueKind::Byte => ("get", "(I)B", "put", "(IB)Ljava/nio/ByteBuffer;"),
        ValueKind::Char => ("getChar", "(I)C", "putChar", "(IC)Ljava/nio/ByteBuffer;"),
        ValueKind::Short => ("getShort", "(I)S", "putShort", "(IS)Ljava/nio/ByteBuffer;"),
        ValueKind::Float => ("getFloat", "(I)F", "putFloat", "(IF)Ljava/nio/ByteBuffer;"),
        ValueKind::Long => ("getLong", "(I)J", "putLong", "(IJ)Ljava/nio/ByteBuffer;"),
        ValueKind::Double => ("getDouble", "(I)D", "putDouble", "(ID)Ljava/nio/ByteBuffer;"),
        ValueKind::Int | ValueKind::Object(_) | ValueKind::Array(_) => {
            ("getInt", "(I)I", "putInt", "(II)Ljava/nio/ByteBuffer;")
        }
    }
}

fn add_getter(
    unit: &mut ClassFile,
    owner: &str,
    layout: &PackedLayout,
    field: &PackedField,
) -> Result<()> {
    let (get, get_descriptor, _, _) = buffer_methods(&field.kind);
    let read = unit.pool.intern_method_ref(BYTE_BUFFER, get, get_descriptor)?;
    let slots = i32::from(field.kind.slots());

    let mut body = Bytecode::new();
    ensure_slot(unit, &mut body, owner)?;
    push_address(unit, &mut body, owner, layout, field)?;
    body.op_u16(INVOKEVIRTUAL, read, slots - 2)
        .ret(Some(&field.kind));

    add_method(
        unit,
        MethodAccess::PRIVATE | MethodAccess::SYNTHETIC,
        &format!("{GETTER_PREFIX}{}", field.name),
        &getter_descriptor(field),
        body,
        1,
        None,
    )
}

fn add_setter(
    unit: &mut ClassFile,
    owner: &str,
    layout: &PackedLayout,
    field: &PackedField,
) -> Result<()> {
    let (_, _, put, put_descriptor) = buffer_methods(&field.kind);
    let write = unit.pool.intern_method_ref(BYTE_BUFFER, put, put_descriptor)?;
    let slots = i32::from(field.kind.slots());

    let mut body = Bytecode::new();
    ensure_slot(unit, &mut body, owner)?;
    push_address(unit, &mut body, owner, layout, field)?;
    body.load_param(&field.kind)
        .op_u16(INVOKEVIRTUAL, write, -1 - slots)
        .op(POP, -1)
        .ret(None);

    add_method(
        unit,
        MethodAccess::PRIVATE | MethodAccess::SYNTHETIC,
        &format!("{SETTER_PREFIX}{}", field.name),
        &setter_descriptor(field),
        body,
        1 + field.kind.slots(),
        None,
    )
}

/// `$get_<name>()` for a nested packed field: lazily create the flyweight, point it at the
/// stored slot and return it.
fn add_flyweight_getter(
    unit: &mut ClassFile,
    owner: &str,
    layout: &PackedLayout,
    field: &PackedField,
    nested: &str,
) -> Result<()> {
    let descriptor = field.kind.descriptor();
    let flyweight = unit.pool.intern_field_ref(
        owner,
        &format!("{FLYWEIGHT_PREFIX}{}", field.name),
        &descriptor,
    )?;
    let nested_class = unit.pool.intern_class(nested)?;
    let nested_init = unit.pool.intern_method_ref(nested, "<init>", "()V")?;
    let nested_slot = unit.pool.intern_field_ref(nested, INDEX_FIELD, "I")?;
    let read = unit.pool.intern_method_ref(BYTE_BUFFER, "getInt", "(I)I")?;

    let mut body = Bytecode::new();
    ensure_slot(unit, &mut body, owner)?;
    body.this().op_u16(GETFIELD, flyweight, 0);
    let created = body.branch(IFNONNULL, -1);
    body.this()
        .op_u16(NEW, nested_class, 1)
        .op(DUP, 1)
        .op_u16(INVOKESPECIAL, nested_init, -1)
        .op_u16(PUTFIELD, flyweight, -2);
    let frame_offset = body.position();
    body.patch(created)?;

    body.this().op_u16(GETFIELD, flyweight, 0).op(DUP, 1);
    push_address(unit, &mut body, owner, layout, field)?;
    body.op_u16(INVOKEVIRTUAL, read, -1)
        .op_u16(PUTFIELD, nested_slot, -2)
        .ret(Some(&field.kind));

    // One same_frame at the branch target: locals [this], empty stack.
    let frame_type = u8::try_from(frame_offset)
        .ok()
        .filter(|offset| *offset <= 63)
        .ok_or_else(|| malformed_error!("flyweight frame offset {} out of range", frame_offset))?;
    let mut frames = Vec::with_capacity(3);
    write_be(&mut frames, 1_u16);
    frames.push(frame_type);

    add_method(
        unit,
        MethodAccess::PRIVATE | MethodAccess::SYNTHETIC,
        &format!("{GETTER_PREFIX}{}", field.name),
        &getter_descriptor(field),
        body,
        1,
        Some(frames),
    )
}

/// `$set_<name>(value)` for a nested packed field: store the value's slot index.
fn add_flyweight_setter(
    unit: &mut ClassFile,
    owner: &str,
    layout: &PackedLayout,
    field: &PackedField,
    nested: &str,
) -> Result<()> {
    let nested_slot = unit.pool.intern_field_ref(nested, INDEX_FIELD, "I")?;
    let write = unit
        .pool
        .intern_method_ref(BYTE_BUFFER, "putInt", "(II)Ljava/nio/ByteBuffer;")?;

    let mut body = Bytecode::new();
    ensure_slot(unit, &mut body, owner)?;
    push_address(unit, &mut body, owner, layout, field)?;
    body.load_param(&field.kind)
        .op_u16(GETFIELD, nested_slot, 0)
        .op_u16(INVOKEVIRTUAL, write, -2)
        .op(POP, -1)
        .ret(None);

    add_method(
        unit,
        MethodAccess::PRIVATE | MethodAccess::SYNTHETIC,
        &format!("{SETTER_PREFIX}{}", field.name),
        &setter_descriptor(field),
        body,
        2,
        None,
    )
}
