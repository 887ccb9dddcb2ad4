//! Strategy dispatch and the structural edits shared by both strategies.
//!
//! Every rewrite of existing code in this crate replaces a three-byte member instruction by
//! another three-byte member instruction with the same stack effect. Instruction offsets,
//! branch targets, exception ranges and stack map frames therefore stay valid without any
//! fixup, and the constant pool is only ever appended to.

use crate::{
    classfile::{
        annotation::Annotation,
        attribute::{Attribute, AttributeData, CodeAttribute, CODE, STACK_MAP_TABLE},
        bytecode::Bytecode,
        constpool::ConstantPool,
        member::{FieldAccess, FieldInfo, MethodAccess, MethodInfo},
        opcodes::{instruction_offsets, GETSTATIC, INVOKESPECIAL, INVOKESTATIC},
        ClassFile,
    },
    weaver::{
        config::WeaverConfig,
        index::TypeIndex,
        meta::{fingerprint, FINGERPRINT_ELEMENT, STRATEGY_ELEMENT},
        packed, pooled, TransformResult, WeaverType, WOVEN_MARKER,
    },
    Error, Result,
};

/// Apply `weaver_type` to `unit` and serialize the result.
///
/// The transformation is local to the unit: the index is only consulted to check that the
/// supertype and any nested packed field types exist. Both strategies finish by attaching
/// the woven marker, recording the strategy and the fingerprint of the rewritten field
/// table. [`WeaverType::None`] returns the unit unchanged.
///
/// # Errors
/// - [`Error::UnresolvedReference`] if the supertype is neither a configured external type
///   nor part of the index
/// - [`Error::MalformedUnit`] if a method body cannot be decoded or a table overflows
pub fn transform(
    mut unit: ClassFile,
    weaver_type: WeaverType,
    index: &TypeIndex,
    config: &WeaverConfig,
) -> Result<TransformResult> {
    let name = unit.name()?.to_string();
    if let Some(super_name) = unit.super_name()? {
        if !config.is_external(super_name) && !index.contains(super_name) {
            return Err(Error::UnresolvedReference(super_name.to_string()));
        }
    }

    let layout = match weaver_type {
        WeaverType::None => None,
        WeaverType::Pooled => {
            pooled::apply(&mut unit)?;
            None
        }
        WeaverType::Packed => Some(packed::apply(&mut unit, index)?),
    };

    if weaver_type != WeaverType::None {
        let strategy = weaver_type.to_string();
        let print = fingerprint(&unit)?;
        let marker = Annotation::with_strings(
            &mut unit.pool,
            WOVEN_MARKER,
            &[(STRATEGY_ELEMENT, &strategy), (FINGERPRINT_ELEMENT, &print)],
        )?;
        unit.add_invisible_annotation(marker)?;
        log::debug!("{name}: woven as {strategy} ({print})");
    }

    let bytes = unit.to_bytes()?;
    Ok(TransformResult {
        name,
        annotation: weaver_type,
        unit,
        bytes,
        layout,
    })
}

/// Replace the supertype `from` by `to`, retargeting the super constructor calls.
///
/// Returns `false` (and changes nothing) if the unit does not extend `from`.
pub(crate) fn reparent(unit: &mut ClassFile, from: &str, to: &str) -> Result<bool> {
    if unit.super_name()? != Some(from) {
        return Ok(false);
    }

    unit.set_super_name(to)?;
    let retargeted = rewrite_sites(
        unit,
        |pool, method, opcode, operand| {
            if opcode != INVOKESPECIAL || method.name(pool)? != "<init>" {
                return Ok(false);
            }
            let target = pool.member_ref(operand)?;
            Ok(target.owner == from && target.name == "<init>")
        },
        |pool, opcode, operand| {
            let descriptor = pool.member_ref(operand)?.descriptor.to_string();
            Ok((opcode, pool.intern_method_ref(to, "<init>", &descriptor)?))
        },
    )?;

    log::debug!("re-parented {from} -> {to}, {retargeted} constructor call(s) retargeted");
    Ok(true)
}

/// Rewrite member instructions in every method body.
///
/// `select` sees each field or method instruction (`getstatic` through `invokestatic`) with
/// its constant pool operand and picks the sites to rewrite; `map` then produces the
/// replacement opcode and operand for each picked site. Returns the number of rewritten
/// sites.
pub(crate) fn rewrite_sites<S, M>(unit: &mut ClassFile, mut select: S, mut map: M) -> Result<usize>
where
    S: FnMut(&ConstantPool, &MethodInfo, u8, u16) -> Result<bool>,
    M: FnMut(&mut ConstantPool, u8, u16) -> Result<(u8, u16)>,
{
    let mut sites = Vec::new();
    for (position, method) in unit.methods.iter().enumerate() {
        let Some(code) = method.code() else {
            continue;
        };
        for offset in instruction_offsets(&code.code)? {
            let opcode = code.code[offset];
            if !(GETSTATIC..=INVOKESTATIC).contains(&opcode) {
                continue;
            }
            let operand = u16::from_be_bytes([code.code[offset + 1], code.code[offset + 2]]);
            if select(&unit.pool, method, opcode, operand)? {
                sites.push((position, offset, opcode, operand));
            }
        }
    }

    for (position, offset, opcode, operand) in &sites {
        let (new_opcode, new_operand) = map(&mut unit.pool, *opcode, *operand)?;
        if let Some(code) = unit.methods[*position].code_mut() {
            code.code[*offset] = new_opcode;
            code.code[offset + 1..offset + 3].copy_from_slice(&new_operand.to_be_bytes());
        }
    }

    Ok(sites.len())
}

/// Append a field.
pub(crate) fn add_field(
    unit: &mut ClassFile,
    access: FieldAccess,
    name: &str,
    descriptor: &str,
) -> Result<()> {
    let name_index = unit.pool.intern_utf8(name)?;
    let descriptor_index = unit.pool.intern_utf8(descriptor)?;
    unit.fields.push(FieldInfo {
        access,
        name_index,
        descriptor_index,
        attributes: Vec::new(),
    });
    Ok(())
}

/// Append a method whose body was produced by `body`.
///
/// `frames` is the raw `StackMapTable` payload, attached only when the unit's version
/// requires stack maps.
pub(crate) fn add_method(
    unit: &mut ClassFile,
    access: MethodAccess,
    name: &str,
    descriptor: &str,
    body: Bytecode,
    max_locals: u16,
    frames: Option<Vec<u8>>,
) -> Result<()> {
    let mut code: CodeAttribute = body.into_code(max_locals);
    if let Some(frames) = frames {
        if unit.requires_stack_maps() {
            code.attributes.push(Attribute {
                name_index: unit.pool.intern_utf8(STACK_MAP_TABLE)?,
                data: AttributeData::Raw(frames),
            });
        }
    }

    let code_name = unit.pool.intern_utf8(CODE)?;
    let name_index = unit.pool.intern_utf8(name)?;
    let descriptor_index = unit.pool.intern_utf8(descriptor)?;
    unit.methods.push(MethodInfo {
        access,
        name_index,
        descriptor_index,
        attributes: vec![Attribute {
            name_index: code_name,
            data: AttributeData::Code(code),
        }],
    });
    Ok(())
}
