//! The pooled strategy: instances are reset and reused instead of reallocated.
//!
//! A pooled unit receives a `protected void reset()` that puts every instance field back to
//! its default value, and a unit extending the plain component base is moved under the
//! pooled base so the owning manager recycles its instances. A `reset()` the author already
//! wrote is left alone.

use crate::{
    classfile::{
        bytecode::Bytecode,
        descriptor::ValueKind,
        member::{FieldAccess, MethodAccess},
        opcodes::PUTFIELD,
        ClassFile,
    },
    weaver::{
        transform::{add_method, reparent},
        COMPONENT, POOLED_COMPONENT,
    },
    Result,
};

/// Name of the injected reset hook.
pub const RESET: &str = "reset";

/// Apply the pooled strategy in place.
///
/// # Errors
/// Returns [`crate::Error::MalformedUnit`] if a field does not resolve or a method body
/// cannot be decoded.
pub fn apply(unit: &mut ClassFile) -> Result<()> {
    let name = unit.name()?.to_string();

    if unit.find_method(RESET, "()V")?.is_some() {
        log::debug!("{name}: keeping declared reset()");
    } else {
        inject_reset(unit, &name)?;
    }

    reparent(unit, COMPONENT, POOLED_COMPONENT)?;
    Ok(())
}

fn inject_reset(unit: &mut ClassFile, owner: &str) -> Result<()> {
    let mut targets = Vec::new();
    for field in unit.fields.iter().filter(|f| f.is_instance()) {
        let field_name = field.name(&unit.pool)?.to_string();
        if field.access.contains(FieldAccess::FINAL) {
            log::debug!("{owner}: final field {field_name} is not reset");
            continue;
        }
        let descriptor = field.descriptor(&unit.pool)?.to_string();
        targets.push((field_name, descriptor));
    }

    let mut body = Bytecode::new();
    for (field_name, descriptor) in &targets {
        let kind = ValueKind::parse(descriptor)?;
        let target = unit.pool.intern_field_ref(owner, field_name, descriptor)?;
        body.this()
            .push_default(&kind)
            .op_u16(PUTFIELD, target, -1 - i32::from(kind.slots()));
    }
    body.ret(None);

    add_method(unit, MethodAccess::PROTECTED, RESET, "()V", body, 1, None)?;
    log::debug!("{owner}: injected reset() over {} field(s)", targets.len());
    Ok(())
}
