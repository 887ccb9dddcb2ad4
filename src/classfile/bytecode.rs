//! Emitter for synthesized method bodies.
//!
//! [`Bytecode`] appends instructions to a code array and keeps track of the operand stack
//! depth it has seen, so synthesized methods get an exact `max_stack`. Branches are emitted
//! with a placeholder offset and patched once the target is known.
//!
//! # Examples
//!
//! ```rust
//! use weavescope::classfile::{bytecode::Bytecode, constpool::ConstantPool, descriptor::ValueKind};
//!
//! let mut pool = ConstantPool::new();
//! let mut body = Bytecode::new();
//! body.this()
//!     .push_int(&mut pool, 100_000)?
//!     .ret(Some(&ValueKind::Int));
//! assert_eq!(body.position(), 5);
//! # Ok::<(), weavescope::Error>(())
//! ```

use crate::{
    classfile::{
        attribute::CodeAttribute,
        constpool::ConstantPool,
        descriptor::ValueKind,
        opcodes::{
            ACONST_NULL, ALOAD_0, ALOAD_1, ARETURN, BIPUSH, DCONST_0, DLOAD_1, DRETURN, FCONST_0,
            FLOAD_1, FRETURN, ICONST_0, ICONST_M1, ILOAD_1, IRETURN, LCONST_0, LDC_W, LLOAD_1,
            LRETURN, RETURN, SIPUSH,
        },
    },
    file::io::write_be_at,
    Result,
};

/// An append-only code array with stack depth tracking.
#[derive(Debug, Default, Clone)]
pub struct Bytecode {
    code: Vec<u8>,
    depth: i32,
    max_depth: i32,
}

impl Bytecode {
    /// Create an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset, i.e. the offset of the next emitted instruction.
    #[must_use]
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Deepest operand stack seen so far, in slots.
    #[must_use]
    pub fn max_stack(&self) -> u16 {
        u16::try_from(self.max_depth).unwrap_or(u16::MAX)
    }

    /// Record the stack effect of the last instruction.
    pub fn stack(&mut self, effect: i32) -> &mut Self {
        self.depth += effect;
        self.max_depth = self.max_depth.max(self.depth);
        self
    }

    /// Emit a bare opcode with the given stack effect.
    pub fn op(&mut self, opcode: u8, effect: i32) -> &mut Self {
        self.code.push(opcode);
        self.stack(effect)
    }

    /// Emit an opcode with a one-byte operand.
    pub fn op_u8(&mut self, opcode: u8, operand: u8, effect: i32) -> &mut Self {
        self.code.push(opcode);
        self.code.push(operand);
        self.stack(effect)
    }

    /// Emit an opcode with a two-byte operand, typically a constant pool index.
    pub fn op_u16(&mut self, opcode: u8, operand: u16, effect: i32) -> &mut Self {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self.stack(effect)
    }

    /// Emit a branch with a zero offset and return its position for [`Bytecode::patch`].
    pub fn branch(&mut self, opcode: u8, effect: i32) -> usize {
        let at = self.position();
        self.op_u16(opcode, 0, effect);
        at
    }

    /// Point the branch emitted at `at` to the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if `at` is not a branch emitted by this body or
    /// the distance does not fit a 16-bit offset.
    pub fn patch(&mut self, at: usize) -> Result<()> {
        let distance = i64::try_from(self.position()).unwrap_or(i64::MAX)
            - i64::try_from(at).unwrap_or(i64::MAX);
        let distance = i16::try_from(distance)
            .map_err(|_| malformed_error!("branch distance {} out of range", distance))?;
        let mut offset = at + 1;
        write_be_at(&mut self.code, &mut offset, distance)
    }

    /// `aload_0`
    pub fn this(&mut self) -> &mut Self {
        self.op(ALOAD_0, 1)
    }

    /// Push an `int` constant with the shortest encoding.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the constant pool overflows.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn push_int(&mut self, pool: &mut ConstantPool, value: i32) -> Result<&mut Self> {
        match value {
            -1..=5 => {
                // iconst_m1 .. iconst_5 are contiguous
                self.op((i32::from(ICONST_M1) + value + 1) as u8, 1);
            }
            -128..=127 => {
                self.op_u8(BIPUSH, value as i8 as u8, 1);
            }
            -32768..=32767 => {
                self.op_u16(SIPUSH, value as i16 as u16, 1);
            }
            _ => {
                let index = pool.intern_integer(value)?;
                self.op_u16(LDC_W, index, 1);
            }
        }
        Ok(self)
    }

    /// Push the default value of `kind`: zero, `false` or `null`.
    pub fn push_default(&mut self, kind: &ValueKind) -> &mut Self {
        match kind {
            ValueKind::Long => self.op(LCONST_0, 2),
            ValueKind::Double => self.op(DCONST_0, 2),
            ValueKind::Float => self.op(FCONST_0, 1),
            ValueKind::Object(_) | ValueKind::Array(_) => self.op(ACONST_NULL, 1),
            _ => self.op(ICONST_0, 1),
        }
    }

    /// Load the first declared parameter (local slot 1) of an instance method.
    pub fn load_param(&mut self, kind: &ValueKind) -> &mut Self {
        let slots = i32::from(kind.slots());
        match kind {
            ValueKind::Long => self.op(LLOAD_1, slots),
            ValueKind::Double => self.op(DLOAD_1, slots),
            ValueKind::Float => self.op(FLOAD_1, slots),
            ValueKind::Object(_) | ValueKind::Array(_) => self.op(ALOAD_1, slots),
            _ => self.op(ILOAD_1, slots),
        }
    }

    /// Return a value of `kind`, or `void` for `None`.
    pub fn ret(&mut self, kind: Option<&ValueKind>) -> &mut Self {
        match kind {
            None => self.op(RETURN, 0),
            Some(kind) => {
                let slots = -i32::from(kind.slots());
                match kind {
                    ValueKind::Long => self.op(LRETURN, slots),
                    ValueKind::Double => self.op(DRETURN, slots),
                    ValueKind::Float => self.op(FRETURN, slots),
                    ValueKind::Object(_) | ValueKind::Array(_) => self.op(ARETURN, slots),
                    _ => self.op(IRETURN, slots),
                }
            }
        }
    }

    /// Finish into a `Code` attribute with the tracked `max_stack`.
    #[must_use]
    pub fn into_code(self, max_locals: u16) -> CodeAttribute {
        let max_stack = self.max_stack();
        CodeAttribute::new(max_stack, max_locals, self.code)
    }

    /// The emitted bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }
}
