//! JVM opcode constants and instruction length decoding.
//!
//! Only the opcodes the weaver emits or inspects get named constants; every other opcode is
//! handled generically by [`instruction_length`], which is all the rewriter needs to walk a
//! method body instruction by instruction.

use crate::Result;

pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const LCONST_0: u8 = 0x09;
pub const FCONST_0: u8 = 0x0b;
pub const DCONST_0: u8 = 0x0e;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC_W: u8 = 0x13;
pub const ILOAD_0: u8 = 0x1a;
pub const ILOAD_1: u8 = 0x1b;
pub const LLOAD_1: u8 = 0x1f;
pub const FLOAD_1: u8 = 0x23;
pub const DLOAD_1: u8 = 0x27;
pub const ALOAD_0: u8 = 0x2a;
pub const ALOAD_1: u8 = 0x2b;
pub const ISTORE_1: u8 = 0x3c;
pub const POP: u8 = 0x57;
pub const DUP: u8 = 0x59;
pub const IADD: u8 = 0x60;
pub const IMUL: u8 = 0x68;
pub const I2B: u8 = 0x91;
pub const IF_ICMPGE: u8 = 0xa2;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const LRETURN: u8 = 0xad;
pub const FRETURN: u8 = 0xae;
pub const DRETURN: u8 = 0xaf;
pub const ARETURN: u8 = 0xb0;
pub const RETURN: u8 = 0xb1;
pub const GETSTATIC: u8 = 0xb2;
pub const PUTSTATIC: u8 = 0xb3;
pub const GETFIELD: u8 = 0xb4;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const NEW: u8 = 0xbb;
pub const WIDE: u8 = 0xc4;
pub const IFNONNULL: u8 = 0xc7;

const IINC: u8 = 0x84;

/// Length in bytes of the instruction starting at `offset` in `code`.
///
/// Switch instructions are padded relative to the start of the code array, so `offset`
/// must be the instruction's position within the method body.
///
/// # Errors
/// Returns [`crate::Error::MalformedUnit`] for reserved opcodes or a truncated instruction.
pub fn instruction_length(code: &[u8], offset: usize) -> Result<usize> {
    let opcode = *code
        .get(offset)
        .ok_or_else(|| malformed_error!("instruction offset {} past end of code", offset))?;

    let length = match opcode {
        0x00..=0x0f => 1,
        BIPUSH => 2,
        SIPUSH => 3,
        0x12 => 2,
        0x13 | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        TABLESWITCH => {
            let pad = switch_padding(offset);
            let base = offset + 1 + pad;
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            if high < low {
                return Err(malformed_error!("tableswitch at {} has high < low", offset));
            }
            let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
                .map_err(|_| malformed_error!("tableswitch at {} is too large", offset))?;
            1 + pad + 12 + count * 4
        }
        LOOKUPSWITCH => {
            let pad = switch_padding(offset);
            let npairs = read_i32(code, offset + 1 + pad + 4)?;
            let npairs = usize::try_from(npairs)
                .map_err(|_| malformed_error!("lookupswitch at {} has negative npairs", offset))?;
            1 + pad + 8 + npairs * 8
        }
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        NEW => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        WIDE => match code.get(offset + 1) {
            Some(&IINC) => 6,
            Some(_) => 4,
            None => return Err(malformed_error!("truncated wide instruction at {}", offset)),
        },
        0xc5 => 4,
        0xc6 | IFNONNULL => 3,
        0xc8 | 0xc9 => 5,
        other => {
            return Err(malformed_error!(
                "reserved opcode 0x{:02x} at {}",
                other,
                offset
            ))
        }
    };

    if offset + length > code.len() {
        return Err(malformed_error!(
            "instruction at {} runs past the end of code",
            offset
        ));
    }
    Ok(length)
}

/// Offsets of every instruction in `code`, in order.
///
/// # Errors
/// See [`instruction_length`].
pub fn instruction_offsets(code: &[u8]) -> Result<Vec<usize>> {
    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        offsets.push(offset);
        offset += instruction_length(code, offset)?;
    }
    Ok(offsets)
}

fn switch_padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn read_i32(code: &[u8], at: usize) -> Result<i32> {
    let mut at = at;
    crate::file::io::read_be_at::<i32>(code, &mut at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_lengths() {
        assert_eq!(instruction_length(&[ALOAD_0], 0).unwrap(), 1);
        assert_eq!(instruction_length(&[GETFIELD, 0, 1], 0).unwrap(), 3);
        assert_eq!(instruction_length(&[0xb9, 0, 1, 1, 0], 0).unwrap(), 5);
        assert_eq!(instruction_length(&[WIDE, 0x15, 0, 1], 0).unwrap(), 4);
        assert_eq!(instruction_length(&[WIDE, IINC, 0, 1, 0, 1], 0).unwrap(), 6);
    }

    #[test]
    fn test_tableswitch_padding() {
        // nop; tableswitch at 1 -> 2 bytes padding, default, low=0, high=1, two offsets
        let mut code = vec![0x00, TABLESWITCH, 0, 0];
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&1_i32.to_be_bytes());
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&0_i32.to_be_bytes());
        assert_eq!(instruction_length(&code, 1).unwrap(), 1 + 2 + 12 + 8);
        assert_eq!(instruction_offsets(&code).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_lookupswitch_padding() {
        // lookupswitch at 0 -> 3 bytes padding, default, npairs=1, one pair
        let mut code = vec![LOOKUPSWITCH, 0, 0, 0];
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&1_i32.to_be_bytes());
        code.extend_from_slice(&5_i32.to_be_bytes());
        code.extend_from_slice(&0_i32.to_be_bytes());
        assert_eq!(instruction_length(&code, 0).unwrap(), code.len());
    }

    #[test]
    fn test_truncated_and_reserved() {
        assert!(instruction_length(&[GETFIELD, 0], 0).is_err());
        assert!(instruction_length(&[0xca], 0).is_err());
        assert!(instruction_offsets(&[ALOAD_0, SIPUSH, 0]).is_err());
    }
}
