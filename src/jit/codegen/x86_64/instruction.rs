use arbitrary_int::{u2, u3};
use bitbybit::{bitenum, bitfield};
use bitflags::bitflags;

use num_traits::ops::bytes::ToBytes;

/// The longest instruction the decoder accepts
pub const MAX_INSTRUCTION_LENGTH: usize = 15;

/// This is the output of any opcode and pretty much can be outputted directly to instruction stream
/// only difference is that we don't encode Option<>
///
/// Structure is: (everything is 1 byte unless otherwise specified)
/// REX | TwoByteOpcodeFlag | PrimaryOpcode | MOD/RM | SIB | Displacement (1/4) | Immediate (1/4)
#[derive(Clone, Debug)]
pub struct Instruction {
    pub prefix: Prefix,

    pub primary_opcode: u8,
    pub mod_rm: Option<ModRM>,

    pub sib: Option<ScaledIndexByte>,
    pub displacement: Option<Displacement>,
    pub immediate: Option<Immediate>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TwoByteOpcode {
    Value = 0x0F,
}

/// The encodings that can be emitted prior to the opcode, REX always has to come last
#[derive(Clone, Debug, Default)]
pub struct Prefix {
    pub rex: Option<RexPrefixEncoding>,
    /// If set it should just be set to `TwoByteOpcode.Value`
    pub two_byte_opcode: Option<TwoByteOpcode>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Displacement {
    ZeroByteDisplacement,
    OneByteDisplacement(u8),
    FourByteDisplacement(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Immediate {
    Imm8(u8),
    Imm32(u32),
}

impl Immediate {
    pub fn is_zero(&self) -> bool {
        match *self {
            Immediate::Imm8(i) => i == 0,
            Immediate::Imm32(i) => i == 0,
        }
    }
}

impl From<u8> for Immediate {
    fn from(value: u8) -> Self {
        Immediate::Imm8(value)
    }
}

impl From<i8> for Immediate {
    fn from(value: i8) -> Self {
        Immediate::Imm8(value as u8)
    }
}

impl From<u32> for Immediate {
    fn from(value: u32) -> Self {
        Immediate::Imm32(value)
    }
}

impl From<i32> for Immediate {
    fn from(value: i32) -> Self {
        Immediate::Imm32(value as u32)
    }
}

/// The addressing mode of the registers, this is the first 2 bits of the ModRM
#[bitenum(u2, exhaustive: true)]
pub enum AddressingMode {
    /// Dereference the memory location at the register but there is no additional displacement
    ZeroByteDisplacement = 0b00,
    /// Dereference the memory location at the register and apply the 1-byte displacement that is stored 1 byte after MOD R/M but before the constant/immediate
    OneByteDisplacement = 0b01,
    /// Dereference the memory location at the register and apply the 4-byte displacement that is stored 1 byte after MOD R/M but before the constant/immediate
    FourByteDisplacement = 0b10,
    /// No indirect lookups of memory locations just use the direct value stored in the register
    RegisterDirect = 0b11,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RexPrefixEncoding : u8 {
        const Base  = 0b0100_0000;
        /// Wide instruction (64 bit instead of 32)
        const W     = 0b0000_1000;
        /// Extends the `register` field in MOD/RM
        const R     = 0b0000_0100;
        /// Extends the `index` field in SIB
        const X     = 0b0000_0010;
        /// Extends the `register_or_memory` field in MOD/RM or the `base` field in SIB
        const B     = 0b0000_0001;
    }
}

impl RexPrefixEncoding {
    pub fn as_u8(&self) -> u8 {
        self.bits()
    }
}

/// Defined as displacement (as usual) + base + index * scale.
///
/// Only emitted when the base is SP/R12, their r/m encoding means "a SIB byte follows".
#[bitfield(u8, default: 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct ScaledIndexByte {
    #[bits(6..=7, rw)]
    pub scale: u2,

    #[bits(3..=5, rw)]
    pub index: u3,

    #[bits(0..=2, rw)]
    pub base: u3,
}

/// This primarily specifies addressing mode, a source/destination register, and optionally an opcode extension
/// Default is 0b11 since it's the RegisterDirect.
#[bitfield(u8, default: 0b11_000_000)]
#[derive(Debug, PartialEq, Eq)]
pub struct ModRM {
    #[bits(6..=7, rw)]
    pub addressing_mode: AddressingMode,

    /// REX.B extends this to access upper registers
    #[bits(0..=2, rw)]
    pub register_memory: u3,

    #[bits(3..=5, rw)]
    pub opcode_extension: u3,

    /// REX.R extends this to access upper registers
    #[bits(3..=5, rw)]
    pub register: u3,
}

impl ModRM {
    pub fn new_if_opcode(opt_opcode_extension: Option<u3>) -> Option<ModRM> {
        opt_opcode_extension
            .map(|opcode_extension| ModRM::default().with_opcode_extension(opcode_extension))
    }
}

/// Writes values little endian into a fixed size instruction buffer
struct Cursor<'a> {
    buf: &'a mut [u8; MAX_INSTRUCTION_LENGTH],
    len: usize,
}

impl<'a> Cursor<'a> {
    fn emit_opt_byte<const COUNT: usize, T: ToBytes<Bytes = [u8; COUNT]>>(
        &mut self,
        value: Option<T>,
    ) {
        if let Some(value) = value {
            let bytes = ToBytes::to_le_bytes(&value);
            self.buf[self.len..self.len + COUNT].copy_from_slice(&bytes);
            self.len += COUNT;
        }
    }
}

impl Instruction {
    /// Writes the instruction into `buf` returning how many bytes it took
    pub fn encode(&self, buf: &mut [u8; MAX_INSTRUCTION_LENGTH]) -> usize {
        let mut cursor = Cursor { buf, len: 0 };

        // emit prefixes
        cursor.emit_opt_byte(self.prefix.rex.map(|rex| rex.as_u8()));
        cursor.emit_opt_byte(
            self.prefix
                .two_byte_opcode
                .map(|opcode_flag| opcode_flag as u8),
        );

        // emit opcode
        cursor.emit_opt_byte(Some(self.primary_opcode));

        // modrm & sib
        cursor.emit_opt_byte(self.mod_rm.map(|modrm| modrm.raw_value()));
        cursor.emit_opt_byte(self.sib.map(|sib| sib.raw_value()));

        // displacement & immediate
        match self.displacement {
            None | Some(Displacement::ZeroByteDisplacement) => {}
            Some(Displacement::OneByteDisplacement(byte)) => cursor.emit_opt_byte(Some(byte)),
            Some(Displacement::FourByteDisplacement(double_word)) => {
                cursor.emit_opt_byte(Some(double_word))
            }
        }
        match self.immediate {
            None => {}
            Some(Immediate::Imm8(byte)) => cursor.emit_opt_byte(Some(byte)),
            Some(Immediate::Imm32(double_word)) => cursor.emit_opt_byte(Some(double_word)),
        }

        cursor.len
    }
}
