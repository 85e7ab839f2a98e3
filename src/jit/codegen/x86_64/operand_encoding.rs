use arbitrary_int::u3;

use super::{
    instruction::{
        AddressingMode, Displacement, Immediate, Instruction, ModRM, Prefix, RexPrefixEncoding,
        ScaledIndexByte, TwoByteOpcode,
    },
    registers::{self, Register, RegisterAccess},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryBaseRegister {
    /// The register itself, no memory access
    Register(Register),
    /// `[register + displacement]`, the access of the register is ignored since addresses are
    /// always 64 bit
    DisplacementOnly(Register, Displacement),
}

impl AddressingMode {
    pub fn from_displacement(displacement: Option<Displacement>) -> AddressingMode {
        match displacement {
            Some(Displacement::ZeroByteDisplacement) => AddressingMode::ZeroByteDisplacement,
            Some(Displacement::OneByteDisplacement(_)) => AddressingMode::OneByteDisplacement,
            Some(Displacement::FourByteDisplacement(_)) => AddressingMode::FourByteDisplacement,
            None => AddressingMode::RegisterDirect,
        }
    }
}

/// The main reasons for this kind of design is the following observations
/// - there are many variants of the same opcode (ADD/SUB/CMP/MOV/...) that just differ in their encoding
/// - we want to keep it low level without a lot of abstraction
///
/// Thus you can use it something like this;
/// emit(ops::add(OperandEncoding::MemoryImmediate(MemoryBaseRegister::DisplacementOnly(registers::RSI, Displacement::ZeroByteDisplacement), Immediate::Imm8(1))))
/// or just write `add [RSI], 1u8;` inside of `asm_x86!`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandEncoding {
    /// "MI", Operand 1 = ModRM:r/m (r, w), Operand 2 = imm8/32
    MemoryImmediate(MemoryBaseRegister, Immediate),

    /// "MR", Operand 1 = ModRM:r/m (r, w), Operand 2 = ModRM:reg (r)
    MemoryRegister(MemoryBaseRegister, Register),

    /// "RM", Operand 1 = ModRM:reg (r), Operand 2 = ModRM:r/m (r, w)
    RegisterMemory(Register, MemoryBaseRegister),

    /// "D", a displacement relative to the end of the instruction (jumps)
    Relative(Immediate),

    /// "ZO", nothing besides the opcode
    ZeroOperands,
}

impl OperandEncoding {
    /// How wide the operation is.
    ///
    /// A register operand decides it, for a memory operand paired with an immediate the width
    /// of the immediate does (so `add [RSI], 1u8` is a byte add).
    pub fn operand_size(&self) -> Option<RegisterAccess> {
        match *self {
            OperandEncoding::MemoryImmediate(MemoryBaseRegister::Register((_, access)), _)
            | OperandEncoding::MemoryRegister(_, (_, access))
            | OperandEncoding::RegisterMemory((_, access), _) => Some(access),
            OperandEncoding::MemoryImmediate(
                MemoryBaseRegister::DisplacementOnly(_, _),
                Immediate::Imm8(_),
            ) => Some(RegisterAccess::LowByte),
            OperandEncoding::MemoryImmediate(
                MemoryBaseRegister::DisplacementOnly(_, _),
                Immediate::Imm32(_),
            ) => Some(RegisterAccess::LowFourBytes),
            OperandEncoding::Relative(_) | OperandEncoding::ZeroOperands => None,
        }
    }

    pub fn is_byte_sized(&self) -> bool {
        self.operand_size() == Some(RegisterAccess::LowByte)
    }
}

pub struct InstructionInput {
    pub primary_opcode: u8,
    pub two_byte_opcode: bool,
    pub opcode_extension: Option<u3>,
}

impl InstructionInput {
    pub fn new(primary_opcode: u8) -> InstructionInput {
        InstructionInput {
            primary_opcode,
            two_byte_opcode: false,
            opcode_extension: None,
        }
    }

    pub fn with_extension(mut self, opcode_extension: u3) -> InstructionInput {
        self.opcode_extension = Some(opcode_extension);
        self
    }

    /// The opcode is prefixed by 0x0F
    pub fn with_two_byte_opcode(mut self) -> InstructionInput {
        self.two_byte_opcode = true;
        self
    }
}

impl Instruction {
    fn set_rex(&mut self, rex: RexPrefixEncoding) {
        self.prefix.rex = Some(self.prefix.rex.unwrap_or(RexPrefixEncoding::Base) | rex);
    }

    fn set_modrm<T: FnOnce(ModRM) -> ModRM>(&mut self, func: T) {
        self.mod_rm = Some(func(self.mod_rm.unwrap_or_default()));
    }

    /// Byte access to SPL..DIL needs a REX prefix, even an empty one
    fn encode_byte_access(&mut self, register: Register) {
        let (reg, access) = register;
        if access == RegisterAccess::LowByte && reg.requires_rex_for_byte() {
            self.set_rex(RexPrefixEncoding::Base);
        }
    }

    fn encode_register(&mut self, register: Register) {
        let (reg, _) = register;
        if reg.requires_rex_flag() {
            self.set_rex(RexPrefixEncoding::R);
        }
        self.encode_byte_access(register);

        self.set_modrm(|modrm| modrm.with_register(reg.as_u3()));
    }

    fn encode_memregister(&mut self, mem_reg: MemoryBaseRegister) {
        match mem_reg {
            MemoryBaseRegister::Register(register) => {
                let (reg, _) = register;
                if reg.requires_rex_flag() {
                    self.set_rex(RexPrefixEncoding::B);
                }
                self.encode_byte_access(register);

                self.set_modrm(|modrm| {
                    modrm
                        .with_addressing_mode(AddressingMode::RegisterDirect)
                        .with_register_memory(reg.as_u3())
                });
            }
            MemoryBaseRegister::DisplacementOnly((reg, _), mut displacement) => {
                if reg.requires_rex_flag() {
                    self.set_rex(RexPrefixEncoding::B);
                }

                if (reg == registers::BP || reg == registers::R13)
                    && displacement == Displacement::ZeroByteDisplacement
                {
                    // in x86 this causes us to use RIP/EIP instead if we are in Mod == 00 (ZeroByteDisplacement)
                    // so to still output BP/R13 we need to actually use Mod == 01 (OneByteDisplacement) which doesn't
                    // have this fallthrough behaviour.  By setting displacement here it'll set the right addressing mode below
                    displacement = Displacement::OneByteDisplacement(0);
                }

                if reg.as_u3() == registers::SP.as_u3() {
                    // SP/R12 in r/m means a SIB byte follows, so encode them as the SIB base
                    // with SP as the index which means "no index"
                    self.sib = Some(
                        ScaledIndexByte::default()
                            .with_base(reg.as_u3())
                            .with_index(registers::SP.as_u3()),
                    );
                }

                self.set_modrm(|modrm| {
                    modrm
                        // @NOTE: The override in the ZeroByteDisplacement case above
                        .with_addressing_mode(AddressingMode::from_displacement(Some(displacement)))
                        .with_register_memory(reg.as_u3())
                });

                self.displacement = Some(displacement);
            }
        }
    }

    pub fn new(input: InstructionInput, encoding: OperandEncoding) -> Instruction {
        let mut instruction = Instruction {
            prefix: Prefix {
                rex: None,
                two_byte_opcode: input.two_byte_opcode.then_some(TwoByteOpcode::Value),
            },
            primary_opcode: input.primary_opcode,
            mod_rm: ModRM::new_if_opcode(input.opcode_extension),
            sib: None,
            displacement: None,
            immediate: None,
        };

        if encoding.operand_size() == Some(RegisterAccess::LowEightBytes) {
            instruction.set_rex(RexPrefixEncoding::W);
        }

        match encoding {
            OperandEncoding::MemoryImmediate(mem_reg, imm) => {
                instruction.encode_memregister(mem_reg);
                instruction.immediate = Some(imm);
            }
            // MR vs RM only matters for the opcode (and for what is dst/src) but from the point of encoding there is only 1 mem_reg & 1 reg either way
            OperandEncoding::MemoryRegister(mem_reg, reg)
            | OperandEncoding::RegisterMemory(reg, mem_reg) => {
                instruction.encode_memregister(mem_reg);
                instruction.encode_register(reg);
            }
            OperandEncoding::Relative(imm) => {
                instruction.immediate = Some(imm);
            }
            OperandEncoding::ZeroOperands => {}
        }

        instruction
    }
}
