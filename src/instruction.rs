//! Bit-level grammar of CHIP-8 opcodes, shared by the runtime, the assembler and the
//! disassembler.

/// Which operand fields an instruction packs into its 16 bits.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Encoding {
    #[default]
    None,
    /// `_nnn`
    Address,
    /// `_x__`
    Destination,
    /// `_xkk`
    DestinationByte,
    /// `_xy_`
    DestinationSource,
    /// `_xyn`
    DestinationSourceNibble,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Kind {
    #[default]
    Unknown,
    Cls,
    Ret,
    Jp,
    /// `JP V0, addr`
    JpV0,
    Call,
    Se,
    Sne,
    Ld,
    Add,
    Or,
    And,
    Xor,
    Sub,
    Shr,
    Subn,
    Shl,
    Rnd,
    Drw,
    Skp,
    Sknp,
    /// `LD F, Vx`
    LdFont,
    /// `LD B, Vx`
    LdBcd,
    /// `LD I, addr`
    LdI,
    /// `LD [I], Vx`
    LdStore,
    /// `LD Vx, [I]`
    LdLoad,
    /// `LD Vx, DT`
    LdGetDt,
    /// `LD Vx, K`
    LdKey,
    /// `LD DT, Vx`
    LdSetDt,
    /// `LD ST, Vx`
    LdSetSt,
    /// `ADD I, Vx`
    AddI,
}

impl Kind {
    /// Mnemonic shared by assembly source and disassembly output.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Unknown => "???",
            Kind::Cls => "CLS",
            Kind::Ret => "RET",
            Kind::Jp | Kind::JpV0 => "JP",
            Kind::Call => "CALL",
            Kind::Se => "SE",
            Kind::Sne => "SNE",
            Kind::Ld
            | Kind::LdFont
            | Kind::LdBcd
            | Kind::LdI
            | Kind::LdStore
            | Kind::LdLoad
            | Kind::LdGetDt
            | Kind::LdKey
            | Kind::LdSetDt
            | Kind::LdSetSt => "LD",
            Kind::Add | Kind::AddI => "ADD",
            Kind::Or => "OR",
            Kind::And => "AND",
            Kind::Xor => "XOR",
            Kind::Sub => "SUB",
            Kind::Shr => "SHR",
            Kind::Subn => "SUBN",
            Kind::Shl => "SHL",
            Kind::Rnd => "RND",
            Kind::Drw => "DRW",
            Kind::Skp => "SKP",
            Kind::Sknp => "SKNP",
        }
    }
}

/// Sub-opcodes of the `8xy_` family, indexed by the low nibble.
const ALU_TABLE: [Kind; 16] = [
    Kind::Ld,      // 0x0
    Kind::Or,      // 0x1
    Kind::And,     // 0x2
    Kind::Xor,     // 0x3
    Kind::Add,     // 0x4
    Kind::Sub,     // 0x5
    Kind::Shr,     // 0x6
    Kind::Subn,    // 0x7
    Kind::Unknown, // 0x8
    Kind::Unknown, // 0x9
    Kind::Unknown, // 0xA
    Kind::Unknown, // 0xB
    Kind::Unknown, // 0xC
    Kind::Unknown, // 0xD
    Kind::Shl,     // 0xE
    Kind::Unknown, // 0xF
];

/// Sub-opcodes of the `Fx__` family, indexed by the low seven bits.
const CTRL_TABLE: [Kind; 128] = {
    let mut table = [Kind::Unknown; 128];
    table[0x07] = Kind::LdGetDt;
    table[0x0A] = Kind::LdKey;
    table[0x15] = Kind::LdSetDt;
    table[0x18] = Kind::LdSetSt;
    table[0x1E] = Kind::AddI;
    table[0x29] = Kind::LdFont;
    table[0x33] = Kind::LdBcd;
    table[0x55] = Kind::LdStore;
    table[0x65] = Kind::LdLoad;
    table
};

/// A decoded (or about to be encoded) instruction.
///
/// Only the fields selected by `encoding` are meaningful; the rest are zero when produced by
/// [`Instruction::decode`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Instruction {
    pub kind: Kind,
    pub encoding: Encoding,
    pub dst: u8,
    pub src: u8,
    /// Immediate byte, or the 4-bit row count for `DRW`.
    pub byte: u8,
    pub address: u16,
}

impl Instruction {
    pub fn new(kind: Kind, encoding: Encoding) -> Self {
        Instruction {
            kind,
            encoding,
            ..Default::default()
        }
    }

    pub fn with_dst(mut self, dst: u8) -> Self {
        self.dst = dst & 0xF;
        self
    }

    pub fn with_src(mut self, src: u8) -> Self {
        self.src = src & 0xF;
        self
    }

    pub fn with_byte(mut self, byte: u8) -> Self {
        self.byte = byte;
        self
    }

    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address & 0xFFF;
        self
    }

    /// Decode any 16-bit word. Never fails: unmapped words become [`Kind::Unknown`].
    pub fn decode(word: u16) -> Self {
        let opcode = word >> 12;
        let dst = ((word >> 8) & 0xF) as u8;
        let src = ((word >> 4) & 0xF) as u8;
        let byte = (word & 0xFF) as u8;
        let address = word & 0xFFF;

        use Encoding as E;
        let (kind, encoding) = match opcode {
            0x0 => match byte {
                0xE0 => (Kind::Cls, E::None),
                0xEE => (Kind::Ret, E::None),
                _ => (Kind::Unknown, E::None),
            },
            0x1 => (Kind::Jp, E::Address),
            0x2 => (Kind::Call, E::Address),
            0x3 => (Kind::Se, E::DestinationByte),
            0x4 => (Kind::Sne, E::DestinationByte),
            0x5 => (Kind::Se, E::DestinationSource),
            0x6 => (Kind::Ld, E::DestinationByte),
            0x7 => (Kind::Add, E::DestinationByte),
            0x8 => (ALU_TABLE[(byte & 0xF) as usize], E::DestinationSource),
            0x9 => (Kind::Sne, E::DestinationSource),
            0xA => (Kind::LdI, E::Address),
            0xB => (Kind::JpV0, E::Address),
            0xC => (Kind::Rnd, E::DestinationByte),
            0xD => (Kind::Drw, E::DestinationSourceNibble),
            0xE => match byte {
                0x9E => (Kind::Skp, E::Destination),
                0xA1 => (Kind::Sknp, E::Destination),
                _ => (Kind::Unknown, E::None),
            },
            _ => (CTRL_TABLE[(byte & 0x7F) as usize], E::Destination),
        };

        if kind == Kind::Unknown {
            return Instruction::default();
        }

        let mut ins = Instruction::new(kind, encoding);
        match encoding {
            E::None => {}
            E::Address => ins.address = address,
            E::Destination => ins.dst = dst,
            E::DestinationByte => {
                ins.dst = dst;
                ins.byte = byte;
            }
            E::DestinationSource => {
                ins.dst = dst;
                ins.src = src;
            }
            E::DestinationSourceNibble => {
                ins.dst = dst;
                ins.src = src;
                ins.byte = byte & 0xF;
            }
        }
        ins
    }

    /// Fixed bits of the opcode for this kind/encoding pair, before operands are packed in.
    fn base_opcode(&self) -> Option<u16> {
        use Encoding as E;
        let base = match (self.kind, self.encoding) {
            (Kind::Cls, E::None) => 0x00E0,
            (Kind::Ret, E::None) => 0x00EE,
            (Kind::Jp, E::Address) => 0x1000,
            (Kind::Call, E::Address) => 0x2000,
            (Kind::Se, E::DestinationByte) => 0x3000,
            (Kind::Sne, E::DestinationByte) => 0x4000,
            (Kind::Se, E::DestinationSource) => 0x5000,
            (Kind::Ld, E::DestinationByte) => 0x6000,
            (Kind::Add, E::DestinationByte) => 0x7000,
            (Kind::Ld, E::DestinationSource) => 0x8000,
            (Kind::Or, E::DestinationSource) => 0x8001,
            (Kind::And, E::DestinationSource) => 0x8002,
            (Kind::Xor, E::DestinationSource) => 0x8003,
            (Kind::Add, E::DestinationSource) => 0x8004,
            (Kind::Sub, E::DestinationSource) => 0x8005,
            (Kind::Shr, E::DestinationSource) => 0x8006,
            (Kind::Subn, E::DestinationSource) => 0x8007,
            (Kind::Shl, E::DestinationSource) => 0x800E,
            (Kind::Sne, E::DestinationSource) => 0x9000,
            (Kind::LdI, E::Address) => 0xA000,
            (Kind::JpV0, E::Address) => 0xB000,
            (Kind::Rnd, E::DestinationByte) => 0xC000,
            (Kind::Drw, E::DestinationSourceNibble) => 0xD000,
            (Kind::Skp, E::Destination) => 0xE09E,
            (Kind::Sknp, E::Destination) => 0xE0A1,
            (Kind::LdGetDt, E::Destination) => 0xF007,
            (Kind::LdKey, E::Destination) => 0xF00A,
            (Kind::LdSetDt, E::Destination) => 0xF015,
            (Kind::LdSetSt, E::Destination) => 0xF018,
            (Kind::AddI, E::Destination) => 0xF01E,
            (Kind::LdFont, E::Destination) => 0xF029,
            (Kind::LdBcd, E::Destination) => 0xF033,
            (Kind::LdStore, E::Destination) => 0xF055,
            (Kind::LdLoad, E::Destination) => 0xF065,
            _ => return None,
        };
        Some(base)
    }

    /// Pack this instruction into its 16-bit word.
    ///
    /// Returns `None` for [`Kind::Unknown`] and for kind/encoding pairs with no opcode
    /// (e.g. `OR` with an immediate).
    pub fn encode(&self) -> Option<u16> {
        let base = self.base_opcode()?;
        let dst = (self.dst as u16 & 0xF) << 8;
        let src = (self.src as u16 & 0xF) << 4;
        let operands = match self.encoding {
            Encoding::None => 0,
            Encoding::Address => self.address & 0xFFF,
            Encoding::Destination => dst,
            Encoding::DestinationByte => dst | self.byte as u16,
            Encoding::DestinationSource => dst | src,
            Encoding::DestinationSourceNibble => dst | src | (self.byte as u16 & 0xF),
        };
        Some(base | operands)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
