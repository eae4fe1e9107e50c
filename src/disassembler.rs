use std::fmt::Write;

use crate::instruction::{Encoding, Instruction, Kind};

/// Disassemble a program image loaded at `origin` into one `0xADDR: text` line per
/// instruction.
pub fn disassemble(code: &[u8], origin: u16) -> String {
    let mut out = String::new();
    for (addr, text) in Disassembler::new(code, origin) {
        // Writing to a String cannot fail
        let _ = writeln!(out, "0x{addr:03X}: {text}");
    }
    out
}

/// Walks a program image, yielding the address and text of each instruction.
///
/// Undecodable words come out as a single `.BYTE` and the walk resumes one byte later, so a
/// misaligned stream can fall back into step.
pub struct Disassembler<'a> {
    code: &'a [u8],
    origin: u16,
    offs: usize,
}

impl<'a> Disassembler<'a> {
    pub fn new(code: &'a [u8], origin: u16) -> Self {
        Disassembler {
            code,
            origin,
            offs: 0,
        }
    }
}

impl Iterator for Disassembler<'_> {
    type Item = (u16, String);

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.code.get(self.offs)?;
        let addr = self.origin.wrapping_add(self.offs as u16);

        let text = self
            .code
            .get(self.offs + 1)
            .and_then(|second| format_instr(Instruction::decode(u16::from_be_bytes([first, *second]))));
        match text {
            Some(text) => {
                self.offs += 2;
                Some((addr, text))
            }
            None => {
                self.offs += 1;
                Some((addr, format!(".BYTE #0x{first:02X}")))
            }
        }
    }
}

/// Assembly text for a decoded instruction; `None` for unknown words.
fn format_instr(ins: Instruction) -> Option<String> {
    let name = ins.name();
    let (x, y) = (ins.dst, ins.src);

    let text = match ins.kind {
        Kind::Unknown => return None,
        Kind::Cls | Kind::Ret => name.to_string(),
        Kind::Jp | Kind::Call => format!("{name} #0x{:03X}", ins.address),
        Kind::JpV0 => format!("JP V0, #0x{:03X}", ins.address),
        Kind::Se | Kind::Sne | Kind::Ld | Kind::Add | Kind::Rnd => match ins.encoding {
            Encoding::DestinationByte => format!("{name} V{x:X}, #0x{:02X}", ins.byte),
            _ => format!("{name} V{x:X}, V{y:X}"),
        },
        Kind::Or | Kind::And | Kind::Xor | Kind::Sub | Kind::Subn => {
            format!("{name} V{x:X}, V{y:X}")
        }
        // The source register only matters to other interpreters
        Kind::Shr | Kind::Shl if y != 0 => format!("{name} V{x:X}, V{y:X}"),
        Kind::Shr | Kind::Shl | Kind::Skp | Kind::Sknp => format!("{name} V{x:X}"),
        Kind::Drw => format!("DRW V{x:X}, V{y:X}, #{}", ins.byte & 0xF),
        Kind::LdFont => format!("LD F, V{x:X}"),
        Kind::LdBcd => format!("LD B, V{x:X}"),
        Kind::LdI => format!("LD I, #0x{:03X}", ins.address),
        Kind::LdStore => format!("LD [I], V{x:X}"),
        Kind::LdLoad => format!("LD V{x:X}, [I]"),
        Kind::LdGetDt => format!("LD V{x:X}, DT"),
        Kind::LdKey => format!("LD V{x:X}, K"),
        Kind::LdSetDt => format!("LD DT, V{x:X}"),
        Kind::LdSetSt => format!("LD ST, V{x:X}"),
        Kind::AddI => format!("ADD I, V{x:X}"),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    #[test]
    fn single_instruction() {
        assert_eq!(disassemble(&[0x61, 0x04], 0x200), "0x200: LD V1, #0x04\n");
    }

    #[test]
    fn formats() {
        #[rustfmt::skip]
        let cases: &[(u16, &str)] = &[
            (0x00E0, "CLS"),
            (0x00EE, "RET"),
            (0x1ABC, "JP #0xABC"),
            (0x2042, "CALL #0x042"),
            (0xB300, "JP V0, #0x300"),
            (0x3A0F, "SE VA, #0x0F"),
            (0x5AB0, "SE VA, VB"),
            (0x9120, "SNE V1, V2"),
            (0x7FFF, "ADD VF, #0xFF"),
            (0x8124, "ADD V1, V2"),
            (0x8127, "SUBN V1, V2"),
            (0x8106, "SHR V1"),
            (0x812E, "SHL V1, V2"),
            (0xC3F0, "RND V3, #0xF0"),
            (0xD12F, "DRW V1, V2, #15"),
            (0xE49E, "SKP V4"),
            (0xE4A1, "SKNP V4"),
            (0xA123, "LD I, #0x123"),
            (0xF529, "LD F, V5"),
            (0xF533, "LD B, V5"),
            (0xF555, "LD [I], V5"),
            (0xF565, "LD V5, [I]"),
            (0xF507, "LD V5, DT"),
            (0xF50A, "LD V5, K"),
            (0xF515, "LD DT, V5"),
            (0xF518, "LD ST, V5"),
            (0xF51E, "ADD I, V5"),
        ];
        for (word, text) in cases {
            let out = disassemble(&word.to_be_bytes(), 0x200);
            assert_eq!(out, format!("0x200: {text}\n"), "word 0x{word:04X}");
        }
    }

    #[test]
    fn unknown_words_resync_by_one_byte() {
        // 0x01 0x00 is unknown, then 0x00 0xE0 is CLS
        let lines: Vec<_> = Disassembler::new(&[0x01, 0x00, 0xE0], 0x200).collect();
        assert_eq!(
            lines,
            vec![
                (0x200, ".BYTE #0x01".to_string()),
                (0x201, "CLS".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_odd_byte() {
        assert_eq!(
            disassemble(&[0x00, 0xE0, 0x12], 0x300),
            "0x300: CLS\n0x302: .BYTE #0x12\n"
        );
        assert_eq!(disassemble(&[], 0x200), "");
    }

    #[test]
    fn output_reassembles() {
        let src = "LD V0, #0x05\nLD I, #0x300\nDRW V0, V1, #5\nLD [I], V3\nLD V3, [I]\n\
                   ADD I, V2\nLD V4, DT\nSHL V2, V3\nJP V0, #0x208";
        let bytes = assemble(src).unwrap().emit();

        let text: String = Disassembler::new(&bytes, 0x200)
            .map(|(_, text)| text + "\n")
            .collect();
        assert_eq!(assemble(&text).unwrap().emit(), bytes);
    }
}
