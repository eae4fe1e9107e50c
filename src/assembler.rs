use miette::Result;

use crate::{
    air::{Air, AirStmt},
    error,
    instruction::{Encoding, Instruction, Kind},
    lexer::{tokenize, Keyword, Token, TokenKind},
    symbol::{Register, SymbolTable},
};

/// Address programs are conventionally loaded at.
pub const DEFAULT_ORIGIN: u16 = 0x200;

/// Assemble `src` for the default origin.
pub fn assemble(src: &str) -> Result<Air> {
    Assembler::new(src)?.assemble()
}

/// Assemble `src` for a custom origin.
pub fn assemble_at(src: &str, origin: u16) -> Result<Air> {
    Assembler::with_origin(src, origin)?.assemble()
}

/// Single linear pass over the token stream.
///
/// Labels are bound as they are reached, so an address operand may only name a label defined
/// on an earlier line (or `$`, the address of the current instruction).
pub struct Assembler<'a> {
    /// Reference to the source file
    src: &'a str,
    toks: Vec<Token>,
    /// Index of the next unprocessed token
    idx: usize,
    /// Address of the next emitted instruction
    addr: u16,
    symbols: SymbolTable,
    air: Air,
}

impl<'a> Assembler<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        Self::with_origin(src, DEFAULT_ORIGIN)
    }

    pub fn with_origin(src: &'a str, origin: u16) -> Result<Self> {
        let toks = tokenize(src)?;
        Ok(Assembler {
            src,
            toks,
            idx: 0,
            addr: origin,
            symbols: SymbolTable::new(),
            air: Air::new(origin),
        })
    }

    /// Create AIR out of the token stream. Stops at the first error.
    pub fn assemble(mut self) -> Result<Air> {
        while let Some(tok) = self.toks.get(self.idx).cloned() {
            self.symbols.set_current(self.addr);

            match tok.kind {
                TokenKind::Label => {
                    if let Err(existing) = self.symbols.define(&tok.text, self.addr) {
                        return Err(error::asm_duplicate_label(
                            tok.span, tok.line, self.src, &tok.text, existing,
                        ));
                    }
                    self.idx += 1;
                }
                TokenKind::Keyword(kw) => {
                    let operands = self.operands_of(&tok);
                    let (instr, used) = self.parse_instr(&tok, kw, &operands)?;
                    if let Some(extra) = operands.get(used) {
                        return Err(error::asm_extra_operand(
                            extra.span, extra.line, self.src, &extra.text,
                        ));
                    }
                    self.air.add_stmt(AirStmt {
                        addr: self.addr,
                        line: tok.line,
                        span: tok.span,
                        instr,
                    });
                    self.addr = self.addr.wrapping_add(2);
                    self.idx += 1 + used;
                }
                TokenKind::Immediate(_) => {
                    return Err(error::asm_stray(
                        tok.span, tok.line, self.src, "immediate value", &tok.text,
                    ))
                }
                TokenKind::Expression => {
                    return Err(error::asm_stray(
                        tok.span, tok.line, self.src, "expression", &tok.text,
                    ))
                }
                TokenKind::Directive => {
                    let warning =
                        error::warn_ignored_directive(tok.span, tok.line, self.src, &tok.text);
                    self.air.warn(warning);
                    self.idx += 1;
                }
                TokenKind::Identifier => {
                    let warning =
                        error::warn_stray_identifier(tok.span, tok.line, self.src, &tok.text);
                    self.air.warn(warning);
                    self.idx += 1;
                }
            }
        }

        self.air.set_symbols(self.symbols);
        // Consume self to return AIR
        Ok(self.air)
    }

    /// Tokens following `tok` on the same source line.
    fn operands_of(&self, tok: &Token) -> Vec<Token> {
        self.toks[self.idx + 1..]
            .iter()
            .take_while(|op| op.line == tok.line)
            .cloned()
            .collect()
    }

    /// Process the mnemonic `tok` and its operands into an instruction. Also returns how many
    /// operand tokens were consumed.
    fn parse_instr(
        &mut self,
        tok: &Token,
        kw: Keyword,
        ops: &[Token],
    ) -> Result<(Instruction, usize)> {
        let first = ops.first();
        let second = ops.get(1);
        let Some(kind) = classify(kw, first, second) else {
            return Err(error::asm_unknown_instruction(
                tok.span, tok.line, self.src, &tok.text,
            ));
        };

        match kind {
            Kind::Cls | Kind::Ret => Ok((Instruction::new(kind, Encoding::None), 0)),
            Kind::Jp | Kind::Call => self.addr_instr(kind, tok, first, 1),
            Kind::JpV0 | Kind::LdI => self.addr_instr(kind, tok, second, 2),
            Kind::Skp | Kind::Sknp => self.dst_instr(kind, tok, first, "destination", 1),
            Kind::LdGetDt | Kind::LdKey | Kind::LdLoad => {
                self.dst_instr(kind, tok, first, "destination", 2)
            }
            Kind::LdSetDt
            | Kind::LdSetSt
            | Kind::LdFont
            | Kind::LdBcd
            | Kind::LdStore
            | Kind::AddI => self.dst_instr(kind, tok, second, "source", 2),
            Kind::Shr | Kind::Shl => self.shift_instr(kind, tok, first, second),
            Kind::Se
            | Kind::Sne
            | Kind::Ld
            | Kind::Add
            | Kind::Or
            | Kind::And
            | Kind::Xor
            | Kind::Sub
            | Kind::Subn
            | Kind::Rnd => self.dst_src_instr(kind, tok, first, second),
            Kind::Drw => self.drw_instr(tok, first, second, ops.get(2)),
            Kind::Unknown => unreachable!("classify never yields an unknown kind"),
        }
    }

    fn addr_instr(
        &mut self,
        kind: Kind,
        tok: &Token,
        addr: Option<&Token>,
        used: usize,
    ) -> Result<(Instruction, usize)> {
        let addr = self.expect_operand(tok, addr, "address")?;
        let value = match addr.kind {
            TokenKind::Immediate(val) => {
                if !(0..=0xFFF).contains(&val) {
                    self.warn_truncated(addr, val, 12);
                }
                val as u16
            }
            TokenKind::Identifier => match self.symbols.get(&addr.text) {
                Some(val) => val,
                None => {
                    return Err(error::asm_undeclared(
                        addr.span, addr.line, self.src, &addr.text,
                    ))
                }
            },
            _ => {
                return Err(error::asm_invalid_address(
                    addr.span, addr.line, self.src, &addr.text,
                ))
            }
        };
        let instr = Instruction::new(kind, Encoding::Address).with_address(value);
        Ok((instr, used))
    }

    fn dst_instr(
        &mut self,
        kind: Kind,
        tok: &Token,
        reg: Option<&Token>,
        role: &str,
        used: usize,
    ) -> Result<(Instruction, usize)> {
        let reg = self.expect_reg(tok, reg, role)?;
        let instr = Instruction::new(kind, Encoding::Destination).with_dst(reg.index());
        Ok((instr, used))
    }

    /// `SHR Vx` or `SHR Vx, Vy`.
    fn shift_instr(
        &mut self,
        kind: Kind,
        tok: &Token,
        dst: Option<&Token>,
        src: Option<&Token>,
    ) -> Result<(Instruction, usize)> {
        let dst = self.expect_reg(tok, dst, "destination")?;
        // The second register is optional, but anything else in its place is an error
        let src = match src {
            Some(op) => Some(self.expect_reg(tok, Some(op), "source")?),
            None => None,
        };
        let instr = Instruction::new(kind, Encoding::DestinationSource)
            .with_dst(dst.index())
            .with_src(src.map_or(0, Register::index));
        Ok((instr, if src.is_some() { 2 } else { 1 }))
    }

    fn dst_src_instr(
        &mut self,
        kind: Kind,
        tok: &Token,
        dst: Option<&Token>,
        src: Option<&Token>,
    ) -> Result<(Instruction, usize)> {
        let dst_tok = self.expect_operand(tok, dst, "destination")?;
        let src_tok = self.expect_operand(tok, src, "source")?;
        let dst = self.expect_reg(tok, Some(dst_tok), "destination")?;

        let instr = match src_tok.kind {
            TokenKind::Immediate(val) => {
                if !matches!(kind, Kind::Se | Kind::Sne | Kind::Ld | Kind::Add | Kind::Rnd) {
                    return Err(error::asm_no_immediate_form(
                        src_tok.span, tok.line, self.src, &tok.text,
                    ));
                }
                if !(-128..=255).contains(&val) {
                    self.warn_truncated(src_tok, val, 8);
                }
                Instruction::new(kind, Encoding::DestinationByte)
                    .with_dst(dst.index())
                    .with_byte(val as u8)
            }
            _ if kind == Kind::Rnd => {
                return Err(error::asm_expected_immediate(
                    src_tok.span, tok.line, self.src, &src_tok.text,
                ))
            }
            _ => {
                let src = self.expect_reg(tok, Some(src_tok), "source")?;
                Instruction::new(kind, Encoding::DestinationSource)
                    .with_dst(dst.index())
                    .with_src(src.index())
            }
        };
        Ok((instr, 2))
    }

    fn drw_instr(
        &mut self,
        tok: &Token,
        dst: Option<&Token>,
        src: Option<&Token>,
        nib: Option<&Token>,
    ) -> Result<(Instruction, usize)> {
        let dst_tok = self.expect_operand(tok, dst, "destination")?;
        let src_tok = self.expect_operand(tok, src, "source")?;
        let nib = self.expect_operand(tok, nib, "4-bit integer")?;
        let dst = self.expect_reg(tok, Some(dst_tok), "destination")?;
        let src = self.expect_reg(tok, Some(src_tok), "source")?;

        let TokenKind::Immediate(rows) = nib.kind else {
            return Err(error::asm_invalid_nibble(
                nib.span, tok.line, self.src, &nib.text,
            ));
        };
        if !(0..=0xF).contains(&rows) {
            self.warn_truncated(nib, rows, 4);
        }
        let instr = Instruction::new(Kind::Drw, Encoding::DestinationSourceNibble)
            .with_dst(dst.index())
            .with_src(src.index())
            .with_byte(rows as u8 & 0xF);
        Ok((instr, 3))
    }

    fn expect_operand<'t>(
        &self,
        tok: &Token,
        operand: Option<&'t Token>,
        what: &str,
    ) -> Result<&'t Token> {
        operand.ok_or_else(|| error::asm_missing_operand(tok.span, tok.line, self.src, what))
    }

    fn expect_reg(&self, tok: &Token, operand: Option<&Token>, role: &str) -> Result<Register> {
        let operand = self.expect_operand(tok, operand, role)?;
        let reg = match operand.kind {
            TokenKind::Keyword(kw) => kw.register(),
            _ => None,
        };
        reg.ok_or_else(|| {
            error::asm_invalid_register(operand.span, tok.line, self.src, role, &operand.text)
        })
    }

    fn warn_truncated(&mut self, tok: &Token, value: i32, bits: u8) {
        let warning = error::warn_truncated(tok.span, tok.line, self.src, value, bits);
        self.air.warn(warning);
    }
}

/// Pick the instruction kind from the mnemonic and the kinds of its first two operands.
///
/// `None` if `kw` cannot start an instruction.
fn classify(kw: Keyword, dst: Option<&Token>, src: Option<&Token>) -> Option<Kind> {
    let keyword_of = |tok: Option<&Token>| match tok.map(|tok| tok.kind) {
        Some(TokenKind::Keyword(kw)) => Some(kw),
        _ => None,
    };
    let dst_kw = keyword_of(dst);
    let src_kw = keyword_of(src);

    if !kw.is_mnemonic() {
        return None;
    }
    let kind = match kw {
        Keyword::Cls => Kind::Cls,
        Keyword::Ret => Kind::Ret,
        Keyword::Call => Kind::Call,
        Keyword::Se => Kind::Se,
        Keyword::Sne => Kind::Sne,
        Keyword::Or => Kind::Or,
        Keyword::Xor => Kind::Xor,
        Keyword::And => Kind::And,
        Keyword::Sub => Kind::Sub,
        Keyword::Shl => Kind::Shl,
        Keyword::Shr => Kind::Shr,
        Keyword::Subn => Kind::Subn,
        Keyword::Rnd => Kind::Rnd,
        Keyword::Drw => Kind::Drw,
        Keyword::Skp => Kind::Skp,
        Keyword::Sknp => Kind::Sknp,
        Keyword::Jp => match dst_kw.and_then(Keyword::register) {
            Some(reg) if reg.index() == 0 => Kind::JpV0,
            _ => Kind::Jp,
        },
        Keyword::Add => match dst_kw {
            Some(Keyword::I) => Kind::AddI,
            _ => Kind::Add,
        },
        // Probably the trickiest instruction with the most variations
        Keyword::Ld => match (dst_kw, src_kw) {
            (Some(Keyword::I), _) => Kind::LdI,
            (Some(Keyword::Dt), _) => Kind::LdSetDt,
            (Some(Keyword::St), _) => Kind::LdSetSt,
            (Some(Keyword::F), _) => Kind::LdFont,
            (Some(Keyword::B), _) => Kind::LdBcd,
            (Some(Keyword::IndexMem), _) => Kind::LdStore,
            (_, Some(Keyword::K)) => Kind::LdKey,
            (_, Some(Keyword::Dt)) => Kind::LdGetDt,
            (_, Some(Keyword::IndexMem)) => Kind::LdLoad,
            _ => Kind::Ld,
        },
        // `SYS` has no encoding on this machine; registers were rejected above
        _ => return None,
    };
    Some(kind)
}
