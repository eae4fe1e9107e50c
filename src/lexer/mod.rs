use std::fmt;

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use miette::Result;
use regex::Regex;

use crate::error;
use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};
use crate::symbol::Register;

pub mod cursor;

/// Reserved words: instruction mnemonics, general registers and pseudo-registers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Keyword {
    Cls,
    Ret,
    Sys,
    Jp,
    Call,
    Se,
    Sne,
    Ld,
    Add,
    Or,
    Xor,
    And,
    Sub,
    Shl,
    Shr,
    Subn,
    Rnd,
    Drw,
    Skp,
    Sknp,

    /// `V0`-`VF`
    Reg(Register),
    /// Delay timer
    Dt,
    /// Sound timer
    St,
    /// Index register
    I,
    /// Key press
    K,
    /// Font glyph address
    F,
    /// Binary coded decimal
    B,
    /// Memory at the index register, `[I]`
    IndexMem,
}

impl Keyword {
    pub fn register(self) -> Option<Register> {
        match self {
            Keyword::Reg(reg) => Some(reg),
            _ => None,
        }
    }

    pub fn is_mnemonic(self) -> bool {
        !matches!(
            self,
            Keyword::Reg(_)
                | Keyword::Dt
                | Keyword::St
                | Keyword::I
                | Keyword::K
                | Keyword::F
                | Keyword::B
                | Keyword::IndexMem
        )
    }
}

lazy_static! {
    /// Built once, read-only afterwards. Keys are upper case.
    static ref KEYWORDS: FxHashMap<&'static str, Keyword> = {
        let mut map = FxHashMap::default();
        for (name, kw) in [
            ("CLS", Keyword::Cls),
            ("RET", Keyword::Ret),
            ("SYS", Keyword::Sys),
            ("JP", Keyword::Jp),
            ("CALL", Keyword::Call),
            ("SE", Keyword::Se),
            ("SNE", Keyword::Sne),
            ("LD", Keyword::Ld),
            ("ADD", Keyword::Add),
            ("OR", Keyword::Or),
            ("XOR", Keyword::Xor),
            ("AND", Keyword::And),
            ("SUB", Keyword::Sub),
            ("SHL", Keyword::Shl),
            ("SHR", Keyword::Shr),
            ("SUBN", Keyword::Subn),
            ("RND", Keyword::Rnd),
            ("DRW", Keyword::Drw),
            ("SKP", Keyword::Skp),
            ("SKNP", Keyword::Sknp),
            ("DT", Keyword::Dt),
            ("ST", Keyword::St),
            ("I", Keyword::I),
            ("K", Keyword::K),
            ("F", Keyword::F),
            ("B", Keyword::B),
            ("[I]", Keyword::IndexMem),
        ] {
            map.insert(name, kw);
        }
        const REGISTERS: [&str; 16] = [
            "V0", "V1", "V2", "V3", "V4", "V5", "V6", "V7",
            "V8", "V9", "VA", "VB", "VC", "VD", "VE", "VF",
        ];
        for (idx, name) in REGISTERS.into_iter().enumerate() {
            if let Some(reg) = Register::new(idx as u8) {
                map.insert(name, Keyword::Reg(reg));
            }
        }
        map
    };

    /// Signed integer with C-style radix prefix: `0x` hex, leading `0` octal, else decimal.
    static ref IMMEDIATE: Regex =
        Regex::new(r"^([+-]?)(0[xX][0-9a-fA-F]+|0[0-7]*|[1-9][0-9]*)$").unwrap();
}

/// Look up a case-insensitive keyword.
pub fn keyword(text: &str) -> Option<Keyword> {
    KEYWORDS.get(text.to_ascii_uppercase().as_str()).copied()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Label definition, trailing colon stripped
    Label,
    /// Instruction name or register name
    Keyword(Keyword),
    /// Directives like `.BYTE`
    Directive,
    /// Immediate values like `#5` or `#0x200`
    Immediate(i32),
    /// Label reference
    Identifier,
    /// Parenthesised expression, recognised but never evaluated
    Expression,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Label => "label",
            TokenKind::Keyword(_) => "keyword",
            TokenKind::Directive => "directive",
            TokenKind::Immediate(_) => "immediate",
            TokenKind::Identifier => "identifier",
            TokenKind::Expression => "expression",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text; upper-cased for keywords, colon stripped for labels
    pub text: String,
    /// 0-based source line
    pub line: usize,
    pub span: Span,
}

/// Test if a character separates tokens.
pub(crate) fn is_delimiter(c: char) -> bool {
    // Commas are essentially whitespace
    matches!(c, ' ' | '\t' | '\r' | ',')
}

/// Break a block of code into a flat sequence of tokens, in source order.
///
/// Fails on the first immediate that cannot be parsed.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor::new(src);
    let mut toks = Vec::new();
    let mut line = 0;

    while let Some(token) = cursor.advance_token(src, &mut line)? {
        toks.push(token);
    }
    Ok(toks)
}

impl Cursor<'_> {
    /// Skip delimiters, newlines and comments, then lex one token. `None` at end of input.
    pub fn advance_token(&mut self, src: &str, line: &mut usize) -> Result<Option<Token>> {
        loop {
            self.take_while(is_delimiter);
            match self.first() {
                '\n' => {
                    self.bump();
                    *line += 1;
                }
                ';' => self.take_while(|c| c != '\n'),
                _ if self.is_eof() => return Ok(None),
                _ => break,
            }
        }

        self.start_token();
        self.take_while(|c| !is_delimiter(c) && c != '\n' && c != ';');
        let span = Span::new(Idx(self.token_start()), self.pos_in_token());
        let text = &src[span.as_range()];

        let token = classify(text, span, *line, src)?;
        Ok(Some(token))
    }
}

fn classify(text: &str, span: Span, line: usize, src: &str) -> Result<Token> {
    let token = |kind, text: &str| Token {
        kind,
        text: text.to_string(),
        line,
        span,
    };

    if text.starts_with('.') {
        return Ok(token(TokenKind::Directive, text));
    }
    if let Some(literal) = text.strip_prefix('#') {
        let value = parse_immediate(literal)
            .map_err(|reason| error::lex_invalid_imm(span, line, src, text, reason))?;
        return Ok(token(TokenKind::Immediate(value), text));
    }
    if let Some(name) = text.strip_suffix(':') {
        return Ok(token(TokenKind::Label, name));
    }
    if text.starts_with('(') {
        return Ok(token(TokenKind::Expression, text));
    }
    if let Some(kw) = keyword(text) {
        return Ok(token(TokenKind::Keyword(kw), &text.to_ascii_uppercase()));
    }
    Ok(token(TokenKind::Identifier, text))
}

fn parse_immediate(literal: &str) -> std::result::Result<i32, &'static str> {
    let caps = IMMEDIATE.captures(literal).ok_or("not a number")?;
    let negative = &caps[1] == "-";
    let body = &caps[2];

    let magnitude = if let Some(hex) = body.strip_prefix("0x").or(body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = body.strip_prefix('0').filter(|oct| !oct.is_empty()) {
        i64::from_str_radix(oct, 8)
    } else {
        body.parse::<i64>()
    }
    .map_err(|_| "out of range")?;

    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| "out of range")
}
