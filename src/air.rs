use miette::Report;

use crate::instruction::Instruction;
use crate::span::Span;
use crate::symbol::SymbolTable;

/// Assembly intermediate representation: load origin plus one statement per instruction,
/// each occupying exactly two bytes.
pub struct Air {
    /// Memory address the program is assembled for
    orig: u16,
    ast: Vec<AirStmt>,
    /// Non-fatal diagnostics gathered while assembling
    warnings: Vec<Report>,
    symbols: SymbolTable,
}

/// Single assembled instruction together with where it came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AirStmt {
    pub addr: u16,
    /// 0-based source line
    pub line: usize,
    /// Span of the mnemonic in the source
    pub span: Span,
    pub instr: Instruction,
}

impl AirStmt {
    /// Opcode word for this statement.
    pub fn emit(&self) -> u16 {
        // The assembler only builds instructions with a valid encoding
        self.instr.encode().unwrap_or_default()
    }
}

impl Air {
    pub fn new(orig: u16) -> Self {
        Air {
            orig,
            ast: Vec::new(),
            warnings: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn orig(&self) -> u16 {
        self.orig
    }

    pub fn add_stmt(&mut self, stmt: AirStmt) {
        self.ast.push(stmt)
    }

    pub fn warn(&mut self, report: Report) {
        self.warnings.push(report)
    }

    pub fn warnings(&self) -> &[Report] {
        &self.warnings
    }

    pub fn set_symbols(&mut self, symbols: SymbolTable) {
        self.symbols = symbols;
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn get(&self, idx: usize) -> &AirStmt {
        &self.ast[idx]
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AirStmt> {
        self.ast.iter()
    }

    /// Flat big-endian program image.
    pub fn emit(&self) -> Vec<u8> {
        self.ast
            .iter()
            .flat_map(|stmt| stmt.emit().to_be_bytes())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AirStmt;
    type IntoIter = std::slice::Iter<'a, AirStmt>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
