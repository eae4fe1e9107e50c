// Assembling
mod air;
pub use air::{Air, AirStmt};
mod assembler;
pub use assembler::{assemble, assemble_at, Assembler, DEFAULT_ORIGIN};
mod lexer;
pub use lexer::{tokenize, Keyword, Token, TokenKind};
mod symbol;
pub use symbol::{Register, SymbolTable};

mod error;
mod span;
pub use span::Span;

// Instruction set
mod instruction;
pub use instruction::{Encoding, Instruction, Kind};
mod disassembler;
pub use disassembler::{disassemble, Disassembler};

// Running
mod display;
pub use display::Display;
mod quirks;
pub use quirks::Quirks;
mod runtime;
pub use runtime::{Vm, MEMORY_SIZE};

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
