use std::fmt::Display;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;

// Lexer errors

pub fn lex_invalid_imm(span: Span, line: usize, src: &str, text: &str, reason: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_imm",
        help = "immediates look like #10, #-3, #0x2A or #017",
        labels = vec![LabeledSpan::at(span, "incorrect immediate")],
        "line {line}: invalid immediate value '{text}': {reason}",
    )
    .with_source_code(src.to_owned())
}

// Assembler errors

pub fn asm_missing_operand(span: Span, line: usize, src: &str, operand: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::missing_operand",
        help = "check the number of operands for this instruction",
        labels = vec![LabeledSpan::at(span, "incomplete instruction")],
        "line {line}: instruction missing {operand} operand",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_invalid_register(
    span: Span,
    line: usize,
    src: &str,
    role: &str,
    text: &str,
) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::invalid_register",
        help = "general purpose registers are V0 to VF",
        labels = vec![LabeledSpan::at(span, "not a register")],
        "line {line}: invalid {role} register '{text}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_invalid_nibble(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::invalid_nibble",
        help = "the sprite height is an immediate between #1 and #15",
        labels = vec![LabeledSpan::at(span, "not an immediate")],
        "line {line}: invalid 4-bit immediate value '{text}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_no_immediate_form(span: Span, line: usize, src: &str, mnemonic: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::no_immediate_form",
        help = "only SE, SNE, LD, ADD and RND accept an immediate source",
        labels = vec![LabeledSpan::at(span, "immediate not allowed here")],
        "line {line}: instruction '{mnemonic}' has no immediate form",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_expected_immediate(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::expected_immediate",
        help = "RND masks a random byte with an immediate, like #0xFF",
        labels = vec![LabeledSpan::at(span, "not an immediate")],
        "line {line}: expected an immediate, found '{text}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_undeclared(span: Span, line: usize, src: &str, ident: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::undeclared_identifier",
        help = "labels must be defined before they are used",
        labels = vec![LabeledSpan::at(span, "unknown label")],
        "line {line}: use of undeclared identifier '{ident}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_invalid_address(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::invalid_address",
        help = "addresses are immediates like #0x200 or previously defined labels",
        labels = vec![LabeledSpan::at(span, "not an address")],
        "line {line}: invalid address operand '{text}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_stray(span: Span, line: usize, src: &str, what: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::stray_token",
        help = "lines should start with a label or an instruction",
        labels = vec![LabeledSpan::at(span, "unexpected token")],
        "line {line}: stray {what} '{text}'",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_unknown_instruction(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::unknown_instruction",
        help = "check the list of supported instructions in the documentation",
        labels = vec![LabeledSpan::at(span, "not an instruction")],
        "line {line}: '{text}' is not a supported instruction",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_extra_operand(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::extra_operand",
        help = "put each instruction on its own line",
        labels = vec![LabeledSpan::at(span, "unexpected operand")],
        "line {line}: unexpected operand '{text}' after complete instruction",
    )
    .with_source_code(src.to_owned())
}

pub fn asm_duplicate_label(span: Span, line: usize, src: &str, label: &str, addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::duplicate_label",
        help = "labels are only allowed once per file",
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "line {line}: label '{label}' is already bound to 0x{addr:03X}",
    )
    .with_source_code(src.to_owned())
}

// Assembler warnings

pub fn warn_truncated(
    span: Span,
    line: usize,
    src: &str,
    value: impl Display,
    bits: u8,
) -> Report {
    miette!(
        severity = Severity::Warning,
        code = "asm::truncated",
        help = format!("this operand holds {bits} bits; higher bits are dropped"),
        labels = vec![LabeledSpan::at(span, "out-of-range value")],
        "line {line}: value {value} does not fit in {bits} bits",
    )
    .with_source_code(src.to_owned())
}

pub fn warn_ignored_directive(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Warning,
        code = "asm::directive",
        help = "directives are recognised but not implemented",
        labels = vec![LabeledSpan::at(span, "ignored")],
        "line {line}: directive '{text}' has no effect",
    )
    .with_source_code(src.to_owned())
}

pub fn warn_stray_identifier(span: Span, line: usize, src: &str, text: &str) -> Report {
    miette!(
        severity = Severity::Warning,
        code = "asm::stray_identifier",
        help = "label definitions end with a colon, like `loop:`",
        labels = vec![LabeledSpan::at(span, "ignored")],
        "line {line}: stray identifier '{text}' is ignored",
    )
    .with_source_code(src.to_owned())
}
