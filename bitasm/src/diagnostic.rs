//! Diagnostics produced while assembling.
//!
//! A [`Diagnostic`] starts life as a bare [`ErrorKind`] deep inside an
//! operand encoder and picks up its token, source line, line number and
//! filename as it travels back up to the assembler. Each layer calls
//! [`Diagnostic::enrich`], which only fills fields that are still unset.

use std::fmt::Display;

use serde::Serialize;
use thiserror::Error;

use crate::{bits::Signedness, isa::IsaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warn,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ErrorKind {
    #[error("Invalid assembler directive format '{0}'. Expected '.NAME VALUE'.")]
    InvalidDirectiveFormat(String),
    #[error("Invalid define '{0}'. Expected 'NAME VALUE' after directive token '.define'.")]
    InvalidDefineFormat(String),
    #[error("Unknown instruction format '{0}'. Expected opcode, operands.")]
    UnknownInstructionFormat(String),
    #[error("Unknown format specifier '{found}' for operand of type '{kind}'. Expected '{expected}'.")]
    UnknownFormatSpecifier {
        found: char,
        kind: &'static str,
        expected: char,
    },
    #[error("Unexpected additional token '{token}' found for operand of type '{kind}'.")]
    UnexpectedToken { token: String, kind: &'static str },
    #[error("Expected a label name before '{0}'.")]
    EmptyLabel(char),

    #[error("Failed to resolve instruction '{0}'. Bad opcode or bad instruction format.")]
    UnknownOpcode(String),
    #[error("Unknown CPU register '{0}'.")]
    UnknownRegister(String),
    #[error("Unknown CPU register symbol '{0}'.")]
    UnknownRegisterSymbol(String),
    #[error("Invalid assembler directive name '{0}'.")]
    UnknownDirective(String),
    #[error("Invalid memory segment '{0}' specified.")]
    UnknownSegment(String),
    #[error("Expected memory segment after directive token '.segment'.")]
    MissingSegment,
    #[error("Undefined symbol '{0}'.")]
    UndefinedSymbol(String),

    #[error("Value '{value}' is too large to be represented as a {width}-bit {signedness} integer.")]
    Overflow {
        value: String,
        width: usize,
        signedness: Signedness,
    },
    #[error("Literal '{literal}' is not a valid immediate of type '{width}-bit {signedness} integer'.")]
    InvalidImmediate {
        literal: String,
        width: usize,
        signedness: Signedness,
    },
    #[error("Invalid entry address '{0}'. Expected an unsigned integer literal.")]
    InvalidEntryAddress(String),

    #[error(
        "Unexpected operand '{operand}' at position {position} for instruction of type '{mnemonic}'. Expected {expected} operands, but {provided} were provided."
    )]
    UnexpectedOperand {
        operand: String,
        position: usize,
        mnemonic: String,
        expected: usize,
        provided: usize,
    },
    #[error(
        "Expected operand '{name}' at position {position} for instruction of type '{mnemonic}'. Expected {expected} operands, only {provided} were provided."
    )]
    MissingOperand {
        name: String,
        position: usize,
        mnemonic: String,
        expected: usize,
        provided: usize,
    },
    #[error("Unexpected operand '{0}' for an implicit field.")]
    UnexpectedImplicitOperand(String),

    #[error("Illegal token '{token}' in define name '{name}'.")]
    IllegalDefineName { name: String, token: String },
    #[error("Unexpected symbol '{0}' provided for operand. Operand does not support symbols.")]
    SymbolNotPermitted(String),
    #[error("Label '{0}' is already defined.")]
    DuplicateLabel(String),
    #[error("Could not build the define matcher: {0}")]
    DefineMatcher(String),

    #[error(
        "Literal '{literal}' sets the sign bit of a {width}-bit signed immediate and is encoded as {value}."
    )]
    SignBitLiteral {
        literal: String,
        width: usize,
        value: i128,
    },

    #[error("Invalid instruction set: {0}")]
    Isa(#[from] IsaError),
}

/// Location information a layer knows about while a diagnostic passes through it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceContext<'a> {
    pub filename: Option<&'a str>,
    pub line_number: Option<usize>,
    pub line: Option<&'a str>,
    pub token: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub filename: Option<String>,
    /// Zero-based.
    pub line_number: Option<usize>,
    pub line: Option<String>,
    pub token: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind) -> Self {
        Self::new(Severity::Error, kind)
    }

    pub fn warning(kind: ErrorKind) -> Self {
        Self::new(Severity::Warn, kind)
    }

    fn new(severity: Severity, kind: ErrorKind) -> Self {
        Diagnostic {
            severity,
            kind,
            filename: None,
            line_number: None,
            line: None,
            token: None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Fills every field that is still unset from `context`.
    /// Fields that are already set are never overwritten.
    #[must_use]
    pub fn enrich(mut self, context: SourceContext<'_>) -> Self {
        fn fill(field: &mut Option<String>, value: Option<&str>) {
            if field.is_none() {
                *field = value.map(str::to_owned);
            }
        }
        fill(&mut self.filename, context.filename);
        fill(&mut self.line, context.line);
        fill(&mut self.token, context.token);
        if self.line_number.is_none() {
            self.line_number = context.line_number;
        }
        self
    }

    /// Shorthand for enriching only the offending token.
    #[must_use]
    pub fn at_token(self, token: &str) -> Self {
        self.enrich(SourceContext {
            token: Some(token),
            ..Default::default()
        })
    }
}

impl From<ErrorKind> for Diagnostic {
    fn from(kind: ErrorKind) -> Self {
        Diagnostic::error(kind)
    }
}

impl From<IsaError> for Diagnostic {
    fn from(err: IsaError) -> Self {
        Diagnostic::error(ErrorKind::Isa(err))
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}:\nWHAT: {}",
            self.filename.as_deref().unwrap_or("<source>"),
            self.line_number.map_or(0, |line| line + 1),
            self.severity,
            self.kind
        )?;
        match (&self.token, &self.line) {
            (Some(token), Some(line)) => write!(f, "\nWHERE: at token '{token}' in line '{line}'"),
            (Some(token), None) => write!(f, "\nWHERE: at token '{token}'"),
            (None, Some(line)) => write!(f, "\nWHERE: in line '{line}'"),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for Diagnostic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
