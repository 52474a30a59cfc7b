//! The two-pass assembler.
//!
//! Pass one runs every source line through the [`Preprocessor`], which
//! executes directives, binds labels to addresses and expands defines.
//! Pass two hands the surviving lines to the [`Synthesizer`], by which time
//! every label is known, so instructions may refer to labels defined later.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    bits::{self, Bits},
    diagnostic::Diagnostic,
    isa::{InstructionSet, IsaError, table},
};

pub mod directive;
pub mod parser;
pub mod preprocess;
pub mod state;
pub mod synth;
pub mod syntax;

use directive::DirectiveTable;
use preprocess::Preprocessor;
use state::{MemorySegment, PassState};
use synth::Synthesizer;
use syntax::Syntax;

/// One encoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledWord {
    /// Counted in instructions from the start of the program.
    pub address: u64,
    /// Zero-based index of the source line.
    pub line_number: usize,
    pub source: String,
    #[serde(serialize_with = "bits::serialize_bin")]
    pub bits: Bits,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblerOutput {
    pub words: Vec<AssembledWord>,
    pub labels: BTreeMap<String, u64>,
    pub defines: BTreeMap<String, String>,
    pub entry: Option<u64>,
    /// The segment active at the end of the source.
    pub segment: MemorySegment,
}

impl AssemblerOutput {
    /// Every word, concatenated in address order.
    pub fn bits(&self) -> Bits {
        let mut bits = Bits::new();
        for word in &self.words {
            bits.extend_from_bitslice(&word.bits);
        }
        bits
    }

    /// The program as big-endian bytes.
    /// A trailing partial byte is padded with zeros.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bits = self.bits();
        bits.set_uninitialized(false);
        bits.into_vec()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.words.iter().flat_map(|word| &word.warnings)
    }
}

#[derive(Debug)]
pub struct Assembler {
    preprocessor: Preprocessor,
    synthesizer: Synthesizer,
}

impl Assembler {
    pub fn new(preprocessor: Preprocessor, synthesizer: Synthesizer) -> Self {
        Assembler {
            preprocessor,
            synthesizer,
        }
    }

    /// The standard preprocessor and directives for `syntax`, encoding `instructions`.
    pub fn with_instructions(syntax: Syntax, instructions: InstructionSet) -> Self {
        let directives = DirectiveTable::standard(&syntax);
        Assembler::new(
            Preprocessor::standard(&syntax, directives),
            Synthesizer::new(instructions, syntax),
        )
    }

    /// The built-in 16-bit instruction set with the default syntax.
    pub fn standard() -> Result<Self, IsaError> {
        Ok(Assembler::with_instructions(
            Syntax::default(),
            table::instruction_set()?,
        ))
    }

    pub fn assemble(
        &mut self,
        src: &str,
        filename: Option<&str>,
    ) -> Result<AssemblerOutput, Diagnostic> {
        self.assemble_lines(&src.lines().collect::<Vec<_>>(), filename)
    }

    /// Assembles `lines`, stopping at the first error.
    pub fn assemble_lines(
        &mut self,
        lines: &[impl AsRef<str>],
        filename: Option<&str>,
    ) -> Result<AssemblerOutput, Diagnostic> {
        self.preprocessor.reset();
        let mut state = PassState::new(filename);

        let mut processed = Vec::with_capacity(lines.len());
        for line in lines {
            processed.push(self.preprocessor.process_line(line.as_ref(), &mut state)?);
            state.line_number += 1;
        }

        state.rewind();
        let mut words = Vec::new();
        for (line, source) in processed.iter().zip(lines) {
            let source = source.as_ref();
            if let Some(encoded) =
                self.synthesizer
                    .process_instruction(line.as_deref(), source, &state)?
            {
                words.push(AssembledWord {
                    address: state.pc,
                    line_number: state.line_number,
                    source: source.to_owned(),
                    bits: encoded.bits,
                    warnings: encoded.warnings,
                });
                state.pc += 1;
            }
            state.line_number += 1;
        }

        log::debug!(
            "assembled {} words with {} labels",
            words.len(),
            state.symbols.addresses().len()
        );
        Ok(AssemblerOutput {
            words,
            labels: state.symbols.addresses(),
            defines: state.defines.entries().clone(),
            entry: state.entry,
            segment: state.segment,
        })
    }
}

/// Assembles `src` for the built-in instruction set.
pub fn assemble(src: &str, filename: Option<&str>) -> Result<AssemblerOutput, Diagnostic> {
    Assembler::standard()?.assemble(src, filename)
}

/// Assembles pre-split source lines for the built-in instruction set.
pub fn assemble_lines(
    lines: &[impl AsRef<str>],
    filename: Option<&str>,
) -> Result<AssemblerOutput, Diagnostic> {
    Assembler::standard()?.assemble_lines(lines, filename)
}
