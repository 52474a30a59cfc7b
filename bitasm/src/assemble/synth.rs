//! The second pass: turns preprocessed instruction lines into machine words.

use crate::{
    bits,
    diagnostic::{Diagnostic, ErrorKind, SourceContext},
    isa::{Encoded, InstructionSet},
};

use super::{parser::split_word, state::PassState, syntax::Syntax};

#[derive(Debug, Clone)]
pub struct Synthesizer {
    instructions: InstructionSet,
    syntax: Syntax,
}

impl Synthesizer {
    pub fn new(instructions: InstructionSet, syntax: Syntax) -> Self {
        Synthesizer {
            instructions,
            syntax,
        }
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    /// Encodes one preprocessed line.
    ///
    /// `source_line` is the line as written, used only in diagnostics.
    /// Returns `None` if the line held no instruction.
    pub fn process_instruction(
        &self,
        line: Option<&str>,
        source_line: &str,
        state: &PassState,
    ) -> Result<Option<Encoded>, Diagnostic> {
        let Some(line) = line.filter(|line| !line.is_empty()) else {
            return Ok(None);
        };
        let context = SourceContext {
            filename: state.filename.as_deref(),
            line_number: Some(state.line_number),
            line: Some(source_line),
            token: Some(line),
        };
        let mut encoded = self.encode(line, state).map_err(|err| err.enrich(context))?;
        encoded.warnings = encoded
            .warnings
            .into_iter()
            .map(|warning| warning.enrich(context))
            .collect();
        log::debug!(
            "{:<20} -> {} (0x{})",
            line,
            bits::to_bin(&encoded.bits),
            bits::to_hex(&encoded.bits)
        );
        Ok(Some(encoded))
    }

    fn encode(&self, line: &str, state: &PassState) -> Result<Encoded, Diagnostic> {
        let (mnemonic, operands) = split_word(line)
            .ok_or_else(|| ErrorKind::UnknownInstructionFormat(line.to_owned()))?;
        let instruction = self.instructions.get(mnemonic).ok_or_else(|| {
            Diagnostic::from(ErrorKind::UnknownOpcode(mnemonic.to_owned())).at_token(mnemonic)
        })?;
        instruction.process_str(
            operands.unwrap_or_default(),
            state,
            &self.syntax,
            self.instructions.storage_unit(),
        )
    }
}
