//! Assembler directives such as `.segment TEXT`.

use std::collections::BTreeMap;

use crate::{
    bits::{self, Signedness},
    diagnostic::ErrorKind,
};

use super::{
    parser::{Literal, parse_literal, split_word},
    state::PassState,
    syntax::Syntax,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveProcessor {
    /// `.segment NAME` selects the memory segment of the following lines.
    Segment,
    /// `.define NAME VALUE` registers a textual substitution.
    /// A name may not contain any of `illegal_tokens`.
    Define { illegal_tokens: Vec<String> },
    /// `.entry ADDRESS` records where execution starts.
    Entry,
    /// Accepted and consumed without effect.
    Ignored,
}

impl DirectiveProcessor {
    pub fn process(&self, value: &str, state: &mut PassState) -> Result<(), ErrorKind> {
        let value = value.trim();
        match self {
            DirectiveProcessor::Segment => {
                if value.is_empty() {
                    return Err(ErrorKind::MissingSegment);
                }
                state.segment = value
                    .parse()
                    .map_err(|()| ErrorKind::UnknownSegment(value.to_owned()))?;
                log::debug!("segment: {}", state.segment);
            }
            DirectiveProcessor::Define { illegal_tokens } => {
                let (name, replacement) = match split_word(value) {
                    Some((name, Some(replacement))) if !replacement.trim().is_empty() => {
                        (name, replacement.trim())
                    }
                    _ => return Err(ErrorKind::InvalidDefineFormat(value.to_owned())),
                };
                if let Some(token) = illegal_tokens
                    .iter()
                    .find(|token| !token.is_empty() && name.contains(token.as_str()))
                {
                    return Err(ErrorKind::IllegalDefineName {
                        name: name.to_owned(),
                        token: token.clone(),
                    });
                }
                log::debug!("define: {name} = {replacement}");
                state.defines.insert(name, replacement);
            }
            DirectiveProcessor::Entry => {
                let invalid = || ErrorKind::InvalidEntryAddress(value.to_owned());
                let address = match parse_literal(value) {
                    Some(Literal::Pattern(pattern)) => {
                        let address = bits::resize(&pattern, bits::ADDRESS_WIDTH, Signedness::Unsigned)
                            .map_err(|_| invalid())?;
                        bits::to_unsigned(&address) as u64
                    }
                    Some(Literal::Integer(value)) => u64::try_from(value).map_err(|_| invalid())?,
                    None => return Err(invalid()),
                };
                log::debug!("entry: {address:#x}");
                state.entry = Some(address);
            }
            DirectiveProcessor::Ignored => log::debug!("ignored directive: {value}"),
        }
        Ok(())
    }
}

/// Directive names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct DirectiveTable {
    directives: BTreeMap<String, DirectiveProcessor>,
}

impl DirectiveTable {
    /// `.segment`, `.define` and `.entry`, with define names checked
    /// against the markers of `syntax`. `.value` and `.string` are accepted
    /// but emit nothing.
    pub fn standard(syntax: &Syntax) -> Self {
        let mut table = DirectiveTable::default();
        table.insert("SEGMENT", DirectiveProcessor::Segment);
        table.insert(
            "DEFINE",
            DirectiveProcessor::Define {
                illegal_tokens: syntax.reserved_tokens(),
            },
        );
        table.insert("ENTRY", DirectiveProcessor::Entry);
        table.insert("VALUE", DirectiveProcessor::Ignored);
        table.insert("STRING", DirectiveProcessor::Ignored);
        table
    }

    pub fn insert(&mut self, name: &str, processor: DirectiveProcessor) {
        self.directives.insert(name.to_uppercase(), processor);
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveProcessor> {
        self.directives.get(&name.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::state::MemorySegment;

    fn run(name: &str, value: &str, state: &mut PassState) -> Result<(), ErrorKind> {
        DirectiveTable::standard(&Syntax::default())
            .get(name)
            .unwrap()
            .process(value, state)
    }

    #[test]
    fn segment() {
        let mut state = PassState::default();
        run("segment", " text ", &mut state).unwrap();
        assert_eq!(state.segment, MemorySegment::Text);
        assert_eq!(run("SEGMENT", "", &mut state), Err(ErrorKind::MissingSegment));
        assert_eq!(
            run("SEGMENT", "HEAP", &mut state),
            Err(ErrorKind::UnknownSegment("HEAP".to_owned()))
        );
        assert_eq!(state.segment, MemorySegment::Text);
    }

    #[test]
    fn define() {
        let mut state = PassState::default();
        run("define", "COUNT  #50 ", &mut state).unwrap();
        assert_eq!(state.defines.get("COUNT"), Some("#50"));
        run("define", "COUNT #51", &mut state).unwrap();
        assert_eq!(state.defines.get("COUNT"), Some("#51"));
        assert_eq!(
            run("define", "COUNT", &mut state),
            Err(ErrorKind::InvalidDefineFormat("COUNT".to_owned()))
        );
        assert_eq!(
            run("define", "$R #1", &mut state),
            Err(ErrorKind::IllegalDefineName {
                name: "$R".to_owned(),
                token: "$".to_owned(),
            })
        );
    }

    #[test]
    fn entry() {
        let mut state = PassState::default();
        run("ENTRY", "0x0000", &mut state).unwrap();
        assert_eq!(state.entry, Some(0));
        run("ENTRY", "256", &mut state).unwrap();
        assert_eq!(state.entry, Some(256));
        assert_eq!(
            run("ENTRY", "-4", &mut state),
            Err(ErrorKind::InvalidEntryAddress("-4".to_owned()))
        );
        assert_eq!(
            run("ENTRY", "start", &mut state),
            Err(ErrorKind::InvalidEntryAddress("start".to_owned()))
        );
    }

    #[test]
    fn data_directives_are_ignored() {
        let mut state = PassState::default();
        run("value", "0x1234", &mut state).unwrap();
        run("STRING", "\"hello\"", &mut state).unwrap();
        assert_eq!(state.pc, 0);
        assert!(state.defines.entries().is_empty());
    }

    #[test]
    fn unknown_directives_are_absent() {
        assert!(DirectiveTable::standard(&Syntax::default()).get("org").is_none());
    }
}
