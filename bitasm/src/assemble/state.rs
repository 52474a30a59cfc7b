//! State shared by every task and processor during one assembly run.

use std::{borrow::Cow, collections::BTreeMap, fmt::Display, str::FromStr};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::{
    bits::{self, ADDRESS_WIDTH, Bits},
    diagnostic::ErrorKind,
};

/// The logical memory region that subsequent lines belong to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemorySegment {
    Data,
    Text,
    #[default]
    None,
}

impl FromStr for MemorySegment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DATA" => Ok(MemorySegment::Data),
            "TEXT" => Ok(MemorySegment::Text),
            "NONE" => Ok(MemorySegment::None),
            _ => Err(()),
        }
    }
}

impl Display for MemorySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySegment::Data => write!(f, "DATA"),
            MemorySegment::Text => write!(f, "TEXT"),
            MemorySegment::None => write!(f, "NONE"),
        }
    }
}

/// Labels and the addresses they were bound to.
/// A label can be bound exactly once per run.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Bits>,
}

impl SymbolTable {
    pub fn define(&mut self, name: &str, address: u64) -> Result<(), ErrorKind> {
        if self.symbols.contains_key(name) {
            return Err(ErrorKind::DuplicateLabel(name.to_owned()));
        }
        self.symbols.insert(
            name.to_owned(),
            bits::from_unsigned(u128::from(address), ADDRESS_WIDTH),
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Bits> {
        self.symbols.get(name)
    }

    /// Every label with its address.
    pub fn addresses(&self) -> BTreeMap<String, u64> {
        self.symbols
            .iter()
            .map(|(name, value)| (name.clone(), bits::to_unsigned(value) as u64))
            .collect()
    }
}

/// Textual substitutions registered with `.define`.
///
/// The whole-word matcher is derived from the current entries and rebuilt
/// lazily after every change, so it always reflects the defines seen so far.
#[derive(Debug, Default, Clone)]
pub struct DefineTable {
    entries: BTreeMap<String, String>,
    matcher: Option<Regex>,
}

impl DefineTable {
    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries.insert(name.to_owned(), value.to_owned());
        self.matcher = None;
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Replaces every whole-word occurrence of a define name in `line`.
    pub fn substitute<'a>(&mut self, line: &'a str) -> Result<Cow<'a, str>, ErrorKind> {
        if self.entries.is_empty() {
            return Ok(Cow::Borrowed(line));
        }
        if self.matcher.is_none() {
            self.matcher = Some(self.build_matcher()?);
        }
        let Some(matcher) = &self.matcher else {
            return Ok(Cow::Borrowed(line));
        };
        let entries = &self.entries;
        Ok(matcher.replace_all(line, |captures: &Captures<'_>| {
            entries
                .get(&captures[1])
                .cloned()
                .unwrap_or_else(|| captures[0].to_owned())
        }))
    }

    fn build_matcher(&self) -> Result<Regex, ErrorKind> {
        // Longest names first, so that a name is never shadowed by its own prefix.
        let mut names = self.entries.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation = names
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"\b{{start-half}}({alternation})\b{{end-half}}"))
            .map_err(|err| ErrorKind::DefineMatcher(err.to_string()))
    }
}

/// The mutable context of one assembly run.
#[derive(Debug, Default, Clone)]
pub struct PassState {
    pub filename: Option<String>,
    /// Zero-based index of the source line being processed.
    pub line_number: usize,
    /// Address of the next instruction, counted in instructions.
    pub pc: u64,
    pub segment: MemorySegment,
    /// Set by the `.entry` directive.
    pub entry: Option<u64>,
    pub symbols: SymbolTable,
    pub defines: DefineTable,
}

impl PassState {
    pub fn new(filename: Option<&str>) -> Self {
        PassState {
            filename: filename.map(str::to_owned),
            ..Default::default()
        }
    }

    pub fn symbol(&self, name: &str) -> Option<&Bits> {
        self.symbols.get(name)
    }

    /// Rewinds the location counters for the next pass.
    /// Tables built by earlier passes are kept.
    pub fn rewind(&mut self) {
        self.line_number = 0;
        self.pc = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_parse_case_insensitively() {
        assert_eq!("text".parse(), Ok(MemorySegment::Text));
        assert_eq!("Data".parse(), Ok(MemorySegment::Data));
        assert_eq!("NONE".parse(), Ok(MemorySegment::None));
        assert_eq!("heap".parse::<MemorySegment>(), Err(()));
    }

    #[test]
    fn labels_are_bound_once() {
        let mut symbols = SymbolTable::default();
        symbols.define("LOOP", 3).unwrap();
        assert_eq!(
            symbols.define("LOOP", 5),
            Err(ErrorKind::DuplicateLabel("LOOP".to_owned()))
        );
        assert_eq!(symbols.addresses().get("LOOP"), Some(&3));
        assert_eq!(symbols.get("LOOP").map(|bits| bits.len()), Some(ADDRESS_WIDTH));
    }

    #[test]
    fn substitutes_whole_words_only() {
        let mut defines = DefineTable::default();
        defines.insert("ONE", "#1");
        defines.insert("ONE_MORE", "#2");
        assert_eq!(
            defines.substitute("ADDI $0, $0, ONE").unwrap(),
            "ADDI $0, $0, #1"
        );
        assert_eq!(
            defines.substitute("ADDI $0, $0, ONE_MORE").unwrap(),
            "ADDI $0, $0, #2"
        );
        assert_eq!(defines.substitute("NONE").unwrap(), "NONE");
    }

    #[test]
    fn names_may_begin_or_end_with_punctuation() {
        let mut defines = DefineTable::default();
        defines.insert("@PORT", "#3");
        defines.insert("X+", "#4");
        assert_eq!(defines.substitute("LBI $0, @PORT").unwrap(), "LBI $0, #3");
        assert_eq!(defines.substitute("LBI $0, X+").unwrap(), "LBI $0, #4");
        assert_eq!(defines.substitute("LBI $0, X+Y").unwrap(), "LBI $0, X+Y");
        assert_eq!(defines.substitute("LBI $0, A@PORT").unwrap(), "LBI $0, A@PORT");
    }

    #[test]
    fn later_defines_are_visible() {
        let mut defines = DefineTable::default();
        defines.insert("A", "#1");
        assert_eq!(defines.substitute("J B").unwrap(), "J B");
        defines.insert("B", "#2");
        assert_eq!(defines.substitute("J B").unwrap(), "J #2");
    }
}
