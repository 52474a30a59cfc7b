//! The first pass: a chain of tasks that clean up each source line,
//! execute directives and bind labels.
//!
//! A line that makes it through every task is an instruction and occupies
//! one address. Any task may consume a line by returning `None`.

use std::fmt::Debug;

use crate::diagnostic::{Diagnostic, ErrorKind, SourceContext};

use super::{directive::DirectiveTable, parser::split_word, state::PassState, syntax::Syntax};

pub trait PreprocessorTask: Debug {
    /// Clears any state carried between lines.
    fn reset(&mut self) {}

    fn process_line(
        &mut self,
        line: String,
        state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic>;
}

/// Removes line comments and block comments.
/// Block comments may span several lines.
#[derive(Debug)]
pub struct StripComments {
    line_comment: String,
    block_begin: String,
    block_end: String,
    in_block: bool,
}

impl StripComments {
    pub fn new(syntax: &Syntax) -> Self {
        StripComments {
            line_comment: syntax.line_comment.clone(),
            block_begin: syntax.block_comment_begin.clone(),
            block_end: syntax.block_comment_end.clone(),
            in_block: false,
        }
    }

    fn find(haystack: &str, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            None
        } else {
            haystack.find(needle)
        }
    }
}

impl PreprocessorTask for StripComments {
    fn reset(&mut self) {
        self.in_block = false;
    }

    fn process_line(
        &mut self,
        line: String,
        _state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let mut output = String::with_capacity(line.len());
        let mut rest = line.as_str();
        loop {
            if self.in_block {
                match Self::find(rest, &self.block_end) {
                    Some(end) => {
                        rest = &rest[end + self.block_end.len()..];
                        self.in_block = false;
                        output.push(' ');
                    }
                    None => break,
                }
            } else {
                let comment = Self::find(rest, &self.line_comment);
                match Self::find(rest, &self.block_begin) {
                    Some(begin) if comment.is_none_or(|comment| begin < comment) => {
                        output.push_str(&rest[..begin]);
                        rest = &rest[begin + self.block_begin.len()..];
                        self.in_block = true;
                    }
                    _ => {
                        output.push_str(&rest[..comment.unwrap_or(rest.len())]);
                        break;
                    }
                }
            }
        }
        Ok(Some(output))
    }
}

/// Trims each line, consuming lines left empty.
#[derive(Debug, Default)]
pub struct StripWhitespace;

impl PreprocessorTask for StripWhitespace {
    fn process_line(
        &mut self,
        line: String,
        _state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else if trimmed.len() == line.len() {
            Ok(Some(line))
        } else {
            Ok(Some(trimmed.to_owned()))
        }
    }
}

/// Runs and consumes `.NAME VALUE` lines.
#[derive(Debug)]
pub struct ExecuteDirectives {
    prefix: char,
    directives: DirectiveTable,
}

impl ExecuteDirectives {
    pub fn new(prefix: char, directives: DirectiveTable) -> Self {
        ExecuteDirectives { prefix, directives }
    }
}

impl PreprocessorTask for ExecuteDirectives {
    fn process_line(
        &mut self,
        line: String,
        state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let Some(body) = line.strip_prefix(self.prefix) else {
            return Ok(Some(line));
        };
        let Some((name, Some(value))) = split_word(body) else {
            return Err(ErrorKind::InvalidDirectiveFormat(line.clone()).into());
        };
        let directive = self.directives.get(name).ok_or_else(|| {
            Diagnostic::from(ErrorKind::UnknownDirective(name.to_owned())).at_token(name)
        })?;
        directive
            .process(value, state)
            .map_err(|kind| Diagnostic::from(kind).at_token(value.trim()))?;
        Ok(None)
    }
}

/// Binds `NAME:` lines to the address of the next instruction.
#[derive(Debug)]
pub struct CaptureLabels {
    suffix: char,
}

impl CaptureLabels {
    pub fn new(suffix: char) -> Self {
        CaptureLabels { suffix }
    }
}

impl PreprocessorTask for CaptureLabels {
    fn process_line(
        &mut self,
        line: String,
        state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let Some(name) = line.strip_suffix(self.suffix) else {
            return Ok(Some(line));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ErrorKind::EmptyLabel(self.suffix).into());
        }
        state
            .symbols
            .define(name, state.pc)
            .map_err(|kind| Diagnostic::from(kind).at_token(name))?;
        log::debug!("label {name} = {}", state.pc);
        Ok(None)
    }
}

/// Expands defines seen so far.
#[derive(Debug, Default)]
pub struct SubstituteDefines;

impl PreprocessorTask for SubstituteDefines {
    fn process_line(
        &mut self,
        line: String,
        state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let substituted = state.defines.substitute(&line)?.into_owned();
        Ok(Some(substituted))
    }
}

#[derive(Debug)]
pub struct Preprocessor {
    tasks: Vec<Box<dyn PreprocessorTask>>,
}

impl Preprocessor {
    pub fn new(tasks: Vec<Box<dyn PreprocessorTask>>) -> Self {
        Preprocessor { tasks }
    }

    /// Comments, whitespace, directives, labels, then defines.
    pub fn standard(syntax: &Syntax, directives: DirectiveTable) -> Self {
        Preprocessor::new(vec![
            Box::new(StripComments::new(syntax)),
            Box::new(StripWhitespace),
            Box::new(ExecuteDirectives::new(syntax.directive_prefix, directives)),
            Box::new(CaptureLabels::new(syntax.label_suffix)),
            Box::new(SubstituteDefines),
        ])
    }

    pub fn reset(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
    }

    /// Runs `line` through every task.
    /// Returns the instruction text, or `None` if the line was consumed.
    pub fn process_line(
        &mut self,
        line: &str,
        state: &mut PassState,
    ) -> Result<Option<String>, Diagnostic> {
        let mut current = line.to_owned();
        for task in &mut self.tasks {
            match task.process_line(current, state) {
                Ok(Some(next)) if !next.is_empty() => current = next,
                Ok(_) => {
                    log::trace!("{}: consumed '{line}'", state.line_number + 1);
                    return Ok(None);
                }
                Err(err) => {
                    return Err(err.enrich(SourceContext {
                        filename: state.filename.as_deref(),
                        line_number: Some(state.line_number),
                        line: Some(line),
                        token: None,
                    }));
                }
            }
        }
        log::trace!("{}: {:#06x} '{current}'", state.line_number + 1, state.pc);
        state.pc += 1;
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::state::MemorySegment;

    fn standard() -> Preprocessor {
        let syntax = Syntax::default();
        Preprocessor::standard(&syntax, DirectiveTable::standard(&syntax))
    }

    fn run(lines: &[&str]) -> Result<(Vec<String>, PassState), Diagnostic> {
        let mut preprocessor = standard();
        let mut state = PassState::default();
        let mut output = Vec::new();
        for line in lines {
            if let Some(line) = preprocessor.process_line(line, &mut state)? {
                output.push(line);
            }
            state.line_number += 1;
        }
        Ok((output, state))
    }

    fn strip(comments: &mut StripComments, line: &str) -> String {
        comments
            .process_line(line.to_owned(), &mut PassState::default())
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn strips_line_comments() {
        let mut comments = StripComments::new(&Syntax::default());
        assert_eq!(strip(&mut comments, "NOP ; comment"), "NOP ");
        assert_eq!(strip(&mut comments, "; one ; two"), "");
        assert_eq!(strip(&mut comments, "NOP;weird"), "NOP");
    }

    #[test]
    fn keeps_text_around_block_comments() {
        let mut comments = StripComments::new(&Syntax::default());
        assert_eq!(strip(&mut comments, "/* before */ NOP /* after */").trim(), "NOP");
        assert_eq!(strip(&mut comments, "NOP /* multi").trim(), "NOP");
        assert_eq!(strip(&mut comments, "NOP ; still inside"), "");
        assert_eq!(strip(&mut comments, "end */ HALT ; done").trim(), "HALT");
        assert_eq!(strip(&mut comments, "/* a ; b */ NOP").trim(), "NOP");

        comments.process_line("/*".to_owned(), &mut PassState::default()).unwrap();
        comments.reset();
        assert_eq!(strip(&mut comments, "HALT"), "HALT");
    }

    #[test]
    fn stripping_is_idempotent() {
        let mut comments = StripComments::new(&Syntax::default());
        for line in ["NOP", "ADDI $0, $1, #2", "  J LOOP  "] {
            let once = strip(&mut comments, line);
            assert_eq!(strip(&mut comments, &once), once);
        }
    }

    #[test]
    fn consumed_lines_do_not_advance_the_pc() {
        let (lines, state) = run(&[
            ".segment text",
            "",
            "START:",
            "NOP",
            "  /* skipped */  ",
            "LOOP:",
            "J LOOP",
        ])
        .unwrap();
        assert_eq!(lines, ["NOP", "J LOOP"]);
        assert_eq!(state.pc, 2);
        assert_eq!(state.segment, MemorySegment::Text);
        assert_eq!(state.symbols.addresses().get("START"), Some(&0));
        assert_eq!(state.symbols.addresses().get("LOOP"), Some(&1));
    }

    #[test]
    fn substitutes_defines_declared_earlier() {
        let (lines, _) = run(&["LBI $0, COUNT", ".define COUNT #50", "LBI $1, COUNT"]).unwrap();
        assert_eq!(lines, ["LBI $0, COUNT", "LBI $1, #50"]);
    }

    #[test]
    fn directive_errors_name_the_directive() {
        let err = run(&["NOP", ".origin 4"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownDirective("origin".to_owned()));
        assert_eq!(err.token.as_deref(), Some("origin"));
        assert_eq!(err.line_number, Some(1));
        assert_eq!(err.line.as_deref(), Some(".origin 4"));

        let err = run(&[".segment"]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::InvalidDirectiveFormat(".segment".to_owned())
        );
    }

    #[test]
    fn label_errors() {
        assert_eq!(run(&[" :"]).unwrap_err().kind, ErrorKind::EmptyLabel(':'));
        let err = run(&["A:", "NOP", "A:"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateLabel("A".to_owned()));
        assert_eq!(err.line_number, Some(2));
    }
}
