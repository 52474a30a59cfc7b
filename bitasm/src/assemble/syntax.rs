//! Lexical conventions of the assembly language.

/// The markers recognised by the preprocessor and the operand encoders.
/// [`Syntax::default`] describes the standard dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub line_comment: String,
    pub block_comment_begin: String,
    pub block_comment_end: String,
    pub directive_prefix: char,
    pub label_suffix: char,
    pub register_prefix: char,
    pub immediate_prefix: char,
    pub operand_delimiter: char,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax {
            line_comment: ";".to_owned(),
            block_comment_begin: "/*".to_owned(),
            block_comment_end: "*/".to_owned(),
            directive_prefix: '.',
            label_suffix: ':',
            register_prefix: '$',
            immediate_prefix: '#',
            operand_delimiter: ',',
        }
    }
}

impl Syntax {
    /// Every marker of the dialect.
    /// None of these may appear inside a define name.
    pub fn reserved_tokens(&self) -> Vec<String> {
        let mut tokens = vec![
            self.line_comment.clone(),
            self.block_comment_begin.clone(),
            self.block_comment_end.clone(),
        ];
        tokens.extend(
            [
                self.directive_prefix,
                self.label_suffix,
                self.register_prefix,
                self.immediate_prefix,
                self.operand_delimiter,
            ]
            .map(String::from),
        );
        tokens
    }
}
