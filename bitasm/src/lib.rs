pub mod assemble;
pub mod bits;
pub mod diagnostic;
pub mod isa;


pub use assemble::{AssembledWord, Assembler, AssemblerOutput, assemble, assemble_lines};
pub use diagnostic::{Diagnostic, ErrorKind, Severity};
