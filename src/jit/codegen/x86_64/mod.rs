mod codegen;
mod instruction;
mod operand_encoding;
mod ops;
mod registers;

pub use self::codegen::X86_64Codegen;
