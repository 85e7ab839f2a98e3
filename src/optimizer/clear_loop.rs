use crate::bytecode::ByteCode;

/// `[-]` / `[+]` always ends with the cell at zero so it becomes a single `Clear`.
///
/// `span` covers the whole loop including both brackets.  Only odd steps are contracted,
/// an even step never reaches zero from an odd value so that loop has to stay a loop.
pub fn clear_loop(span: &[ByteCode]) -> Option<ByteCode> {
    match span {
        [ByteCode::JumpIfZero(_), ByteCode::DerefAdd(step) | ByteCode::DerefSub(step), ByteCode::JumpIfNonZero(_)]
            if step % 2 == 1 =>
        {
            Some(ByteCode::Clear)
        }
        _ => None,
    }
}
