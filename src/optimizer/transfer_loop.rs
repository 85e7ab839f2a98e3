use crate::bytecode::ByteCode;

/// `[->+<]` and friends: add the current cell onto a neighbour and zero it.
///
/// Accepts the decrement either first or last and the pointer moving either way, as long
/// as both moves have the same distance and both cell changes are exactly one.
pub fn transfer_loop(span: &[ByteCode]) -> Option<ByteCode> {
    let [ByteCode::JumpIfZero(_), body @ .., ByteCode::JumpIfNonZero(_)] = span else {
        return None;
    };

    let offset = match *body {
        [ByteCode::DerefSub(1), ByteCode::ShiftRight(there), ByteCode::DerefAdd(1), ByteCode::ShiftLeft(back)]
        | [ByteCode::ShiftRight(there), ByteCode::DerefAdd(1), ByteCode::ShiftLeft(back), ByteCode::DerefSub(1)]
            if there == back =>
        {
            i32::try_from(there).ok()?
        }
        [ByteCode::DerefSub(1), ByteCode::ShiftLeft(there), ByteCode::DerefAdd(1), ByteCode::ShiftRight(back)]
        | [ByteCode::ShiftLeft(there), ByteCode::DerefAdd(1), ByteCode::ShiftRight(back), ByteCode::DerefSub(1)]
            if there == back =>
        {
            -i32::try_from(there).ok()?
        }
        _ => return None,
    };

    Some(ByteCode::Transfer(offset))
}
