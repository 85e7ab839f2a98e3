use super::Assembler;

/*
    NASM syntax, Linux system calls.

    - RSI: data pointer, doubles as the buffer argument of read/write
    - RDX: always 1, the length argument of read/write
    - AL: scratch for transfers

    `nasm -f elf64 prog.asm && ld prog.o -o prog`
*/

pub struct X86_64Assembler;

impl Assembler for X86_64Assembler {
    fn program_start(&self, tape_size: usize) -> String {
        format!(
            "section .bss\n\
             tape: resb {}\n\
             \n\
             section .text\n\
             global _start\n\
             _start:\n    \
             mov rsi, tape\n    \
             mov edx, 1\n",
            tape_size
        )
    }

    fn program_end(&self) -> String {
        "    mov eax, 60\n    xor edi, edi\n    syscall\n".to_owned()
    }

    fn deref_add(&self, by: u8) -> String {
        format!("    add byte [rsi], {}\n", by)
    }

    fn deref_sub(&self, by: u8) -> String {
        format!("    sub byte [rsi], {}\n", by)
    }

    fn shift_right(&self, by: u32) -> String {
        format!("    add rsi, {}\n", by)
    }

    fn shift_left(&self, by: u32) -> String {
        format!("    sub rsi, {}\n", by)
    }

    fn write(&self) -> String {
        "    mov eax, 1\n    mov edi, 1\n    syscall\n".to_owned()
    }

    fn read(&self) -> String {
        "    xor eax, eax\n    xor edi, edi\n    syscall\n".to_owned()
    }

    fn jump_if_zero(&self, pc: usize, end: usize) -> String {
        format!(
            ".loop_{}:\n    cmp byte [rsi], 0\n    je .loop_{}\n",
            pc, end
        )
    }

    fn jump_if_nonzero(&self, pc: usize, start: usize) -> String {
        format!(
            ".loop_{}:\n    cmp byte [rsi], 0\n    jne .loop_{}\n",
            pc, start
        )
    }

    fn clear(&self) -> String {
        "    mov byte [rsi], 0\n".to_owned()
    }

    fn transfer(&self, pc: usize, offset: i32) -> String {
        format!(
            "    mov al, [rsi]\n    \
             cmp al, 0\n    \
             je .skip_{pc}\n    \
             add [rsi{offset:+}], al\n    \
             mov byte [rsi], 0\n\
             .skip_{pc}:\n",
            pc = pc,
            offset = offset
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{codegen::assemble, codegen::Architecture, parser::parser::tests::parse};

    #[test]
    fn writes_a_whole_program() {
        let program = parse("++.", true).unwrap();
        assert_eq!(
            assemble(&program, Architecture::X86_64, 30_000),
            "section .bss\n\
             tape: resb 30000\n\
             \n\
             section .text\n\
             global _start\n\
             _start:\n    \
             mov rsi, tape\n    \
             mov edx, 1\n    \
             add byte [rsi], 2\n    \
             mov eax, 1\n    \
             mov edi, 1\n    \
             syscall\n    \
             mov eax, 60\n    \
             xor edi, edi\n    \
             syscall\n"
        );
    }

    #[test]
    fn loops_test_the_cell_at_both_ends() {
        let assembler = X86_64Assembler;
        assert_eq!(
            assembler.jump_if_zero(3, 9),
            ".loop_3:\n    cmp byte [rsi], 0\n    je .loop_9\n"
        );
        assert_eq!(
            assembler.jump_if_nonzero(9, 3),
            ".loop_9:\n    cmp byte [rsi], 0\n    jne .loop_3\n"
        );
    }

    #[test]
    fn transfer_offsets_are_signed() {
        let assembler = X86_64Assembler;
        assert!(assembler.transfer(4, -2).contains("add [rsi-2], al"));
        assert!(assembler.transfer(4, 3).contains("add [rsi+3], al"));
        assert!(assembler.transfer(4, 3).ends_with(".skip_4:\n"));
    }
}
