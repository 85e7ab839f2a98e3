use super::Assembler;

/*
    GNU as syntax for ARMv7, Linux EABI system calls (number in r7, `svc #0`).

    - r4: data pointer
    - r2: always 1, the length argument of read/write
    - r0, r1, r3: scratch

    Wide constants are built with movw/movt so nothing depends on a literal pool being in
    range.

    `arm-linux-gnueabihf-as prog.s -o prog.o && arm-linux-gnueabihf-ld prog.o -o prog`
*/

pub struct Arm32Assembler;

/// Largest offset `ldrb`/`strb` take as an immediate
const MAX_BYTE_OFFSET: i32 = 4095;

fn load_constant(register: &str, value: u32) -> String {
    if value <= 0xFF {
        format!("    mov {}, #{}\n", register, value)
    } else {
        format!(
            "    movw {reg}, #{low}\n    movt {reg}, #{high}\n",
            reg = register,
            low = value & 0xFFFF,
            high = value >> 16
        )
    }
}

fn move_pointer(instruction: &str, by: u32) -> String {
    if by <= 0xFF {
        format!("    {} r4, r4, #{}\n", instruction, by)
    } else {
        format!(
            "{}    {} r4, r4, r3\n",
            load_constant("r3", by),
            instruction
        )
    }
}

impl Assembler for Arm32Assembler {
    fn program_start(&self, tape_size: usize) -> String {
        format!(
            "    .bss\n\
             tape:\n    \
             .space {}\n\
             \n    \
             .text\n    \
             .global _start\n\
             _start:\n    \
             movw r4, #:lower16:tape\n    \
             movt r4, #:upper16:tape\n    \
             mov r2, #1\n",
            tape_size
        )
    }

    fn program_end(&self) -> String {
        "    mov r0, #0\n    mov r7, #1\n    svc #0\n".to_owned()
    }

    fn deref_add(&self, by: u8) -> String {
        format!(
            "    ldrb r0, [r4]\n    add r0, r0, #{}\n    strb r0, [r4]\n",
            by
        )
    }

    fn deref_sub(&self, by: u8) -> String {
        format!(
            "    ldrb r0, [r4]\n    sub r0, r0, #{}\n    strb r0, [r4]\n",
            by
        )
    }

    fn shift_right(&self, by: u32) -> String {
        move_pointer("add", by)
    }

    fn shift_left(&self, by: u32) -> String {
        move_pointer("sub", by)
    }

    fn write(&self) -> String {
        "    mov r0, #1\n    mov r1, r4\n    mov r7, #4\n    svc #0\n".to_owned()
    }

    fn read(&self) -> String {
        "    mov r0, #0\n    mov r1, r4\n    mov r7, #3\n    svc #0\n".to_owned()
    }

    fn jump_if_zero(&self, pc: usize, end: usize) -> String {
        format!(
            ".Lloop_{}:\n    ldrb r0, [r4]\n    cmp r0, #0\n    beq .Lloop_{}\n",
            pc, end
        )
    }

    fn jump_if_nonzero(&self, pc: usize, start: usize) -> String {
        format!(
            ".Lloop_{}:\n    ldrb r0, [r4]\n    cmp r0, #0\n    bne .Lloop_{}\n",
            pc, start
        )
    }

    fn clear(&self) -> String {
        "    mov r0, #0\n    strb r0, [r4]\n".to_owned()
    }

    fn transfer(&self, pc: usize, offset: i32) -> String {
        let mut text = format!(
            "    ldrb r0, [r4]\n    cmp r0, #0\n    beq .Lskip_{}\n",
            pc
        );

        if (-MAX_BYTE_OFFSET..=MAX_BYTE_OFFSET).contains(&offset) {
            text.push_str(&format!(
                "    ldrb r1, [r4, #{offset}]\n    \
                 add r1, r1, r0\n    \
                 strb r1, [r4, #{offset}]\n",
                offset = offset
            ));
        } else {
            // two's complement so the register add also moves left
            text.push_str(&load_constant("r3", offset as u32));
            text.push_str("    ldrb r1, [r4, r3]\n    add r1, r1, r0\n    strb r1, [r4, r3]\n");
        }

        text.push_str(&format!(
            "    mov r0, #0\n    strb r0, [r4]\n.Lskip_{}:\n",
            pc
        ));
        text
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn small_moves_use_immediates() {
        let assembler = Arm32Assembler;
        assert_eq!(assembler.shift_right(3), "    add r4, r4, #3\n");
        assert_eq!(assembler.shift_left(255), "    sub r4, r4, #255\n");
    }

    #[test]
    fn wide_moves_build_the_constant() {
        let assembler = Arm32Assembler;
        assert_eq!(
            assembler.shift_right(0x12345),
            "    movw r3, #9029\n    movt r3, #1\n    add r4, r4, r3\n"
        );
    }

    #[test]
    fn far_transfers_use_a_register_offset() {
        let assembler = Arm32Assembler;
        let near = assembler.transfer(2, -1);
        assert!(near.contains("ldrb r1, [r4, #-1]"));
        assert!(near.ends_with(".Lskip_2:\n"));

        let far = assembler.transfer(2, -5000);
        assert!(far.contains("movw r3, #60536\n    movt r3, #65535\n"));
        assert!(far.contains("strb r1, [r4, r3]"));
    }

    #[test]
    fn io_goes_through_svc() {
        let assembler = Arm32Assembler;
        assert!(assembler.write().contains("mov r7, #4"));
        assert!(assembler.read().contains("mov r7, #3"));
        assert!(assembler.program_end().contains("mov r7, #1"));
    }
}
