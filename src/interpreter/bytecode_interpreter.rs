use std::io::Write;

use log::{debug, warn};

use crate::bytecode::{ByteCode, Program};

use super::{PointerFault, Runtime, RuntimeError};

/// Walks a `Program` one instruction at a time.
///
/// This is the checked path: every pointer move is bounds checked and an optional cycle
/// limit is enforced.  With a trace attached every executed instruction gets one line.
pub struct ByteCodeInterpreter<'a> {
    cycle_limit: Option<u64>,
    trace: Option<Box<dyn Write + 'a>>,
    /// everything written so far, only kept for the trace
    output: Vec<u8>,
}

impl<'a> ByteCodeInterpreter<'a> {
    pub fn new() -> Self {
        Self {
            cycle_limit: None,
            trace: None,
            output: vec![],
        }
    }

    /// 0 means unlimited
    pub fn with_cycle_limit(mut self, limit: u64) -> Self {
        self.cycle_limit = (limit > 0).then_some(limit);
        self
    }

    pub fn with_trace(mut self, trace: Box<dyn Write + 'a>) -> Self {
        self.trace = Some(trace);
        self
    }

    fn log(&mut self, pc: usize, message: std::fmt::Arguments) -> Result<(), RuntimeError> {
        if let Some(trace) = self.trace.as_mut() {
            writeln!(trace, "[PC {}]: {}", pc, message)?;
        }
        Ok(())
    }

    fn fault(&mut self, pc: usize, fault: PointerFault) -> RuntimeError {
        // the error itself is what gets reported, a broken trace shouldn't hide it
        if let Err(e) = self.log(pc, format_args!("{}.", fault)) {
            warn!("couldn't write trace: {}", e);
        }
        RuntimeError::Pointer { pc, fault }
    }

    pub fn run(&mut self, runtime: &mut Runtime, program: &Program) -> Result<(), RuntimeError> {
        let result = self.execute(runtime, program);
        runtime.flush()?;

        if let Some(trace) = self.trace.as_mut() {
            writeln!(
                trace,
                "Total output: {}",
                String::from_utf8_lossy(&self.output)
            )?;
            trace.flush()?;
        }

        result
    }

    fn execute(&mut self, runtime: &mut Runtime, program: &Program) -> Result<(), RuntimeError> {
        let instructions = program.instructions();
        let mut cycles: u64 = 0;
        let mut pc = 0;

        while pc < instructions.len() {
            cycles += 1;
            if let Some(limit) = self.cycle_limit {
                if cycles > limit {
                    return Err(RuntimeError::CycleLimitExceeded { limit });
                }
            }

            let at = runtime.data_pointer();
            match instructions[pc] {
                ByteCode::DerefAdd(i) => {
                    let from = runtime.value();
                    runtime.deref_and_add_value(i);
                    self.log(
                        pc,
                        format_args!(
                            "Increased value at {} from {} to {}.",
                            at,
                            from,
                            runtime.value()
                        ),
                    )?;
                }
                ByteCode::DerefSub(i) => {
                    let from = runtime.value();
                    runtime.deref_and_sub_value(i);
                    self.log(
                        pc,
                        format_args!(
                            "Decreased value at {} from {} to {}.",
                            at,
                            from,
                            runtime.value()
                        ),
                    )?;
                }
                ByteCode::ShiftRight(i) => {
                    if let Err(fault) = runtime.shift_right(i) {
                        return Err(self.fault(pc, fault));
                    }
                    self.log(
                        pc,
                        format_args!(
                            "Pointer increased from {} to {}.",
                            at,
                            runtime.data_pointer()
                        ),
                    )?;
                }
                ByteCode::ShiftLeft(i) => {
                    if let Err(fault) = runtime.shift_left(i) {
                        return Err(self.fault(pc, fault));
                    }
                    self.log(
                        pc,
                        format_args!(
                            "Pointer decremented from {} to {}.",
                            at,
                            runtime.data_pointer()
                        ),
                    )?;
                }
                ByteCode::Read => match runtime.read()? {
                    Some(byte) => {
                        self.log(
                            pc,
                            format_args!("Input char {} at {}.", char::from(byte), at),
                        )?;
                    }
                    None => {
                        self.log(pc, format_args!("End of input, value at {} kept.", at))?;
                    }
                },
                ByteCode::Write => {
                    let byte = runtime.write()?;
                    if self.trace.is_some() {
                        self.output.push(byte);
                    }
                    self.log(
                        pc,
                        format_args!("Printing: value at {} = {}.", at, char::from(byte)),
                    )?;
                }
                ByteCode::JumpIfZero(end) => {
                    if runtime.value_is_zero() {
                        self.log(
                            pc,
                            format_args!("Pointer at {} is zero, jumping to {}.", at, end),
                        )?;
                        pc = end + 1;
                        continue;
                    }
                    self.log(
                        pc,
                        format_args!("Pointer at {} is non-zero, continuing.", at),
                    )?;
                }
                ByteCode::JumpIfNonZero(start) => {
                    if !runtime.value_is_zero() {
                        self.log(
                            pc,
                            format_args!("Pointer at {} is non-zero, jumping to {}.", at, start),
                        )?;
                        pc = start + 1;
                        continue;
                    }
                    self.log(pc, format_args!("Pointer at {} is zero, continuing.", at))?;
                }
                ByteCode::Clear => {
                    let from = runtime.value();
                    runtime.clear();
                    self.log(pc, format_args!("Cleared value at {} from {}.", at, from))?;
                }
                ByteCode::Transfer(offset) => {
                    let value = runtime.value();
                    if let Err(fault) = runtime.transfer(offset) {
                        return Err(self.fault(pc, fault));
                    }
                    self.log(
                        pc,
                        format_args!(
                            "Moved value {} from {} to offset {}.",
                            value, at, offset
                        ),
                    )?;
                }
            }

            pc += 1;
        }

        debug!("interpreter finished after {} cycles", cycles);
        Ok(())
    }
}
