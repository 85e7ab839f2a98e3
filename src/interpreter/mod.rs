pub mod bytecode_interpreter;

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerFault {
    #[error("Pointer underflow moving {by} left from {from}")]
    Underflow { from: usize, by: u64 },

    #[error("Pointer overflow at {to}. Max memory: {limit}")]
    Overflow { to: u64, limit: usize },
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("[PC {pc}]: {fault}")]
    Pointer {
        pc: usize,
        #[source]
        fault: PointerFault,
    },

    #[error("The tape needs at least one cell")]
    EmptyTape,

    #[error("Exceeded the limit of {limit} cycles")]
    CycleLimitExceeded { limit: u64 },

    #[error("IO Error")]
    Io(
        #[from]
        io::Error,
    ),
}

pub struct Runtime<'a> {
    /// Pointer into the heap
    data_pointer: usize,

    /// Our statically allocated heap
    heap: Vec<u8>,

    in_stream: Box<dyn Read + 'a>,
    out_stream: Box<dyn Write + 'a>,
}

impl<'a> Runtime<'a> {
    pub fn new(
        heap_size: usize,
        in_stream: Box<dyn Read + 'a>,
        out_stream: Box<dyn Write + 'a>,
    ) -> Result<Self, RuntimeError> {
        // every cell operation reads the data pointer, which starts at 0
        if heap_size == 0 {
            return Err(RuntimeError::EmptyTape);
        }

        Ok(Self {
            data_pointer: 0,
            heap: vec![0; heap_size],
            in_stream,
            out_stream,
        })
    }

    pub fn data_pointer(&self) -> usize {
        self.data_pointer
    }

    pub fn heap(&self) -> &[u8] {
        &self.heap
    }

    /// The byte at the data pointer
    pub fn value(&self) -> u8 {
        self.heap[self.data_pointer]
    }

    /// Read one byte from the input into the data pointer.
    ///
    /// At the end of the input the cell is left alone and `None` is returned, which is what a
    /// raw `read` system call returning 0 bytes looks like to the program.
    pub fn read(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.in_stream.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.heap[self.data_pointer] = byte[0];
        Ok(Some(byte[0]))
    }

    /// Write the data pointer to the output
    pub fn write(&mut self) -> io::Result<u8> {
        let value = self.value();
        self.out_stream.write_all(&[value])?;
        Ok(value)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out_stream.flush()
    }

    pub fn deref_and_add_value(&mut self, by: u8) {
        self.heap[self.data_pointer] = self.heap[self.data_pointer].wrapping_add(by);
    }

    pub fn deref_and_sub_value(&mut self, by: u8) {
        self.heap[self.data_pointer] = self.heap[self.data_pointer].wrapping_sub(by);
    }

    pub fn clear(&mut self) {
        self.heap[self.data_pointer] = 0;
    }

    /// Adds the current cell onto the cell `offset` away and zeroes the current cell
    pub fn transfer(&mut self, offset: i32) -> Result<(), PointerFault> {
        let value = self.value();
        if value == 0 {
            // the loop this came from wouldn't have run at all
            return Ok(());
        }

        let target = self.checked_target(i64::from(offset))?;
        self.heap[target] = self.heap[target].wrapping_add(value);
        self.clear();
        Ok(())
    }

    pub fn shift_right(&mut self, by: u32) -> Result<(), PointerFault> {
        self.data_pointer = self.checked_target(i64::from(by))?;
        Ok(())
    }

    pub fn shift_left(&mut self, by: u32) -> Result<(), PointerFault> {
        self.data_pointer = self.checked_target(-i64::from(by))?;
        Ok(())
    }

    /// is the value at the data pointer zero?
    pub fn value_is_zero(&self) -> bool {
        self.value() == 0
    }

    /// the cell `offset` away from the data pointer if it is on the tape
    fn checked_target(&self, offset: i64) -> Result<usize, PointerFault> {
        let target = self.data_pointer as i64 + offset;
        if target < 0 {
            Err(PointerFault::Underflow {
                from: self.data_pointer,
                by: offset.unsigned_abs(),
            })
        } else if target as u64 >= self.heap.len() as u64 {
            Err(PointerFault::Overflow {
                to: target as u64,
                limit: self.heap.len(),
            })
        } else {
            Ok(target as usize)
        }
    }
}
