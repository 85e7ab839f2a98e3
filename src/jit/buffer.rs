use std::{io, ptr::NonNull, slice};

use log::{debug, trace};

use super::JitError;

/// One anonymous private mapping, unmapped on drop
struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    fn new(len: usize) -> Result<Mapping, JitError> {
        // Safety: a fresh anonymous mapping, nothing else can alias it
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(JitError::Map(io::Error::last_os_error()));
        }

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| JitError::Map(io::Error::from(io::ErrorKind::OutOfMemory)))?;
        Ok(Mapping { ptr, len })
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // Safety: we own the whole mapping and nothing borrows from it past our lifetime
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

/// Writable memory that machine code is emitted into.
///
/// The capacity is fixed when it's created, the buffer never grows so offsets taken while
/// emitting stay valid until it is finalized.
pub struct CodeBuffer {
    mapping: Mapping,
    len: usize,
}

impl CodeBuffer {
    pub fn new(capacity: usize) -> Result<CodeBuffer, JitError> {
        let mapping = Mapping::new(capacity)?;
        debug!("mapped {} bytes for code", capacity);
        Ok(CodeBuffer { mapping, len: 0 })
    }

    /// How many bytes have been written
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.mapping.len
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safety: the first `len` bytes have been written and the mapping is readable
        unsafe { slice::from_raw_parts(self.mapping.ptr.as_ptr(), self.len) }
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), JitError> {
        let end = self
            .len
            .checked_add(bytes.len())
            .filter(|end| *end <= self.capacity())
            .ok_or(JitError::CapacityExceeded {
                requested: self.len.saturating_add(bytes.len()),
                capacity: self.capacity(),
            })?;

        // Safety: `len..end` is inside the mapping, checked above
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapping.ptr.as_ptr().add(self.len),
                bytes.len(),
            );
        }
        trace!("{:>6}: {:02X?}", self.len, bytes);
        self.len = end;
        Ok(())
    }

    /// Overwrite bytes that were already appended
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> Result<(), JitError> {
        let in_range = offset
            .checked_add(bytes.len())
            .is_some_and(|end| end <= self.len);
        if !in_range {
            return Err(JitError::PatchOutOfRange {
                offset,
                len: bytes.len(),
                size: self.len,
            });
        }

        // Safety: `offset..offset + bytes.len()` is inside the written part, checked above
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapping.ptr.as_ptr().add(offset),
                bytes.len(),
            );
        }
        trace!("patched {:>6}: {:02X?}", offset, bytes);
        Ok(())
    }

    /// Flip the memory from writable to executable, there is no way back
    pub fn finalize(self) -> Result<ExecutableCode, JitError> {
        // Safety: the range is exactly our mapping
        let result = unsafe {
            libc::mprotect(
                self.mapping.ptr.as_ptr().cast(),
                self.mapping.len,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };

        if result != 0 {
            return Err(JitError::Protect(io::Error::last_os_error()));
        }

        debug!("{} of {} code bytes made executable", self.len, self.capacity());
        Ok(ExecutableCode {
            mapping: self.mapping,
            len: self.len,
        })
    }
}

/// Read + execute only code, created by [`CodeBuffer::finalize`]
pub struct ExecutableCode {
    mapping: Mapping,
    len: usize,
}

impl ExecutableCode {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.ptr.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_up_to_capacity_exactly() {
        let mut buffer = CodeBuffer::new(4).unwrap();
        buffer.append(&[1, 2]).unwrap();
        buffer.append(&[3, 4]).unwrap();
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);

        assert!(matches!(
            buffer.append(&[5]),
            Err(JitError::CapacityExceeded {
                requested: 5,
                capacity: 4
            })
        ));
        // a failed append writes nothing
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn patches_only_written_bytes() {
        let mut buffer = CodeBuffer::new(8).unwrap();
        buffer.append(&[0; 6]).unwrap();
        buffer.patch(2, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        assert_eq!(buffer.as_slice(), &[0, 0, 0xAA, 0xBB, 0xCC, 0xDD]);

        assert!(matches!(
            buffer.patch(4, &[0; 4]),
            Err(JitError::PatchOutOfRange {
                offset: 4,
                len: 4,
                size: 6
            })
        ));
        assert!(buffer.patch(usize::MAX, &[0]).is_err());
    }

    #[test]
    fn finalize_keeps_the_code() {
        let mut buffer = CodeBuffer::new(16).unwrap();
        buffer.append(&[0xC3]).unwrap();
        let code = buffer.finalize().unwrap();
        assert_eq!(code.len(), 1);
        // Safety: still mapped & readable
        assert_eq!(unsafe { *code.as_ptr() }, 0xC3);
    }
}
