use crate::foundation::error::StateError;

/// Fixed prefix of every state blob.
///
/// `length` is the self-reported byte length of the whole blob, header included. It only ever
/// grows. `schema_version` is the newest module schema that has been run against the blob.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StateHeader {
    pub length: u64,
    pub schema_version: u32,
    pub reserved: u32,
}

/// Size of [`StateHeader`] in bytes. Module fields start at this offset.
pub const STATE_HEADER_LEN: usize = std::mem::size_of::<StateHeader>();

/// Statically known state requirements of one module build.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StateLayout {
    /// Expected blob length in bytes, header included.
    pub len: u64,
    /// Schema version of this build.
    pub schema_version: u32,
    pub reserved: u32,
}

impl StateLayout {
    pub fn new(len: usize, schema_version: u32) -> Self {
        Self {
            len: len as u64,
            schema_version,
            reserved: 0,
        }
    }

    /// Expected length as a host size.
    pub fn len_bytes(&self) -> usize {
        usize::try_from(self.len).unwrap_or(usize::MAX)
    }

    /// Check the layout can hold at least the header.
    pub fn validate(&self) -> Result<(), String> {
        if self.len_bytes() < STATE_HEADER_LEN {
            return Err(format!(
                "expected length {} is smaller than the {STATE_HEADER_LEN}-byte state header",
                self.len
            ));
        }
        if self.len_bytes() > MAX_STATE_LEN {
            return Err(format!(
                "expected length {} exceeds the {MAX_STATE_LEN}-byte limit",
                self.len
            ));
        }
        Ok(())
    }
}

const MAX_STATE_LEN: usize = 64 * 1024 * 1024;

// u128 storage keeps the blob 16-byte aligned for module-side casts.
type Word = u128;
const WORD_LEN: usize = std::mem::size_of::<Word>();

/// Opaque, host-owned animation state of the active plugin module.
pub struct StateBlob {
    words: Vec<Word>,
    len: usize,
}

impl StateBlob {
    /// Allocate a zeroed blob for `layout` with its header filled in.
    pub fn new(layout: StateLayout) -> Self {
        let len = layout.len_bytes().max(STATE_HEADER_LEN);
        let mut blob = Self {
            words: vec![0; len.div_ceil(WORD_LEN)],
            len,
        };
        blob.write_header(StateHeader {
            length: len as u64,
            schema_version: layout.schema_version,
            reserved: 0,
        });
        blob
    }

    /// Rebuild a blob from raw bytes, validating the header against the byte count.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() < STATE_HEADER_LEN {
            return Err(StateError::CorruptHeader {
                stored: 0,
                allocated: bytes.len(),
            });
        }
        let mut blob = Self {
            words: vec![0; bytes.len().div_ceil(WORD_LEN)],
            len: bytes.len(),
        };
        blob.as_mut_bytes().copy_from_slice(bytes);
        blob.validate()?;
        Ok(blob)
    }

    /// Host-tracked length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn header(&self) -> StateHeader {
        bytemuck::pod_read_unaligned(&self.as_bytes()[..STATE_HEADER_LEN])
    }

    pub fn schema_version(&self) -> u32 {
        self.header().schema_version
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Word, u8>(&self.words)[..self.len]
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Word, u8>(&mut self.words)[..self.len]
    }

    /// Module-private bytes after the header.
    pub fn payload(&self) -> &[u8] {
        &self.as_bytes()[STATE_HEADER_LEN..]
    }

    /// Raw pointer handed to module entry points. Valid for `len()` bytes until the next
    /// mutation through `&mut self`.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.as_mut_bytes().as_mut_ptr()
    }

    /// Check the self-reported length agrees with the allocation.
    pub fn validate(&self) -> Result<(), StateError> {
        let stored = self.header().length;
        if stored != self.len as u64 {
            return Err(StateError::CorruptHeader {
                stored,
                allocated: self.len,
            });
        }
        Ok(())
    }

    /// Check the blob is usable by a module with `layout`.
    pub fn ensure_fits(&self, layout: StateLayout) -> Result<(), StateError> {
        self.validate()?;
        if self.len < layout.len_bytes() {
            return Err(StateError::NotUpgraded {
                stored: self.len,
                expected: layout.len_bytes(),
            });
        }
        Ok(())
    }

    /// Grow to `new_len`, keeping the prefix and zero-filling the tail. Never shrinks.
    pub(crate) fn grow_to(&mut self, new_len: usize) {
        if new_len <= self.len {
            return;
        }
        let old_len = self.len;
        self.words.resize(new_len.div_ceil(WORD_LEN), 0);
        self.len = new_len;
        self.as_mut_bytes()[old_len..].fill(0);
        let mut header = self.header();
        header.length = new_len as u64;
        self.write_header(header);
    }

    pub(crate) fn set_schema_version(&mut self, version: u32) {
        let mut header = self.header();
        header.schema_version = version;
        self.write_header(header);
    }

    fn write_header(&mut self, header: StateHeader) {
        self.as_mut_bytes()[..STATE_HEADER_LEN].copy_from_slice(bytemuck::bytes_of(&header));
    }
}

impl std::fmt::Debug for StateBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBlob")
            .field("len", &self.len)
            .field("header", &self.header())
            .finish()
    }
}
