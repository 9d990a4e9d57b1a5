// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared circular byte buffer carrying framed event records.
//!
//! ```text
//! 0        4         8          12            16         32
//! ┌────────┬─────────┬──────────┬─────────────┬──────────┬───────────────┐
//! │ write  │ read    │ capacity │ initialized │ name[16] │ data[capacity]│
//! └────────┴─────────┴──────────┴─────────────┴──────────┴───────────────┘
//! ```
//!
//! Single producer, single consumer. `write` is owned by the producer and
//! `read` by the consumer; each side publishes its offset with release
//! ordering and loads the other's with acquire ordering. No locks.
//!
//! Nothing read from the region is trusted: every offset and header size is
//! bounds-checked before it is used to touch memory.

use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{FramingError, HardValidationError, HidRingError, HidRingResult, SharedMemoryError};
use crate::shm::record::{HeaderFormat, RecordHeader};
use crate::shm::region::SharedMemoryRegion;
use crate::types::{RingName, MAX_RING_NAME_LEN};

/// Size of the control block preceding the data area.
pub const CONTROL_SIZE: usize = 32;

/// Capacity used by the driver service.
pub const DEFAULT_CAPACITY: u32 = 10_000;

/// Largest data area accepted.
pub const MAX_CAPACITY: u32 = 1024 * 1024;

const NAME_OFFSET: usize = 16;
const NAME_LEN: usize = 16;

/// Atomic part of the control block.
#[repr(C)]
struct RingControl {
    write_offset: AtomicU32,
    read_offset: AtomicU32,
    capacity: AtomicU32,
    initialized: AtomicU32,
}

const _: () = assert!(std::mem::size_of::<RingControl>() == NAME_OFFSET);
const _: () = assert!(NAME_OFFSET + NAME_LEN == CONTROL_SIZE);

/// Data capacity and header encoding shared by both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    capacity: u32,
    header_format: HeaderFormat,
}

impl RingGeometry {
    /// Validate a geometry. The data area must fit at least one header.
    pub fn new(capacity: u32, header_format: HeaderFormat) -> Result<Self, HardValidationError> {
        if capacity <= header_format.size() || capacity > MAX_CAPACITY {
            return Err(HardValidationError::InvalidFieldValue {
                field: "ring.capacity",
                value: capacity.to_string(),
                reason: format!(
                    "Must be greater than the {} byte header and at most {}",
                    header_format.size(),
                    MAX_CAPACITY
                ),
            });
        }
        Ok(Self {
            capacity,
            header_format,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn header_format(&self) -> HeaderFormat {
        self.header_format
    }

    pub fn header_size(&self) -> u32 {
        self.header_format.size()
    }

    /// Bytes needed for control block plus data area.
    pub fn region_size(&self) -> usize {
        CONTROL_SIZE + self.capacity as usize
    }

    /// Page-aligned size for a POSIX shared memory object.
    pub fn shared_region_size(&self) -> usize {
        SharedMemoryRegion::page_align(self.region_size())
    }
}

impl Default for RingGeometry {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            header_format: HeaderFormat::Packed,
        }
    }
}

/// Zeroed heap allocation standing in for a mapped region.
struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl HeapRegion {
    fn new(size: usize) -> Result<Self, SharedMemoryError> {
        let layout = Layout::from_size_align(size, 8).map_err(|e| SharedMemoryError::MapFailed {
            reason: format!("Invalid heap layout: {}", e),
        })?;
        // SAFETY: size is at least CONTROL_SIZE + 1, so the layout is non-zero
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout in HeapRegion::new
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Keeps whatever owns the memory alive for as long as the ring.
enum Backing {
    Shared(#[allow(dead_code)] SharedMemoryRegion),
    Heap(#[allow(dead_code)] HeapRegion),
    External,
}

/// Handle to a ring buffer living in shared (or simulated) memory.
///
/// All operations take `&self`; the SPSC ownership split is enforced by
/// the protocol, not by the borrow checker. Exactly one consumer may call
/// [`RingBuffer::free`] and [`RingBuffer::advance_read_offset`].
pub struct RingBuffer {
    base: NonNull<u8>,
    geometry: RingGeometry,
    backing: Backing,
}

// SAFETY: the handle owns or borrows a mapping whose shared fields are
// accessed through atomics; record bytes are only copied, never referenced.
unsafe impl Send for RingBuffer {}

// SAFETY: see above.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Attach to a mapped region. Does not reset any state.
    pub fn attach_region(
        region: SharedMemoryRegion,
        geometry: RingGeometry,
    ) -> Result<Self, SharedMemoryError> {
        let base = region.as_ptr();
        let len = region.size();
        Self::from_parts(base, len, geometry, Backing::Shared(region))
    }

    /// Attach to memory mapped by someone else.
    ///
    /// # Safety
    /// `base` must point to `len` readable and writable bytes that stay
    /// mapped for the lifetime of the returned handle, and must be 4-byte
    /// aligned.
    pub unsafe fn attach_raw(
        base: NonNull<u8>,
        len: usize,
        geometry: RingGeometry,
    ) -> Result<Self, SharedMemoryError> {
        Self::from_parts(base, len, geometry, Backing::External)
    }

    /// Heap-backed, uninitialized ring. Both halves can share it in-process.
    pub fn in_memory(geometry: RingGeometry) -> Result<Self, SharedMemoryError> {
        let heap = HeapRegion::new(geometry.region_size())?;
        let base = heap.ptr;
        Self::from_parts(base, geometry.region_size(), geometry, Backing::Heap(heap))
    }

    /// Create a named shared memory object and initialize a ring in it.
    pub fn create_shared(name: &RingName, geometry: RingGeometry) -> Result<Self, SharedMemoryError> {
        let region = SharedMemoryRegion::create(name.as_str(), geometry.shared_region_size())?;
        let ring = Self::attach_region(region, geometry)?;
        ring.initialize(name)?;
        Ok(ring)
    }

    /// Open a named shared memory object created by the producer.
    pub fn open_shared(name: &RingName, geometry: RingGeometry) -> Result<Self, SharedMemoryError> {
        let region = SharedMemoryRegion::open(name.as_str())?;
        Self::attach_region(region, geometry)
    }

    fn from_parts(
        base: NonNull<u8>,
        len: usize,
        geometry: RingGeometry,
        backing: Backing,
    ) -> Result<Self, SharedMemoryError> {
        if len < geometry.region_size() {
            return Err(SharedMemoryError::RegionTooSmall {
                size: len,
                capacity: geometry.capacity(),
                required: geometry.region_size(),
            });
        }
        if base.as_ptr().align_offset(std::mem::align_of::<RingControl>()) != 0 {
            return Err(SharedMemoryError::MapFailed {
                reason: "Ring base is not 4-byte aligned".to_string(),
            });
        }

        let ring = Self {
            base,
            geometry,
            backing,
        };

        if ring.is_initialized() {
            let found = ring.control().capacity.load(Ordering::Acquire);
            if found != geometry.capacity() {
                return Err(SharedMemoryError::CapacityMismatch {
                    expected: geometry.capacity(),
                    found,
                });
            }
        }

        tracing::debug!(
            name = %ring.name(),
            capacity = geometry.capacity(),
            header_size = geometry.header_size(),
            initialized = ring.is_initialized(),
            shared = matches!(ring.backing, Backing::Shared(_)),
            "Attached ring buffer"
        );

        Ok(ring)
    }

    fn control(&self) -> &RingControl {
        // SAFETY: base is aligned and at least CONTROL_SIZE bytes long
        // (checked in from_parts); every bit pattern is a valid AtomicU32.
        unsafe { &*(self.base.as_ptr() as *const RingControl) }
    }

    fn data_ptr(&self) -> *mut u8 {
        // SAFETY: the region is at least CONTROL_SIZE + capacity bytes
        unsafe { self.base.as_ptr().add(CONTROL_SIZE) }
    }

    /// Producer-side setup: zero offsets, record capacity and name.
    pub fn initialize(&self, name: &RingName) -> Result<(), SharedMemoryError> {
        let control = self.control();
        if self.is_initialized() {
            return Err(SharedMemoryError::AlreadyInitialized {
                name: self.name(),
            });
        }

        control.write_offset.store(0, Ordering::Relaxed);
        control.read_offset.store(0, Ordering::Relaxed);
        control
            .capacity
            .store(self.geometry.capacity(), Ordering::Relaxed);

        let mut raw_name = [0u8; NAME_LEN];
        let bytes = name.as_str().as_bytes();
        let len = bytes.len().min(MAX_RING_NAME_LEN);
        raw_name[..len].copy_from_slice(&bytes[..len]);
        // SAFETY: the name field lies inside the control block; readers only
        // look at it after observing `initialized` with acquire ordering.
        unsafe {
            std::ptr::copy_nonoverlapping(
                raw_name.as_ptr(),
                self.base.as_ptr().add(NAME_OFFSET),
                NAME_LEN,
            );
        }

        control.initialized.store(1, Ordering::Release);
        tracing::debug!(name = %name, capacity = self.geometry.capacity(), "Initialized ring buffer");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.control().initialized.load(Ordering::Acquire) == 1
    }

    /// Diagnostic name written by the producer, or `<uninitialized>`.
    pub fn name(&self) -> String {
        if !self.is_initialized() {
            return "<uninitialized>".to_string();
        }
        let mut raw = [0u8; NAME_LEN];
        // SAFETY: the name field lies inside the control block
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(NAME_OFFSET),
                raw.as_mut_ptr(),
                NAME_LEN,
            );
        }
        let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    pub fn geometry(&self) -> RingGeometry {
        self.geometry
    }

    pub fn capacity(&self) -> u32 {
        self.geometry.capacity()
    }

    pub fn header_format(&self) -> HeaderFormat {
        self.geometry.header_format()
    }

    /// Raw consumer offset. Not validated.
    pub fn read_offset(&self) -> u32 {
        self.control().read_offset.load(Ordering::Acquire)
    }

    /// Raw producer offset. Not validated.
    pub fn write_offset(&self) -> u32 {
        self.control().write_offset.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.read_offset() == self.write_offset()
    }

    fn check_offset(&self, field: &'static str, offset: u32) -> Result<u32, FramingError> {
        if offset >= self.capacity() {
            return Err(FramingError::OffsetOutOfRange {
                field,
                offset,
                capacity: self.capacity(),
            });
        }
        Ok(offset)
    }

    /// Validated `(read, write)` offsets.
    pub fn offsets(&self) -> Result<(u32, u32), FramingError> {
        let read = self.check_offset("read", self.read_offset())?;
        let write = self.check_offset("write", self.write_offset())?;
        Ok((read, write))
    }

    /// Decode the header at `offset` without consuming it.
    ///
    /// `None` if the ring is uninitialized or `offset` is the write offset.
    pub fn peek_record_at(&self, offset: u32) -> Result<Option<RecordHeader>, FramingError> {
        if !self.is_initialized() {
            return Ok(None);
        }
        let write = self.check_offset("write", self.write_offset())?;
        if offset == write {
            return Ok(None);
        }
        let offset = self.check_offset("record", offset)?;

        let header_size = self.geometry.header_size();
        if offset as u64 + header_size as u64 > self.capacity() as u64 {
            return Err(FramingError::HeaderOverrun {
                offset,
                header_size,
                capacity: self.capacity(),
            });
        }

        let mut raw = [0u8; 24];
        let raw = &mut raw[..header_size as usize];
        self.copy_out(offset, raw);
        Ok(RecordHeader::decode(raw, self.header_format()))
    }

    /// Total bytes (header + payload) a record occupies, in `u32`.
    pub fn record_span(&self, offset: u32, header: &RecordHeader) -> Result<u32, FramingError> {
        u32::try_from(header.size)
            .ok()
            .and_then(|size| size.checked_add(self.geometry.header_size()))
            .ok_or(FramingError::SizeOverflow {
                offset,
                size: header.size,
            })
    }

    /// Check that the record at `offset` lies wholly in published data.
    ///
    /// Returns its span on success.
    pub fn validate_record(&self, offset: u32, header: &RecordHeader) -> Result<u32, FramingError> {
        let span = self.record_span(offset, header)?;
        let end = offset as u64 + span as u64;
        if end > self.capacity() as u64 {
            return Err(FramingError::AdvanceOverrun {
                offset,
                consumed: span as u64,
                capacity: self.capacity(),
            });
        }
        let write = self.check_offset("write", self.write_offset())?;
        if offset < write && end > write as u64 {
            return Err(FramingError::RecordPastWriteOffset {
                offset,
                end,
                write_offset: write,
            });
        }
        Ok(span)
    }

    /// Move the read offset forward by `consumed` bytes.
    ///
    /// Landing exactly on `capacity` wraps to 0. Landing past it is
    /// corruption: the offset is left untouched and an error returned.
    pub fn advance_read_offset(&self, consumed: u64) -> Result<(), FramingError> {
        let offset = self.check_offset("read", self.read_offset())?;
        let capacity = self.capacity();
        let overrun = FramingError::AdvanceOverrun {
            offset,
            consumed,
            capacity,
        };

        let end = u32::try_from(consumed)
            .ok()
            .and_then(|c| offset.checked_add(c))
            .ok_or_else(|| overrun.clone())?;

        let next = match end.cmp(&capacity) {
            std::cmp::Ordering::Less => end,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => return Err(overrun),
        };

        self.control().read_offset.store(next, Ordering::Release);
        Ok(())
    }

    /// Release the record at the read offset.
    ///
    /// No-op on an empty ring. Each call consumes exactly one record.
    pub fn free(&self) -> HidRingResult<()> {
        if !self.is_initialized() {
            return Err(HidRingError::NotInitialized { name: self.name() });
        }
        let (read, _) = self.offsets()?;
        let Some(header) = self.peek_record_at(read)? else {
            return Ok(());
        };
        let span = self.validate_record(read, &header)?;
        self.advance_read_offset(span as u64)?;
        tracing::trace!(offset = read, span = span, kind = %header.kind, "Freed record");
        Ok(())
    }

    /// Bytes the producer may write without touching unread data.
    ///
    /// One byte is always kept free so that full and empty differ.
    pub fn writable_size(&self) -> u32 {
        if !self.is_initialized() {
            return 0;
        }
        let Ok((read, write)) = self.offsets() else {
            return 0;
        };
        if read <= write {
            self.capacity() - 1 - write + read
        } else {
            read - write - 1
        }
    }

    /// Copy `dst.len()` bytes starting at data offset `offset`.
    ///
    /// Callers must have checked `offset + dst.len() <= capacity`.
    pub(crate) fn copy_out(&self, offset: u32, dst: &mut [u8]) {
        debug_assert!(offset as usize + dst.len() <= self.capacity() as usize);
        // SAFETY: the range lies within the data area (checked by callers)
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.data_ptr().add(offset as usize),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
    }

    /// Copy `src` into the data area at `offset`. Producer side only.
    pub(crate) fn copy_in(&self, offset: u32, src: &[u8]) {
        debug_assert!(offset as usize + src.len() <= self.capacity() as usize);
        // SAFETY: the range lies within the data area (checked by callers)
        unsafe {
            std::ptr::copy_nonoverlapping(
                src.as_ptr(),
                self.data_ptr().add(offset as usize),
                src.len(),
            );
        }
    }

    /// Publish a new write offset. Producer side only.
    pub(crate) fn publish_write_offset(&self, offset: u32) {
        self.control().write_offset.store(offset, Ordering::Release);
    }

    /// Overwrite the raw offsets, bypassing validation.
    ///
    /// Lets tests and diagnostics reproduce corrupted control blocks.
    #[doc(hidden)]
    pub fn force_offsets(&self, read: u32, write: u32) {
        self.control().read_offset.store(read, Ordering::Release);
        self.control().write_offset.store(write, Ordering::Release);
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("name", &self.name())
            .field("capacity", &self.capacity())
            .field("header_format", &self.header_format())
            .field("read_offset", &self.read_offset())
            .field("write_offset", &self.write_offset())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
