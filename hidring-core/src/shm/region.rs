// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! The driver side creates the region, the consumer opens it by name.
//! All unsafe operations are encapsulated here.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::SharedMemoryError;

/// Page granularity used when sizing regions.
pub const PAGE_SIZE: usize = 4096;

/// A mapped POSIX shared memory object.
///
/// Unmaps on drop. Only the creating instance unlinks the name.
pub struct SharedMemoryRegion {
    name: String,
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    is_owner: bool,
}

// SAFETY: the mapping is owned by this value; access to its contents is
// coordinated by the ring control block atomics.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: see above. `&SharedMemoryRegion` only hands out the base pointer.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Minimum size for a shared memory region.
    pub const MIN_SIZE: usize = PAGE_SIZE;

    /// Maximum size for a shared memory region (16 MB).
    pub const MAX_SIZE: usize = 16 * 1024 * 1024;

    /// Round `bytes` up to a whole number of pages.
    pub const fn page_align(bytes: usize) -> usize {
        bytes.div_ceil(PAGE_SIZE) * PAGE_SIZE
    }

    /// Create and zero a new shared memory region.
    ///
    /// Fails if an object with the same name already exists.
    pub fn create(name: &str, size: usize) -> Result<Self, SharedMemoryError> {
        let create_failed = |reason: String| SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason,
        };

        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            return Err(create_failed(format!(
                "Size {} is outside {}..={}",
                size,
                Self::MIN_SIZE,
                Self::MAX_SIZE
            )));
        }

        let c_name = Self::object_name(name).map_err(create_failed)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(create_failed(format!(
                "shm_open failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: fd is a valid file descriptor
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } < 0 {
            let errno = std::io::Error::last_os_error();
            // SAFETY: fd is open and c_name names the object we just created
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(create_failed(format!("ftruncate failed: {}", errno)));
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(err) => {
                // SAFETY: as above
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(err);
            }
        };

        // SAFETY: ptr maps `size` writable bytes
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, size) };

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: true,
        })
    }

    /// Open an existing region. The mapped size is taken from the object.
    pub fn open(name: &str) -> Result<Self, SharedMemoryError> {
        let open_failed = |reason: String| SharedMemoryError::OpenFailed {
            name: name.to_string(),
            reason,
        };

        let c_name = Self::object_name(name).map_err(open_failed)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(open_failed(format!(
                "shm_open failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: zeroed stat is a valid out-parameter for fstat
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is valid and stat is writable
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let errno = std::io::Error::last_os_error();
            // SAFETY: fd is open
            unsafe { libc::close(fd) };
            return Err(open_failed(format!("fstat failed: {}", errno)));
        }

        let size = stat.st_size as usize;
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            // SAFETY: fd is open
            unsafe { libc::close(fd) };
            return Err(open_failed(format!("Unexpected object size {}", size)));
        }

        let ptr = Self::map(fd, size).inspect_err(|_| {
            // SAFETY: fd is open
            unsafe { libc::close(fd) };
        })?;

        tracing::debug!(name = %name, size = size, "Opened shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: false,
        })
    }

    fn object_name(name: &str) -> Result<CString, String> {
        if name.is_empty() {
            return Err("Name cannot be empty".to_string());
        }
        if name.contains('/') {
            return Err("Name cannot contain '/'".to_string());
        }
        CString::new(format!("/{}", name)).map_err(|e| format!("Invalid name: {}", e))
    }

    fn map(fd: i32, size: usize) -> Result<NonNull<u8>, SharedMemoryError> {
        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::MapFailed {
                reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
            });
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
            reason: "mmap returned a null mapping".to_string(),
        })
    }

    /// Name of the shared memory object, without the leading `/`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Base address of the mapping.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size describe the mapping created in create/open
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened in create/open
        unsafe { libc::close(self.fd) };

        if self.is_owner {
            if let Ok(c_name) = Self::object_name(&self.name) {
                // SAFETY: c_name is a valid CString
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                tracing::debug!(name = %self.name, "Unlinked shared memory region");
            }
        }
    }
}
