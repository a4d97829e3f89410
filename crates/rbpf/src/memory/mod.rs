//! Memory Region Table
//!
//! Every load and store a program performs is checked against a table of
//! [`Region`]s. An access `[addr, addr + len)` is granted only if a single
//! region contains all of it and carries the required permission; an access
//! straddling two adjacent regions is rejected even if both would allow it.
//!
//! ```text
//!   MemoryMap (built per run, searched front to back)
//!   ┌──────────────┬───────┬────────┬──────┬─────────┐
//!   │ extras (LIFO)│ stack │ rodata │ data │ context │
//!   │ host-defined │  RW   │   R    │  RW  │ RW / R  │
//!   └──────────────┴───────┴────────┴──────┴─────────┘
//! ```
//!
//! Region addresses are host addresses, so the table never translates: a
//! granted access reads or writes the backing slice at `addr - start`.

mod region;

use heapless::Vec;
use log::debug;
use rbpf_abi::RegionFlags;
use thiserror::Error;

pub use region::Region;

use crate::bytecode::MemSize;
use crate::profile::MAX_REGIONS;

/// Regions every VM maps: stack, rodata, data and the run's context.
pub const DEFAULT_REGIONS: usize = 4;

/// Capacity of a [`MemoryMap`].
pub const MAP_CAPACITY: usize = MAX_REGIONS + DEFAULT_REGIONS;

/// Read and write permission.
pub const RW: RegionFlags = RegionFlags::READ.union(RegionFlags::WRITE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("region table full ({capacity} regions)")]
    TableFull { capacity: usize },
}

/// An access no region grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("denied access to {addr:#x} with len {len}")]
pub struct AccessDenied {
    pub addr: u64,
    pub len: usize,
}

/// The address space of one run.
#[derive(Debug, Default)]
pub struct MemoryMap<'m> {
    regions: Vec<Region<'m>, MAP_CAPACITY>,
}

impl<'m> MemoryMap<'m> {
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Append a region; earlier regions are searched first.
    pub fn push(&mut self, region: Region<'m>) -> Result<(), RegionError> {
        self.regions.push(region).map_err(|_| RegionError::TableFull {
            capacity: MAP_CAPACITY,
        })
    }

    pub fn regions(&self) -> &[Region<'m>] {
        &self.regions
    }

    /// Find the region granting the access, returning its index and the
    /// offset of `addr` inside it.
    fn find(&self, addr: u64, len: usize, flags: RegionFlags) -> Result<(usize, usize), AccessDenied> {
        for (idx, region) in self.regions.iter().enumerate() {
            if !region.flags().contains(flags) {
                continue;
            }
            if let Some(offset) = region.offset_of(addr, len) {
                return Ok((idx, offset));
            }
        }
        debug!("denied access to {:#x} with len {} ({:?})", addr, len, flags);
        Err(AccessDenied { addr, len })
    }

    /// Check that `[addr, addr + len)` lies inside one region granting `flags`.
    #[inline]
    pub fn check(&self, addr: u64, len: usize, flags: RegionFlags) -> Result<(), AccessDenied> {
        self.find(addr, len, flags).map(|_| ())
    }

    pub fn read_bytes(&self, addr: u64, len: usize) -> Result<&[u8], AccessDenied> {
        let (idx, offset) = self.find(addr, len, RegionFlags::READ)?;
        Ok(&self.regions[idx].bytes()[offset..offset + len])
    }

    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), AccessDenied> {
        let len = bytes.len();
        let (idx, offset) = self.find(addr, len, RegionFlags::WRITE)?;
        let mem = self.regions[idx]
            .bytes_mut()
            .ok_or(AccessDenied { addr, len })?;
        mem[offset..offset + len].copy_from_slice(bytes);
        Ok(())
    }

    /// Load a value of `size` bytes in host byte order, zero-extended.
    pub fn load(&self, addr: u64, size: MemSize) -> Result<u64, AccessDenied> {
        let bytes = self.read_bytes(addr, size.size_bytes())?;
        let mut raw = [0u8; 8];
        let value = match size {
            MemSize::Byte => bytes[0] as u64,
            MemSize::Half => {
                raw[..2].copy_from_slice(bytes);
                u16::from_ne_bytes([raw[0], raw[1]]) as u64
            }
            MemSize::Word => {
                raw[..4].copy_from_slice(bytes);
                u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64
            }
            MemSize::DWord => {
                raw.copy_from_slice(bytes);
                u64::from_ne_bytes(raw)
            }
        };
        Ok(value)
    }

    /// Store the low `size` bytes of `value` in host byte order.
    pub fn store(&mut self, addr: u64, size: MemSize, value: u64) -> Result<(), AccessDenied> {
        match size {
            MemSize::Byte => self.write_bytes(addr, &[value as u8]),
            MemSize::Half => self.write_bytes(addr, &(value as u16).to_ne_bytes()),
            MemSize::Word => self.write_bytes(addr, &(value as u32).to_ne_bytes()),
            MemSize::DWord => self.write_bytes(addr, &value.to_ne_bytes()),
        }
    }

    /// Read a NUL-terminated string of at most `max` bytes.
    ///
    /// The first byte must be readable. The string ends at the first NUL, at
    /// `max` bytes, or at the end of its region, whichever comes first; the
    /// terminator is not included.
    pub fn read_cstr(&self, addr: u64, max: usize) -> Result<&[u8], AccessDenied> {
        let (idx, offset) = self.find(addr, 1, RegionFlags::READ)?;
        let rest = &self.regions[idx].bytes()[offset..];
        let rest = &rest[..rest.len().min(max)];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(&rest[..end])
    }

    /// Copy `len` bytes from `src` to `dest`, checking both ranges first.
    ///
    /// Overlapping ranges within one region behave like `memmove`.
    pub fn copy(&mut self, dest: u64, src: u64, len: usize) -> Result<(), AccessDenied> {
        let (si, so) = self.find(src, len, RegionFlags::READ)?;
        let (di, doff) = self.find(dest, len, RegionFlags::WRITE)?;
        let denied = AccessDenied { addr: dest, len };

        if si == di {
            let mem = self.regions[di].bytes_mut().ok_or(denied)?;
            mem.copy_within(so..so + len, doff);
            return Ok(());
        }

        let (src_region, dst_region) = if si < di {
            let (head, tail) = self.regions.split_at_mut(di);
            (&head[si], &mut tail[0])
        } else {
            let (head, tail) = self.regions.split_at_mut(si);
            (&tail[0], &mut head[di])
        };
        let dst = dst_region.bytes_mut().ok_or(denied)?;
        dst[doff..doff + len].copy_from_slice(&src_region.bytes()[so..so + len]);
        Ok(())
    }
}
