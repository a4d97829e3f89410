use rbpf_abi::RegionFlags;

/// Memory backing a region.
#[derive(Debug)]
enum Backing<'a> {
    Shared(&'a [u8]),
    Exclusive(&'a mut [u8]),
}

/// A capability: an address range of host memory plus a permission mask.
///
/// The start address is the host address of the backing slice, so bytecode
/// sees the same pointers the host would.
#[derive(Debug)]
pub struct Region<'a> {
    start: u64,
    flags: RegionFlags,
    backing: Backing<'a>,
}

impl<'a> Region<'a> {
    /// A region over mutable memory. `flags` may grant any permission.
    pub fn writable(mem: &'a mut [u8], flags: RegionFlags) -> Self {
        Self {
            start: mem.as_ptr() as usize as u64,
            flags,
            backing: Backing::Exclusive(mem),
        }
    }

    /// A readable region over shared memory.
    pub fn read_only(mem: &'a [u8]) -> Self {
        Self::shared(mem, RegionFlags::READ)
    }

    /// A region over shared memory. The write permission is dropped, since
    /// shared memory can never be written through.
    pub fn shared(mem: &'a [u8], flags: RegionFlags) -> Self {
        Self {
            start: mem.as_ptr() as usize as u64,
            flags: flags.difference(RegionFlags::WRITE),
            backing: Backing::Shared(mem),
        }
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Shared(mem) => mem.len(),
            Backing::Exclusive(mem) => mem.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    /// Offset of `[addr, addr + len)` inside this region, if the whole range
    /// lies within it.
    #[inline]
    pub fn offset_of(&self, addr: u64, len: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.start)?;
        let end = offset.checked_add(len as u64)?;
        if end <= self.len() as u64 {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// Check whether this region fully contains the access and grants `flags`.
    #[inline]
    pub fn permits(&self, addr: u64, len: usize, flags: RegionFlags) -> bool {
        self.flags.contains(flags) && self.offset_of(addr, len).is_some()
    }

    /// Borrow this region for a shorter lifetime.
    pub fn reborrow(&mut self) -> Region<'_> {
        let backing = match &mut self.backing {
            Backing::Shared(mem) => Backing::Shared(*mem),
            Backing::Exclusive(mem) => Backing::Exclusive(&mut **mem),
        };
        Region {
            start: self.start,
            flags: self.flags,
            backing,
        }
    }

    #[inline]
    pub(super) fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Shared(mem) => *mem,
            Backing::Exclusive(mem) => &**mem,
        }
    }

    #[inline]
    pub(super) fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.backing {
            Backing::Shared(_) => None,
            Backing::Exclusive(mem) => Some(&mut **mem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment() {
        let mut buf = [0u8; 16];
        let region = Region::writable(&mut buf, RegionFlags::READ | RegionFlags::WRITE);
        let start = region.start();

        assert_eq!(region.offset_of(start, 16), Some(0));
        assert_eq!(region.offset_of(start + 8, 8), Some(8));
        assert_eq!(region.offset_of(start + 9, 8), None);
        assert_eq!(region.offset_of(start.wrapping_sub(1), 1), None);
        assert_eq!(region.offset_of(u64::MAX, 2), None);
    }

    #[test]
    fn shared_regions_never_grant_write() {
        let buf = [0u8; 4];
        let region = Region::shared(&buf, RegionFlags::READ | RegionFlags::WRITE);
        assert_eq!(region.flags(), RegionFlags::READ);
        assert!(!region.permits(region.start(), 1, RegionFlags::WRITE));
    }

    #[test]
    fn permission_bits() {
        let mut buf = [0u8; 4];
        let region = Region::writable(&mut buf, RegionFlags::WRITE);
        assert!(region.permits(region.start(), 4, RegionFlags::WRITE));
        assert!(!region.permits(region.start(), 4, RegionFlags::READ));
    }
}
