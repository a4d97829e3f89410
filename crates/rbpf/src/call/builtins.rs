//! Built-in host calls: the stdlib and key/value blocks.

use alloc::string::String;
use core::fmt::{self, Write};

use heapless::Vec;
use log::{debug, info};

use super::{CALL_FAILED, CallContext};
use crate::store::StoreError;

/// Longest format string `printf` reads, in bytes.
pub const PRINTF_MAX_LEN: usize = 128;

/// Formatted output is truncated to this many bytes.
const PRINTF_OUT_LEN: usize = 256;

/// Raw output bytes. Format bytes are copied as-is, never re-encoded.
struct Output(Vec<u8, PRINTF_OUT_LEN>);

impl Output {
    fn byte(&mut self, b: u8) -> fmt::Result {
        self.0.push(b).map_err(|_| fmt::Error)
    }
}

impl Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().try_for_each(|b| self.byte(b))
    }
}

/// `printf(fmt, a2, a3, a4, a5)`
///
/// Supports `%d %i %u %x %c %%` over the low 32 bits of each argument. Unknown
/// conversions are printed literally. Returns the number of bytes produced.
pub fn printf(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let Ok(format) = ctx.memory().read_cstr(args[0], PRINTF_MAX_LEN) else {
        return CALL_FAILED;
    };

    let mut out = Output(Vec::new());
    let mut values = args[1..].iter().map(|&v| v as u32);
    let mut bytes = format.iter().copied();

    while let Some(b) = bytes.next() {
        let written = if b != b'%' {
            out.byte(b)
        } else {
            match bytes.next() {
                Some(b'%') | None => out.byte(b'%'),
                Some(b'd' | b'i') => write!(out, "{}", values.next().unwrap_or(0) as i32),
                Some(b'u') => write!(out, "{}", values.next().unwrap_or(0)),
                Some(b'x') => write!(out, "{:x}", values.next().unwrap_or(0)),
                Some(b'c') => out.byte(values.next().unwrap_or(0) as u8),
                Some(other) => out.byte(b'%').and_then(|()| out.byte(other)),
            }
        };
        if written.is_err() {
            break;
        }
    }

    info!(target: "rbpf::printf", "{}", String::from_utf8_lossy(&out.0));
    out.0.len() as u64
}

/// `memcpy(dest, src, len)`
///
/// Returns `dest`, or 0 if either range is not accessible.
pub fn memcpy(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [dest, src, len, ..] = args;
    let Ok(len) = usize::try_from(len) else {
        return 0;
    };
    match ctx.memory_mut().copy(dest, src, len) {
        Ok(()) => dest,
        Err(e) => {
            debug!("memcpy rejected: {}", e);
            0
        }
    }
}

fn status(result: Result<(), StoreError>) -> u64 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            debug!("store call failed: {}", e);
            CALL_FAILED
        }
    }
}

/// `store_local(key, value)`
pub fn store_local(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let (store, local) = ctx.store_and_local();
    status(store.store_local(local, args[0] as u32, args[1] as u32))
}

/// `store_global(key, value)`
pub fn store_global(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    status(ctx.store().store_global(args[0] as u32, args[1] as u32))
}

/// `fetch_local(key, value_ptr)`
pub fn fetch_local(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [key, ptr, ..] = args;
    if ctx.check_writable(ptr, 4).is_err() {
        return CALL_FAILED;
    }
    let (store, local) = ctx.store_and_local();
    let fetched = store.fetch_local(local, key as u32);
    write_fetched(ctx, ptr, fetched)
}

/// `fetch_global(key, value_ptr)`
pub fn fetch_global(ctx: &mut CallContext<'_, '_>, args: [u64; 5]) -> u64 {
    let [key, ptr, ..] = args;
    if ctx.check_writable(ptr, 4).is_err() {
        return CALL_FAILED;
    }
    let fetched = ctx.store().fetch_global(key as u32);
    write_fetched(ctx, ptr, fetched)
}

fn write_fetched(ctx: &mut CallContext<'_, '_>, ptr: u64, fetched: Result<u32, StoreError>) -> u64 {
    let value = match fetched {
        Ok(value) => value,
        Err(e) => return status(Err(e)),
    };
    match ctx.write_u32(ptr, value) {
        Ok(()) => 0,
        Err(_) => CALL_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMap, RW, Region};
    use crate::store::{KvStore, LocalTree};

    #[test]
    fn printf_formats_arguments() {
        let fmt = *b"v=%d u=%u x=%x c=%c %% %q\0";
        let store = KvStore::new(1);
        let mut local = LocalTree::new();
        let mut memory = MemoryMap::new();
        memory.push(Region::read_only(&fmt)).unwrap();
        let base = memory.regions()[0].start();
        let mut ctx = CallContext::new(&mut memory, &store, &mut local);

        let args = [base, (-5i64) as u64, 7, 0xbeef, b'z' as u64];
        let expected = "v=-5 u=7 x=beef c=z % %q";
        assert_eq!(printf(&mut ctx, args), expected.len() as u64);
    }

    #[test]
    fn printf_counts_raw_bytes() {
        // two non-ASCII format bytes plus a non-ASCII %c argument
        let fmt = [0xe9, 0xff, b'%', b'c', 0];
        let store = KvStore::new(1);
        let mut local = LocalTree::new();
        let mut memory = MemoryMap::new();
        memory.push(Region::read_only(&fmt)).unwrap();
        let base = memory.regions()[0].start();
        let mut ctx = CallContext::new(&mut memory, &store, &mut local);

        assert_eq!(printf(&mut ctx, [base, 0xb0, 0, 0, 0]), 3);
    }

    #[test]
    fn printf_unreadable_format() {
        let store = KvStore::new(1);
        let mut local = LocalTree::new();
        let mut memory = MemoryMap::new();
        let mut ctx = CallContext::new(&mut memory, &store, &mut local);
        assert_eq!(printf(&mut ctx, [0x1000, 0, 0, 0, 0]), CALL_FAILED);
    }

    #[test]
    fn fetch_writes_through_pointer() {
        let store = KvStore::new(4);
        store.store_global(3, 77).unwrap();
        let mut local = LocalTree::new();
        let mut out = [0u8; 4];
        let ro = [0u8; 4];
        {
            let mut memory = MemoryMap::new();
            memory.push(Region::writable(&mut out, RW)).unwrap();
            memory.push(Region::read_only(&ro)).unwrap();
            let out_addr = memory.regions()[0].start();
            let ro_addr = memory.regions()[1].start();
            let mut ctx = CallContext::new(&mut memory, &store, &mut local);

            assert_eq!(fetch_global(&mut ctx, [3, out_addr, 0, 0, 0]), 0);
            // Denied pointers do not create the key.
            assert_eq!(fetch_global(&mut ctx, [4, ro_addr, 0, 0, 0]), CALL_FAILED);
        }
        assert_eq!(u32::from_ne_bytes(out), 77);
        assert_eq!(store.in_use(), 1);
    }

    #[test]
    fn local_store_round_trip() {
        let store = KvStore::new(4);
        let mut local = LocalTree::new();
        let mut out = [0u8; 4];
        {
            let mut memory = MemoryMap::new();
            memory.push(Region::writable(&mut out, RW)).unwrap();
            let out_addr = memory.regions()[0].start();
            let mut ctx = CallContext::new(&mut memory, &store, &mut local);
            assert_eq!(store_local(&mut ctx, [9, 123, 0, 0, 0]), 0);
            assert_eq!(fetch_local(&mut ctx, [9, out_addr, 0, 0, 0]), 0);
        }
        assert_eq!(u32::from_ne_bytes(out), 123);
        assert!(store.global_entries().is_empty());
    }

    #[test]
    fn memcpy_checks_both_ranges() {
        let src = *b"data";
        let mut dst = [0u8; 4];
        let store = KvStore::new(1);
        let mut local = LocalTree::new();
        {
            let mut memory = MemoryMap::new();
            memory.push(Region::writable(&mut dst, RW)).unwrap();
            memory.push(Region::read_only(&src)).unwrap();
            let d = memory.regions()[0].start();
            let s = memory.regions()[1].start();
            let mut ctx = CallContext::new(&mut memory, &store, &mut local);
            assert_eq!(memcpy(&mut ctx, [d, s, 5, 0, 0]), 0);
            assert_eq!(memcpy(&mut ctx, [s, d, 4, 0, 0]), 0);
            assert_eq!(memcpy(&mut ctx, [d, s, 4, 0, 0]), d);
        }
        assert_eq!(&dst, b"data");
    }
}
