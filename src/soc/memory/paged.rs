//! Sparse byte-addressable store built from lazily allocated 256-byte pages.
//!
//! A single-entry page cache remembers the most recently touched page. Accesses
//! that stay within one page copy straight out of (or into) the cached page;
//! accesses that straddle a page boundary fall back to a byte loop that
//! re-resolves the cache at every crossing. Both paths serialize multi-byte
//! values little-endian, so the result never depends on where the boundary is.
use ahash::AHashMap;

use crate::soc::core::register::{Register, View, Width};

pub const PAGE_SIZE: usize = 256;
const PAGE_MASK: u64 = !(PAGE_SIZE as u64 - 1);

type Page = Box<[u8; PAGE_SIZE]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedPage {
    base: u64,
    slot: usize,
}

#[derive(Debug, Default)]
pub struct Memory {
    // Pages are never freed, so slot indices stay valid for the cache.
    pages: Vec<Page>,
    index: AHashMap<u64, usize>,
    cache: Option<CachedPage>,
}

#[inline(always)]
const fn page_base(address: u64) -> u64 {
    address & PAGE_MASK
}

#[inline(always)]
const fn page_offset(address: u64) -> usize {
    (address & !PAGE_MASK) as usize
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backing pages allocated so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_page_allocated(&self, address: u64) -> bool {
        self.index.contains_key(&page_base(address))
    }

    #[inline(always)]
    fn resolve(&mut self, address: u64) -> usize {
        let base = page_base(address);
        match self.cache {
            Some(cached) if cached.base == base => cached.slot,
            _ => self.rebase(base),
        }
    }

    #[cold]
    fn rebase(&mut self, base: u64) -> usize {
        let slot = match self.index.get(&base) {
            Some(slot) => *slot,
            None => {
                self.pages.push(Box::new([0u8; PAGE_SIZE]));
                let slot = self.pages.len() - 1;
                self.index.insert(base, slot);
                tracing::trace!("allocated page 0x{base:016X}");
                slot
            }
        };
        self.cache = Some(CachedPage { base, slot });
        slot
    }

    #[inline(always)]
    fn fits_in_page(address: u64, len: usize) -> bool {
        page_offset(address) + len <= PAGE_SIZE
    }

    pub fn read_byte(&mut self, address: u64) -> u8 {
        let slot = self.resolve(address);
        self.pages[slot][page_offset(address)]
    }

    pub fn write_byte(&mut self, address: u64, value: u8) {
        let slot = self.resolve(address);
        self.pages[slot][page_offset(address)] = value;
    }

    /// Copies `out.len()` bytes starting at `address`. Addresses wrap at the
    /// top of the 64-bit space.
    pub fn read_into(&mut self, address: u64, out: &mut [u8]) {
        if Self::fits_in_page(address, out.len()) {
            let slot = self.resolve(address);
            let start = page_offset(address);
            out.copy_from_slice(&self.pages[slot][start..start + out.len()]);
            return;
        }
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.read_byte(address.wrapping_add(i as u64));
        }
    }

    /// Writes `data` starting at `address` and returns the number of bytes
    /// written.
    pub fn write_bytes(&mut self, address: u64, data: &[u8]) -> usize {
        if Self::fits_in_page(address, data.len()) {
            let slot = self.resolve(address);
            let start = page_offset(address);
            self.pages[slot][start..start + data.len()].copy_from_slice(data);
            return data.len();
        }
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(address.wrapping_add(i as u64), *byte);
        }
        data.len()
    }

    pub fn read_block(&mut self, address: u64, count: usize) -> Vec<u8> {
        let mut out = vec![0u8; count];
        self.read_into(address, &mut out);
        out
    }

    pub fn write_u8(&mut self, address: u64, value: u8) -> usize {
        self.write_byte(address, value);
        1
    }

    pub fn write_u16(&mut self, address: u64, value: u16) -> usize {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, address: u64, value: u32) -> usize {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, address: u64, value: u64) -> usize {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Stores the low `width` bytes of `value`.
    pub fn write_sized(&mut self, address: u64, width: Width, value: u64) -> usize {
        match width {
            Width::Byte => self.write_u8(address, value as u8),
            Width::Half => self.write_u16(address, value as u16),
            Width::Quarter => self.write_u32(address, value as u32),
            Width::Full => self.write_u64(address, value),
        }
    }

    /// Zero-extended little-endian load of `width` bytes.
    pub fn read_sized(&mut self, address: u64, width: Width) -> u64 {
        let mut buf = [0u8; 8];
        self.read_into(address, &mut buf[..width.bytes()]);
        u64::from_le_bytes(buf)
    }

    /// Fills `width` bytes of `register` starting at `view`'s offset, advancing
    /// source address and destination byte together. Bytes that would land
    /// past the top of the register are dropped.
    pub fn read(&mut self, address: u64, width: usize, register: &mut Register, view: View) {
        let byte_offset = view.byte_offset();
        let count = width.min(8usize.saturating_sub(byte_offset));
        let mut buf = [0u8; 8];
        self.read_into(address, &mut buf[..count]);
        for (i, byte) in buf[..count].iter().enumerate() {
            register.set_byte(byte_offset + i, *byte);
        }
    }
}
