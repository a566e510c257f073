//! Local mirror of the remote wishbone register space.
//!
//! [`RegisterShadow`] is a flat [`WB_REG_SIZE`]-byte buffer with last-known-
//! value semantics: it is written only by the session's dispatch path (read
//! responses and base-period updates) and read by the application at any
//! time.  Reads never block and never trigger a remote fetch; the value may
//! be stale between refresh cycles.
//!
//! Process lifetime, zero-initialised, never reallocated — one instance per
//! connected board, owned by the session.

use crate::regs::WB_REG_SIZE;

/// Byte-for-byte shadow of the remote register space.
pub struct RegisterShadow {
    regs: Box<[u8; WB_REG_SIZE]>,
}

impl Default for RegisterShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterShadow {
    /// Create a zero-filled shadow.
    pub fn new() -> Self {
        Self {
            regs: vec![0u8; WB_REG_SIZE].into_boxed_slice().try_into().unwrap(),
        }
    }

    /// `true` when `[addr, addr + len)` lies inside the register space.
    pub fn in_range(addr: u16, len: usize) -> bool {
        (addr as usize) + len <= WB_REG_SIZE
    }

    /// Borrow the most recently refreshed bytes at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if the range leaves the register space; callers validate
    /// addresses at command-queue time, so this indicates a host-side bug.
    pub fn read(&self, addr: u16, len: usize) -> &[u8] {
        assert!(Self::in_range(addr, len), "shadow read out of range");
        &self.regs[addr as usize..addr as usize + len]
    }

    /// Scatter `data` into the shadow starting at `addr`.
    ///
    /// Out-of-range updates are ignored: the device announced an address we
    /// do not model, which must not corrupt neighbouring registers.
    pub fn update(&mut self, addr: u16, data: &[u8]) {
        if !Self::in_range(addr, data.len()) {
            log::warn!(
                "[wou] shadow update out of range: addr={:#06x} len={}",
                addr,
                data.len()
            );
            return;
        }
        self.regs[addr as usize..addr as usize + data.len()].copy_from_slice(data);
    }
}

impl std::fmt::Debug for RegisterShadow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterShadow")
            .field("size", &WB_REG_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{SSIF_BASE, SSIF_PULSE_POS};

    #[test]
    fn starts_zeroed() {
        let s = RegisterShadow::new();
        assert!(s.read(0, 64).iter().all(|b| *b == 0));
        assert!(s.read((WB_REG_SIZE - 16) as u16, 16).iter().all(|b| *b == 0));
    }

    #[test]
    fn update_then_read_back() {
        let mut s = RegisterShadow::new();
        let addr = SSIF_BASE + SSIF_PULSE_POS;
        s.update(addr, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(s.read(addr, 4), &[0xDE, 0xAD, 0xBE, 0xEF]);
        // Neighbours untouched.
        assert_eq!(s.read(addr + 4, 1), &[0]);
    }

    #[test]
    fn out_of_range_update_is_dropped() {
        let mut s = RegisterShadow::new();
        s.update((WB_REG_SIZE - 2) as u16, &[1, 2, 3, 4]);
        assert_eq!(s.read((WB_REG_SIZE - 2) as u16, 2), &[0, 0]);
    }

    #[test]
    fn in_range_boundaries() {
        assert!(RegisterShadow::in_range(0, WB_REG_SIZE));
        assert!(RegisterShadow::in_range((WB_REG_SIZE - 1) as u16, 1));
        assert!(!RegisterShadow::in_range((WB_REG_SIZE - 1) as u16, 2));
    }
}
