//! Brute-force address scanning fallback.
//!
//! Newer host versions stopped exporting the direct internal-lookup
//! primitive, so the resolver has to find it the hard way: estimate the
//! image base from the address of a routine that *is* always exported, then
//! walk a window of candidate addresses asking the host to describe each one
//! until the description matches the wanted name. The whole thing is
//! version-fragile by nature, which is why it hides behind [`ScanStrategy`]
//! where tests can replace it.

use crate::host::{Address, Host};

/// Locates a routine the host no longer exports.
pub trait ScanStrategy: Send + Sync {
    /// Find the address of `name`, or `None` if the scan came up empty.
    fn locate(&self, host: &dyn Host, name: &str) -> Option<Address>;
}

/// Internal routines sit within the first ~1 MiB of the image.
const SCAN_WINDOW: usize = 0x0010_0000;

/// Routine entry points are 16-byte aligned; probing finer is wasted work.
const SCAN_STEP: usize = 0x10;

/// Masking the low 3 bytes off the anchor address lands on the image base.
const BASE_MASK: Address = !0x00FF_FFFF;

/// The default linear-probe scan over the host's own image.
#[derive(Debug, Default)]
pub struct ImageScan;

impl ScanStrategy for ImageScan {
    fn locate(&self, host: &dyn Host, name: &str) -> Option<Address> {
        let anchor = host.anchor_address();
        let base = anchor & BASE_MASK;

        // The describe primitive reports "name+0x<offset>"; anchoring the
        // comparison at offset zero keeps "foo" from matching inside
        // "foo_bar" or at some interior address of the routine.
        let needle = format!("{name}+0x0");

        log::debug!(
            "Scanning {:#x}..{:#x} (anchor {:#x}) for '{}'",
            base,
            base + SCAN_WINDOW,
            anchor,
            name
        );

        let mut addr = base;
        while addr < base + SCAN_WINDOW {
            if let Some(description) = host.describe_address(addr) {
                if description.starts_with(&needle) {
                    log::debug!("Found '{}' at {:#x} ({})", name, addr, description);
                    return Some(addr);
                }
            }
            addr += SCAN_STEP;
        }

        log::warn!("Scan window exhausted without finding '{}'", name);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;

    #[test]
    fn finds_symbol_by_zero_offset_description() {
        let host = MockHost::new();
        host.set_anchor(0x0120_1000);
        // Base estimate: 0x0100_0000. Plant a decoy with a non-zero offset
        // earlier in the window and the real entry after it.
        host.describe_at(0x0100_0010, "some_neighbor+0x10/0x1a0");
        host.describe_at(0x0100_0040, "wanted_routine+0x0/0x80");

        let found = ImageScan.locate(&host, "wanted_routine");
        assert_eq!(found, Some(0x0100_0040));
    }

    #[test]
    fn does_not_match_name_prefixes() {
        let host = MockHost::new();
        host.set_anchor(0x0100_0000);
        host.describe_at(0x0100_0020, "wanted_routine_ext+0x0/0x40");

        assert_eq!(ImageScan.locate(&host, "wanted_routine"), None);
    }

    #[test]
    fn empty_window_yields_none() {
        let host = MockHost::new();
        host.set_anchor(0x0100_0000);

        assert_eq!(ImageScan.locate(&host, "anything"), None);
    }
}
