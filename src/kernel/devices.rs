use super::Pid;

use crate::io::TERMINAL_COUNT;

/// Busy/free tracking for the terminals. Each terminal has one claim
/// covering both its keyboard and its screen.
#[derive(Debug)]
pub struct DeviceTable {
    holders: [Option<Pid>; TERMINAL_COUNT],
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTable {
    pub fn new() -> DeviceTable {
        DeviceTable {
            holders: [None; TERMINAL_COUNT],
        }
    }

    pub fn holder(&self, terminal: usize) -> Option<Pid> {
        self.holders.get(terminal).copied().flatten()
    }

    pub fn is_free(&self, terminal: usize) -> bool {
        terminal < TERMINAL_COUNT && self.holder(terminal).is_none()
    }

    /// Free, or already claimed by `pid`.
    pub fn is_available_to(&self, terminal: usize, pid: Pid) -> bool {
        terminal < TERMINAL_COUNT && self.holder(terminal).map_or(true, |holder| holder == pid)
    }

    /// Marks the terminal busy on behalf of `pid`. Fails when another
    /// process holds it.
    pub fn claim(&mut self, terminal: usize, pid: Pid) -> bool {
        if !self.is_available_to(terminal, pid) {
            return false;
        }
        self.holders[terminal] = Some(pid);
        true
    }

    /// Frees the terminal if `pid` is the one holding it.
    pub fn release(&mut self, terminal: usize, pid: Pid) -> bool {
        match self.holders.get_mut(terminal) {
            Some(slot) if *slot == Some(pid) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Frees every terminal held by `pid`.
    pub fn release_all(&mut self, pid: Pid) {
        for slot in self.holders.iter_mut().filter(|slot| **slot == Some(pid)) {
            *slot = None;
        }
    }

    pub fn busy_count(&self) -> usize {
        self.holders.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devices_start_free() {
        let devices = DeviceTable::new();
        assert!((0..TERMINAL_COUNT).all(|t| devices.is_free(t)));
        assert_eq!(devices.busy_count(), 0);
    }

    #[test]
    fn test_devices_claim_is_exclusive() {
        let mut devices = DeviceTable::new();

        assert!(devices.claim(0, 0));
        assert!(devices.claim(0, 0));
        assert!(!devices.claim(0, 4));
        assert_eq!(devices.holder(0), Some(0));
        assert!(devices.is_available_to(0, 0));
        assert!(!devices.is_available_to(0, 4));
    }

    #[test]
    fn test_devices_release_only_by_holder() {
        let mut devices = DeviceTable::new();
        devices.claim(1, 1);

        assert!(!devices.release(1, 5));
        assert!(devices.release(1, 1));
        assert!(devices.is_free(1));
    }

    #[test]
    fn test_devices_release_all() {
        let mut devices = DeviceTable::new();
        devices.claim(2, 2);
        devices.claim(3, 3);

        devices.release_all(2);

        assert!(devices.is_free(2));
        assert_eq!(devices.holder(3), Some(3));
    }

    #[test]
    fn test_devices_out_of_range() {
        let mut devices = DeviceTable::new();
        assert!(!devices.claim(TERMINAL_COUNT, 0));
        assert!(!devices.is_free(TERMINAL_COUNT));
    }
}
