//! Driver gate — player rounds, autoplay and free spins never drive the
//! controller together

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Loop that may drive the spin controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// A player-requested round, awarded free spins included
    Manual,
    Autoplay,
    FreeSpins,
}

/// Records which loop currently drives the controller
#[derive(Debug, Default)]
pub struct DriverGate {
    holder: Mutex<Option<Driver>>,
}

impl DriverGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the gate; fails with the current holder
    pub fn acquire(self: &Arc<Self>, driver: Driver) -> Result<DriverLease, Driver> {
        let mut holder = self.holder.lock();
        if let Some(current) = *holder {
            return Err(current);
        }
        *holder = Some(driver);
        Ok(DriverLease {
            gate: Arc::clone(self),
            driver,
        })
    }

    pub fn holder(&self) -> Option<Driver> {
        *self.holder.lock()
    }

    pub fn holds(&self, driver: Driver) -> bool {
        self.holder() == Some(driver)
    }

    pub fn is_free(&self) -> bool {
        self.holder().is_none()
    }
}

/// Held while a loop drives the controller; releases on drop
#[derive(Debug)]
pub struct DriverLease {
    gate: Arc<DriverGate>,
    driver: Driver,
}

impl DriverLease {
    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Pass the gate to another driver without releasing it in between
    pub fn hand_over(mut self, driver: Driver) -> Self {
        *self.gate.holder.lock() = Some(driver);
        self.driver = driver;
        self
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        let mut holder = self.gate.holder.lock();
        if *holder == Some(self.driver) {
            *holder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_acquire() {
        let gate = DriverGate::new();
        let lease = gate.acquire(Driver::Autoplay).unwrap();
        assert_eq!(lease.driver(), Driver::Autoplay);
        assert!(gate.holds(Driver::Autoplay));

        assert_eq!(gate.acquire(Driver::FreeSpins).unwrap_err(), Driver::Autoplay);
        assert_eq!(gate.acquire(Driver::Autoplay).unwrap_err(), Driver::Autoplay);
    }

    #[test]
    fn test_release_on_drop() {
        let gate = DriverGate::new();
        {
            let _lease = gate.acquire(Driver::FreeSpins).unwrap();
            assert!(!gate.is_free());
        }
        assert!(gate.is_free());
        assert!(gate.acquire(Driver::Autoplay).is_ok());
    }

    #[test]
    fn test_hand_over_keeps_gate_closed() {
        let gate = DriverGate::new();
        let lease = gate.acquire(Driver::Manual).unwrap();

        let lease = lease.hand_over(Driver::FreeSpins);
        assert_eq!(lease.driver(), Driver::FreeSpins);
        assert!(gate.holds(Driver::FreeSpins));
        assert_eq!(gate.acquire(Driver::Autoplay).unwrap_err(), Driver::FreeSpins);

        drop(lease);
        assert!(gate.is_free());
    }
}
