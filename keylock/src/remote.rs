//! The remote unlock channel.
//!
//! A remote command listener (outside this crate) sets the signal when an unlock was approved
//! remotely; the orchestrator clears it once it has acted on it.

use keylock_gpio::Signal;
use std::fmt::Debug;

/// An externally settable "unlock approved remotely" flag.
pub trait RemoteUnlockSignal: Debug + Send + Sync {
    fn is_set(&self) -> bool;
    fn clear(&self);
}

impl RemoteUnlockSignal for Signal {
    fn is_set(&self) -> bool {
        Signal::is_set(self)
    }

    fn clear(&self) {
        Signal::clear(self)
    }
}
