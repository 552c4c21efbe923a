//! Test directory.
//!
//! Maps every staged [`TestAddress`] to the [`InstantiationInstruction`]
//! an in-container executor needs to run it. A reactor writes its entries
//! while it stages, then seals exactly those entries. Sealed entries are
//! only read until teardown removes them again, while other reactors
//! sharing the directory keep registering their own.

use crate::address::TestAddress;
use crate::error::{ReactorError, Result};
use crate::instruction::InstantiationInstruction;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Debug)]
struct Entry {
    instruction: InstantiationInstruction,
    /// Number of staged reactors that registered this address.
    holders: usize,
    sealed: bool,
}

/// Registry of instantiation instructions keyed by test address.
#[derive(Debug, Default)]
pub struct TestDirectory {
    entries: RwLock<HashMap<TestAddress, Entry>>,
}

impl TestDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide directory.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TestDirectory>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Registers an address.
    ///
    /// Registering an address that is already present with the same
    /// instruction shares the entry; it stays until every holder removed it.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if the address is registered with a
    /// different instruction.
    pub fn add(&self, address: TestAddress, instruction: InstantiationInstruction) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ReactorError::lock_poisoned())?;

        match entries.get_mut(&address) {
            Some(entry) if entry.instruction == instruction => {
                entry.holders += 1;
                Ok(())
            }
            Some(entry) => Err(ReactorError::invalid_state(format!(
                "address {address} is already registered for {}",
                entry.instruction
            ))),
            None => {
                entries.insert(
                    address,
                    Entry {
                        instruction,
                        holders: 1,
                        sealed: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Marks the given addresses as fully staged. Lookups are only served
    /// for sealed entries.
    ///
    /// # Errors
    ///
    /// Returns an unknown target error if an address was never registered.
    pub fn seal<'a>(&self, addresses: impl IntoIterator<Item = &'a TestAddress>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ReactorError::lock_poisoned())?;

        for address in addresses {
            entries
                .get_mut(address)
                .ok_or_else(|| ReactorError::unknown_target(address.identifier()))?
                .sealed = true;
        }
        Ok(())
    }

    /// Returns whether an address is registered and sealed.
    #[must_use]
    pub fn is_sealed(&self, address: &TestAddress) -> bool {
        self.entries
            .read()
            .map(|entries| entries.get(address).is_some_and(|e| e.sealed))
            .unwrap_or(false)
    }

    /// Looks up the instruction for an address.
    ///
    /// # Errors
    ///
    /// Returns an unknown target error if the address was never registered,
    /// and an invalid state error while its reactor is still staging.
    pub fn lookup(&self, address: &TestAddress) -> Result<InstantiationInstruction> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ReactorError::lock_poisoned())?;

        let entry = entries
            .get(address)
            .ok_or_else(|| ReactorError::unknown_target(address.identifier()))?;
        if !entry.sealed {
            return Err(ReactorError::invalid_state(format!(
                "lookup of {address} before staging completed"
            )));
        }
        Ok(entry.instruction.clone())
    }

    /// Returns whether an address is registered.
    #[must_use]
    pub fn contains(&self, address: &TestAddress) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(address))
            .unwrap_or(false)
    }

    /// Returns the number of registered addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns whether no address is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops one registration of each given address. An entry disappears
    /// once its last holder removed it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn remove_all<'a>(&self, addresses: impl IntoIterator<Item = &'a TestAddress>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ReactorError::lock_poisoned())?;

        for address in addresses {
            if let Some(entry) = entries.get_mut(address) {
                entry.holders -= 1;
                if entry.holders == 0 {
                    entries.remove(address);
                }
            }
        }
        Ok(())
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| ReactorError::lock_poisoned())?
            .clear();
        Ok(())
    }
}
