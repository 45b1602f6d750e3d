use redb::{ReadableTable, ReadableTableMetadata};

use super::db::{DatabaseError, ShortIdStore};
use super::tables::*;

/// Upper bound on candidate draws per registration.
pub const MAX_GENERATE_ATTEMPTS: usize = 10;

impl ShortIdStore {
    // ========================================================================
    // Registration
    // ========================================================================

    /// Return the short ID for `file_ref`, creating one if it has none yet.
    ///
    /// Repeat calls with the same file reference return the same short ID.
    /// A fresh ID is drawn at most [`MAX_GENERATE_ATTEMPTS`] times; when every
    /// candidate collides nothing is written and `ShortIdsExhausted` is returned.
    pub fn generate_and_save(&self, file_ref: &str) -> Result<String, DatabaseError> {
        debug_assert!(!file_ref.is_empty(), "file_ref must not be empty");

        // Fast path without taking the writer lock
        if let Some(existing) = self.short_id_for(file_ref)? {
            return Ok(existing);
        }

        let write_txn = self.begin_write()?;
        let short_id = {
            let mut refs = write_txn.open_table(SHORT_FILE_REFS)?;
            let existing = refs.get(file_ref)?.map(|v| v.value().to_string());
            if let Some(existing) = existing {
                // Registered by a concurrent request since the fast-path check
                return Ok(existing);
            }

            let mut shorts = write_txn.open_table(SHORTS)?;
            let mut accepted = None;
            for attempt in 1..=MAX_GENERATE_ATTEMPTS {
                let candidate = self.generator.generate();
                if shorts.get(candidate.as_str())?.is_none() {
                    accepted = Some(candidate);
                    break;
                }
                tracing::debug!(candidate = %candidate, attempt, "Short ID collision");
            }

            let Some(short_id) = accepted else {
                // Dropping the transaction aborts it
                return Err(DatabaseError::ShortIdsExhausted {
                    attempts: MAX_GENERATE_ATTEMPTS,
                });
            };

            shorts.insert(short_id.as_str(), file_ref)?;
            refs.insert(file_ref, short_id.as_str())?;
            short_id
        };
        write_txn.commit()?;

        tracing::debug!(short_id = %short_id, file_ref = %file_ref, "Registered short ID");
        Ok(short_id)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Resolve a short ID to its backend file reference
    pub fn lookup(&self, short_id: &str) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SHORTS)?;
        let file_ref = table.get(short_id)?.map(|v| v.value().to_string());
        Ok(file_ref)
    }

    /// Find the short ID already registered for a file reference
    pub fn short_id_for(&self, file_ref: &str) -> Result<Option<String>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SHORT_FILE_REFS)?;
        let short_id = table.get(file_ref)?.map(|v| v.value().to_string());
        Ok(short_id)
    }

    /// Number of registered short IDs
    pub fn count(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SHORTS)?;
        Ok(table.len()?)
    }
}
