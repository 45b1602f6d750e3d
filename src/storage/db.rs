use redb::{Database as RedbDatabase, ReadTransaction, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::short_id::{RandomShortIds, ShortIdGenerator};
use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("Could not generate a unique short ID after {attempts} attempts")]
    ShortIdsExhausted { attempts: usize },
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Persistent short ID <-> file reference mapping.
///
/// Cheap to clone; clones share the same redb handle and generator.
pub struct ShortIdStore {
    db: Arc<RedbDatabase>,
    pub(super) generator: Arc<dyn ShortIdGenerator>,
}

impl Clone for ShortIdStore {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl ShortIdStore {
    /// Open or create the mapping store in the given data directory
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        Self::open_with_generator(data_dir, Arc::new(RandomShortIds))
    }

    /// Open the store with a custom candidate source (tests force collisions with this)
    pub fn open_with_generator<P: AsRef<Path>>(
        data_dir: P,
        generator: Arc<dyn ShortIdGenerator>,
    ) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("tgstate.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        // Ensure the mapping schema exists
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SHORTS)?;
            let _ = write_txn.open_table(SHORT_FILE_REFS)?;
        }
        write_txn.commit()?;

        Ok(Self { db, generator })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }
}
