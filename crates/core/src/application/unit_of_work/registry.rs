// Transaction Registry - connection key -> active transaction record

use super::record::ActiveTransactionRecord;
use crate::domain::ConnectionKey;
use crate::error::{Result, UnitOfWorkError};
use std::collections::HashMap;

/// Records of one unit of work, iterated in insertion order
#[derive(Default)]
pub struct TransactionRegistry {
    records: Vec<ActiveTransactionRecord>,
    index: HashMap<ConnectionKey, usize>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &ConnectionKey) -> Option<&ActiveTransactionRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn lookup_mut(&mut self, key: &ConnectionKey) -> Option<&mut ActiveTransactionRecord> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.index.contains_key(key)
    }

    /// Insert under the record's own key; fails if that key is already active
    pub fn insert(&mut self, record: ActiveTransactionRecord) -> Result<&mut ActiveTransactionRecord> {
        if self.index.contains_key(record.key()) {
            return Err(UnitOfWorkError::DuplicateTransaction {
                key: record.key().clone(),
            });
        }

        let position = self.records.len();
        self.index.insert(record.key().clone(), position);
        self.records.push(record);
        Ok(&mut self.records[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveTransactionRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveTransactionRecord> {
        self.records.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConnectionKey> {
        self.records.iter().map(ActiveTransactionRecord::key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record. Callers release the records' resources first.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}
