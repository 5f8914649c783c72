use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;

use super::{Error, InsertOutcome, Result, SubscriberRecord};
use crate::web::types::NewSubscriber;

/// A process local store keyed by the normalized email.
/// The check and the write happen under one lock, so racing duplicates resolve to one record.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    subscribers: Arc<Mutex<HashMap<String, SubscriberRecord>>>,
}

impl MemoryStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SubscriberRecord>>> {
        self.subscribers
            .lock()
            .map_err(|_| Error::MemoryStorePoisoned)
    }

    pub fn insert_or_ignore(&self, subscriber: &NewSubscriber) -> Result<InsertOutcome> {
        let mut subscribers = self.lock()?;

        match subscribers.entry(subscriber.email.as_ref().to_string()) {
            Entry::Vacant(e) => {
                e.insert(SubscriberRecord::from_new(subscriber, Utc::now()));
                Ok(InsertOutcome::Inserted)
            }
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadySubscribed),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<SubscriberRecord>> {
        Ok(self.lock()?.get(email).cloned())
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self.lock()?.len() as i64)
    }
}
