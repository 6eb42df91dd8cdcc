// Copyright 2025 Multiup Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Upload session state and the session cache.
//!
//! A session survives across retried `run_task` invocations so a crashed
//! or re-invoked caller resumes instead of restarting. Each session is
//! guarded by its own async mutex; concurrent `run_task` calls for the
//! same identity share one session object.

use crate::client::CompletedPart;
use crate::error::{Result, UploadError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Composite identity of one upload session. Two calls with the same key
/// operate on the same cached session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub bucket: String,
    pub region: String,
    pub key: String,
    pub chunk_size: u64,
    pub content_length: u64,
    /// Caller-supplied disambiguator, empty when unused.
    pub hint: String,
}

impl SessionKey {
    pub fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.bucket, self.region, self.key, self.chunk_size, self.content_length, self.hint
        )
    }
}

/// Mutable upload state: the server-assigned upload id and the parts
/// recorded so far. A part entry with an empty ETag marks a part whose
/// checksum verification failed; it is re-uploaded on the next attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSession {
    upload_id: Option<String>,
    parts: BTreeMap<u32, String>,
}

impl UploadSession {
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Assign the upload id. A session's id is set exactly once; later
    /// calls with a different id are ignored.
    pub fn assign_upload_id(&mut self, upload_id: impl Into<String>) {
        if self.upload_id.is_none() {
            self.upload_id = Some(upload_id.into());
        }
    }

    /// Record a part's ETag, replacing any previous entry for the number.
    pub fn record_part(&mut self, part_number: u32, etag: impl Into<String>) {
        self.parts.insert(part_number, etag.into());
    }

    /// Mark a part as failed verification: keep the entry, drop the ETag.
    pub fn clear_part(&mut self, part_number: u32) {
        self.parts.insert(part_number, String::new());
    }

    /// A part counts as uploaded only with a non-empty ETag on record.
    pub fn has_verified_part(&self, part_number: u32) -> bool {
        self.parts.get(&part_number).is_some_and(|etag| !etag.is_empty())
    }

    pub fn verified_parts(&self) -> usize {
        self.parts.values().filter(|etag| !etag.is_empty()).count()
    }

    /// True when no parts have been recorded at all, i.e. the session has
    /// not yet been reconciled against the service's part listing.
    pub fn is_unreconciled(&self) -> bool {
        self.parts.is_empty()
    }

    /// The full part list for completion, ascending by part number.
    /// Fails unless every part `1..=total_parts` carries a non-empty ETag.
    pub fn completed_parts(&self, total_parts: u32) -> Result<Vec<CompletedPart>> {
        let mut out = Vec::with_capacity(total_parts as usize);
        for part_number in 1..=total_parts {
            match self.parts.get(&part_number) {
                Some(etag) if !etag.is_empty() => out.push(CompletedPart {
                    part_number,
                    etag: etag.clone(),
                }),
                Some(_) => {
                    return Err(UploadError::InvalidState(format!(
                        "part {part_number} has no verified checksum"
                    )));
                }
                None => {
                    return Err(UploadError::InvalidState(format!("part {part_number} was never uploaded")));
                }
            }
        }
        Ok(out)
    }
}

/// Session cache keyed by [`SessionKey`]. The default in-memory store
/// serves single-process resumption; sessions serialize with serde so an
/// external store can persist them across process restarts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, key: &SessionKey) -> Arc<Mutex<UploadSession>>;

    async fn remove(&self, key: &SessionKey);

    /// Persistence hook invoked after session state changes. The
    /// in-memory store has nothing to do here.
    async fn save(&self, _key: &SessionKey, _session: &UploadSession) {}
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, Arc<Mutex<UploadSession>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, key: &SessionKey) -> Arc<Mutex<UploadSession>> {
        let mut map = self.inner.lock().await;
        map.entry(key.cache_key()).or_default().clone()
    }

    async fn remove(&self, key: &SessionKey) {
        let mut map = self.inner.lock().await;
        map.remove(&key.cache_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey {
            bucket: "bkt".into(),
            region: "ap-test".into(),
            key: "dir/obj.bin".into(),
            chunk_size: 1024 * 1024,
            content_length: 10 * 1024 * 1024,
            hint: "".into(),
        }
    }

    #[test]
    fn upload_id_assigned_once() {
        let mut session = UploadSession::default();
        assert!(session.upload_id().is_none());
        session.assign_upload_id("first");
        session.assign_upload_id("second");
        assert_eq!(session.upload_id(), Some("first"));
    }

    #[test]
    fn reupload_replaces_part_entry() {
        let mut session = UploadSession::default();
        session.record_part(2, "old");
        session.record_part(2, "new");
        assert_eq!(session.verified_parts(), 1);
        assert_eq!(session.completed_parts(0).unwrap(), vec![]);
        assert!(session.has_verified_part(2));
    }

    #[test]
    fn cleared_part_is_not_verified() {
        let mut session = UploadSession::default();
        session.record_part(1, "etag-1");
        session.clear_part(1);
        assert!(!session.has_verified_part(1));
        assert!(!session.is_unreconciled());
        assert!(session.completed_parts(1).is_err());
    }

    #[test]
    fn completed_parts_sorted_and_complete() {
        let mut session = UploadSession::default();
        session.record_part(3, "e3");
        session.record_part(1, "e1");
        session.record_part(2, "e2");

        let parts = session.completed_parts(3).unwrap();
        let numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        assert!(session.completed_parts(4).is_err());
    }

    #[test]
    fn session_round_trips_through_serde() {
        let mut session = UploadSession::default();
        session.assign_upload_id("upl-1");
        session.record_part(1, "e1");
        session.clear_part(2);

        let json = serde_json::to_string(&session).unwrap();
        let restored: UploadSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.upload_id(), Some("upl-1"));
        assert!(restored.has_verified_part(1));
        assert!(!restored.has_verified_part(2));
    }

    #[tokio::test]
    async fn store_returns_same_session_for_same_key() {
        let store = MemorySessionStore::new();
        let a = store.get_or_create(&key()).await;
        let b = store.get_or_create(&key()).await;
        assert!(Arc::ptr_eq(&a, &b));

        store.remove(&key()).await;
        let c = store.get_or_create(&key()).await;
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn distinct_hints_get_distinct_sessions() {
        let store = MemorySessionStore::new();
        let a = store.get_or_create(&key()).await;
        let other = SessionKey {
            hint: "caller-2".into(),
            ..key()
        };
        let b = store.get_or_create(&other).await;
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
