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

//! The upload session manager: owns the lifecycle of one object's
//! multipart upload and resumes from cached session state when possible.

use crate::client::{CompletedUpload, ObjectSpec, ObjectStore};
use crate::config::{MAX_CHUNK_SIZE, MAX_PARTS_COUNT, MIN_CHUNK_SIZE, UploadIdPolicy, UploaderConfig};
use crate::error::{PartError, Result, UploadError};
use crate::part::{PartUploadContext, upload_one_part};
use crate::retry::retry;
use crate::session::{MemorySessionStore, SessionKey, SessionStore, UploadSession};
use crate::source::RangeSource;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One `run_task` invocation: the object to upload, optional overrides
/// and the repeatable byte-range source producing part bodies.
#[derive(Clone)]
pub struct UploadTask {
    pub object: ObjectSpec,
    /// Disambiguates sessions for otherwise identical objects, e.g. a
    /// caller-generated uuid. Optional.
    pub hint: Option<String>,
    pub chunk_size: Option<u64>,
    pub parallel: Option<usize>,
    pub source: Arc<dyn RangeSource>,
}

impl UploadTask {
    pub fn new(object: ObjectSpec, source: Arc<dyn RangeSource>) -> Self {
        Self {
            object,
            hint: None,
            chunk_size: None,
            parallel: None,
            source,
        }
    }
}

/// Resumable multipart upload manager.
///
/// Sessions are cached by composite identity (bucket, region, key, chunk
/// size, content length, hint); a retried `run_task` call picks up where
/// the previous one stopped, skipping parts already uploaded and
/// verified.
pub struct MultipartUploader {
    store: Arc<dyn ObjectStore>,
    sessions: Arc<dyn SessionStore>,
    config: UploaderConfig,
}

impl MultipartUploader {
    pub fn new(store: Arc<dyn ObjectStore>, config: UploaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            sessions: Arc::new(MemorySessionStore::new()),
            config,
        })
    }

    /// Replace the in-memory session cache, e.g. with a store persisting
    /// sessions across process restarts.
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Upload the whole object, resuming from cached state when the same
    /// identity was attempted before. Resolves with the service's
    /// completion result; the cached session is dropped on success and on
    /// a dead upload id (`NoSuchUpload`), so the next call starts fresh.
    pub async fn run_task(&self, task: UploadTask) -> Result<CompletedUpload> {
        let chunk_size = resolve_chunk_size(task.object.content_length, task.chunk_size, &self.config)?;
        let parallel = task.parallel.unwrap_or(self.config.default_parallel).max(1);
        let total_parts = total_parts(task.object.content_length, chunk_size);

        let key = SessionKey {
            bucket: task.object.bucket.clone(),
            region: task.object.region.clone(),
            key: task.object.key.clone(),
            chunk_size,
            content_length: task.object.content_length,
            hint: task.hint.clone().unwrap_or_default(),
        };
        let session = self.sessions.get_or_create(&key).await;

        info!(
            bucket = %task.object.bucket,
            key = %task.object.key,
            content_length = task.object.content_length,
            chunk_size,
            total_parts,
            parallel,
            "running multipart upload task"
        );

        let result = self.drive(&task, &key, &session, chunk_size, parallel, total_parts).await;
        if let Err(err) = &result {
            if err.is_no_such_upload() {
                warn!(key = %key.cache_key(), "upload id no longer exists, dropping cached session");
                self.sessions.remove(&key).await;
            }
        }
        result
    }

    /// Abort the in-progress upload for this identity, if any, and drop
    /// its cached session.
    pub async fn abort_task(&self, object: &ObjectSpec, hint: Option<&str>, chunk_size: Option<u64>) -> Result<()> {
        let chunk_size = resolve_chunk_size(object.content_length, chunk_size, &self.config)?;
        let key = SessionKey {
            bucket: object.bucket.clone(),
            region: object.region.clone(),
            key: object.key.clone(),
            chunk_size,
            content_length: object.content_length,
            hint: hint.unwrap_or_default().to_string(),
        };
        let session = self.sessions.get_or_create(&key).await;
        let upload_id = session.lock().await.upload_id().map(str::to_string);

        if let Some(upload_id) = upload_id {
            let cfg = &self.config;
            let upload_id_ref = &upload_id;
            retry(cfg.max_attempts, cfg.retry_delay, "abort_multipart_upload", || async move {
                self.store.abort_multipart_upload(object, upload_id_ref).await
            })
            .await?;
            info!(upload_id = %upload_id, key = %object.key, "aborted multipart upload");
        }
        self.sessions.remove(&key).await;
        Ok(())
    }

    async fn drive(
        &self,
        task: &UploadTask,
        key: &SessionKey,
        session: &Arc<Mutex<UploadSession>>,
        chunk_size: u64,
        parallel: usize,
        total_parts: u32,
    ) -> Result<CompletedUpload> {
        let upload_id = self.ensure_upload_id(&task.object, key, session).await?;
        self.reconcile_parts(&task.object, key, session, &upload_id).await?;
        self.upload_parts(task, key, session, &upload_id, chunk_size, parallel, total_parts)
            .await?;

        let parts = session.lock().await.completed_parts(total_parts)?;
        let cfg = &self.config;
        let upload_id_ref = &upload_id;
        let completed = retry(cfg.max_attempts, cfg.retry_delay, "complete_multipart_upload", || {
            let parts = parts.clone();
            async move { self.store.complete_multipart_upload(&task.object, upload_id_ref, parts).await }
        })
        .await?;

        self.sessions.remove(key).await;
        info!(
            bucket = %task.object.bucket,
            key = %task.object.key,
            etag = %completed.etag,
            total_parts,
            "multipart upload completed"
        );
        Ok(completed)
    }

    /// Idempotent initiation: keep the session's upload id when present,
    /// otherwise obtain one according to the configured policy.
    async fn ensure_upload_id(
        &self,
        object: &ObjectSpec,
        key: &SessionKey,
        session: &Mutex<UploadSession>,
    ) -> Result<String> {
        if let Some(id) = session.lock().await.upload_id() {
            return Ok(id.to_string());
        }

        let cfg = &self.config;
        let candidate = match cfg.upload_id_policy {
            UploadIdPolicy::ReuseExisting => {
                let listing = retry(cfg.max_attempts, cfg.retry_delay, "list_multipart_uploads", || async move {
                    self.store
                        .list_multipart_uploads(&object.bucket, &object.region, &object.key)
                        .await
                })
                .await?;
                match listing.uploads.iter().find(|u| u.key == object.key) {
                    Some(existing) => {
                        debug!(upload_id = %existing.upload_id, "reusing in-progress upload");
                        existing.upload_id.clone()
                    }
                    None => self.initiate(object).await?,
                }
            }
            UploadIdPolicy::AlwaysNew => self.initiate(object).await?,
        };

        let mut guard = session.lock().await;
        guard.assign_upload_id(&candidate);
        // A concurrent caller may have assigned first; the session's id wins.
        let id = guard.upload_id().map(str::to_string).unwrap_or(candidate);
        self.sessions.save(key, &guard).await;
        Ok(id)
    }

    async fn initiate(&self, object: &ObjectSpec) -> Result<String> {
        let cfg = &self.config;
        let initiated = retry(cfg.max_attempts, cfg.retry_delay, "initiate_multipart_upload", || async move {
            self.store.initiate_multipart_upload(object).await
        })
        .await?;
        debug!(upload_id = %initiated.upload_id, key = %object.key, "initiated multipart upload");
        Ok(initiated.upload_id)
    }

    /// Idempotent reconciliation: when the session holds no parts yet,
    /// page through the service's part listing and seed the session from
    /// it. This is what makes resume-after-restart work.
    async fn reconcile_parts(
        &self,
        object: &ObjectSpec,
        key: &SessionKey,
        session: &Mutex<UploadSession>,
        upload_id: &str,
    ) -> Result<()> {
        if !session.lock().await.is_unreconciled() {
            return Ok(());
        }

        let cfg = &self.config;
        let mut marker = None;
        let mut seeded = 0usize;
        loop {
            let page = retry(cfg.max_attempts, cfg.retry_delay, "list_parts", || async move {
                self.store.list_parts(object, upload_id, marker).await
            })
            .await?;

            {
                let mut guard = session.lock().await;
                for part in page.parts {
                    guard.record_part(part.part_number, part.etag);
                    seeded += 1;
                }
            }

            if !page.is_truncated || page.next_marker.is_none() {
                break;
            }
            marker = page.next_marker;
        }

        if seeded > 0 {
            debug!(seeded, upload_id = %upload_id, "seeded session from uploaded-part listing");
            let guard = session.lock().await;
            self.sessions.save(key, &guard).await;
        }
        Ok(())
    }

    /// Upload all parts with at most `parallel` in flight. A 403 aborts
    /// the batch immediately; any other failures are collected and
    /// surfaced together once every part has settled.
    #[allow(clippy::too_many_arguments)]
    async fn upload_parts(
        &self,
        task: &UploadTask,
        key: &SessionKey,
        session: &Arc<Mutex<UploadSession>>,
        upload_id: &str,
        chunk_size: u64,
        parallel: usize,
        total_parts: u32,
    ) -> Result<()> {
        if total_parts == 0 {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(parallel));
        let mut tasks = JoinSet::new();
        for part_number in 1..=total_parts {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let source = task.source.clone();
            let object = task.object.clone();
            let upload_id = upload_id.to_string();
            let session = session.clone();
            let algorithm = self.config.checksum_algorithm;
            let max_attempts = self.config.max_attempts;
            let retry_delay = self.config.retry_delay;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            part_number,
                            Err(UploadError::InvalidState("part scheduler stopped".to_string())),
                        );
                    }
                };
                let ctx = PartUploadContext {
                    store: store.as_ref(),
                    source: source.as_ref(),
                    object: &object,
                    upload_id: &upload_id,
                    chunk_size,
                    algorithm,
                    max_attempts,
                    retry_delay,
                };
                (part_number, upload_one_part(&ctx, &session, part_number).await)
            });
        }

        let mut failures: Vec<PartError> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((part_number, Err(err))) => {
                    if err.is_access_denied() {
                        tasks.abort_all();
                        warn!(part_number, "part upload denied, aborting remaining parts");
                        return Err(UploadError::PartsFailed(vec![PartError {
                            part_number,
                            source: err,
                        }]));
                    }
                    failures.push(PartError {
                        part_number,
                        source: err,
                    });
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    failures.push(PartError {
                        part_number: 0,
                        source: UploadError::InvalidState(format!("part task failed: {join_err}")),
                    });
                }
            }
        }

        {
            let guard = session.lock().await;
            self.sessions.save(key, &guard).await;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by_key(|failure| failure.part_number);
            Err(UploadError::PartsFailed(failures))
        }
    }
}

/// Effective chunk size for an object. An explicit request is validated
/// against the service limits; otherwise the smallest doubling bucket
/// starting at 1 MiB that keeps the upload within the part-count cap is
/// chosen, floored at the configured default and capped at 5 GiB.
pub(crate) fn resolve_chunk_size(content_length: u64, requested: Option<u64>, config: &UploaderConfig) -> Result<u64> {
    if let Some(size) = requested {
        if size == 0 {
            return Err(UploadError::InvalidArgument("chunk_size must be positive".to_string()));
        }
        if size > MAX_CHUNK_SIZE {
            return Err(UploadError::InvalidArgument(format!(
                "chunk_size {size} exceeds the {MAX_CHUNK_SIZE} byte maximum"
            )));
        }
        if content_length.div_ceil(size) > MAX_PARTS_COUNT {
            return Err(UploadError::InvalidArgument(format!(
                "chunk_size {size} needs more than {MAX_PARTS_COUNT} parts for {content_length} bytes"
            )));
        }
        return Ok(size);
    }

    let mut bucket = MIN_CHUNK_SIZE;
    while bucket.saturating_mul(MAX_PARTS_COUNT) < content_length {
        bucket *= 2;
    }
    Ok(bucket.max(config.default_chunk_size).min(MAX_CHUNK_SIZE))
}

pub(crate) fn total_parts(content_length: u64, chunk_size: u64) -> u32 {
    content_length.div_ceil(chunk_size) as u32
}
