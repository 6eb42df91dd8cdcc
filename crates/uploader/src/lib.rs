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

//! Resumable multipart upload manager.
//!
//! `multiup` drives one object's multipart upload against any storage
//! service exposed through the [`ObjectStore`] trait: it caches per-object
//! sessions so retried invocations resume instead of restarting, uploads
//! parts with bounded parallelism, verifies every part's CRC against the
//! checksum the service reports, retries each storage call a bounded
//! number of times and completes the upload with the part list sorted by
//! part number.
//!
//! ```no_run
//! use multiup::{BytesSource, MultipartUploader, ObjectSpec, UploadTask, UploaderConfig};
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn multiup::ObjectStore>) -> multiup::Result<()> {
//! let uploader = MultipartUploader::new(store, UploaderConfig::default())?;
//! let data = vec![0u8; 25 * 1024 * 1024];
//! let object = ObjectSpec::new("bucket", "ap-test", "backups/obj.bin", data.len() as u64);
//! let task = UploadTask::new(object, Arc::new(BytesSource::new(data)));
//! let completed = uploader.run_task(task).await?;
//! println!("uploaded as {}", completed.etag);
//! # Ok(())
//! # }
//! ```

mod checksum_reader;
mod client;
mod config;
mod error;
mod manager;
mod part;
mod retry;
mod session;
mod source;

pub use checksum_reader::ChecksumReader;
pub use client::{
    CompletedPart, CompletedUpload, InProgressUpload, InitiatedUpload, ListedPart, ObjectSpec, ObjectStore, PartListing,
    UploadListing, UploadedPart,
};
pub use config::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PARALLEL, MAX_CHUNK_SIZE, MAX_PARTS_COUNT, MIN_CHUNK_SIZE, UploadIdPolicy,
    UploaderConfig,
};
pub use error::{NO_SUCH_UPLOAD, PartError, Result, ServiceError, UploadError};
pub use manager::{MultipartUploader, UploadTask};
pub use session::{MemorySessionStore, SessionKey, SessionStore, UploadSession};
pub use source::{BytesSource, FileSource, RangeReader, RangeSource};

pub use multiup_checksums::ChecksumAlgorithm;
