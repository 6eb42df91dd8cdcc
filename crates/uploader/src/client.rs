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

//! The object-storage collaborator boundary.
//!
//! The uploader never speaks HTTP itself; it drives an [`ObjectStore`]
//! implementation (an SDK adapter in production, a scripted mock in
//! tests). Errors carry the service `code`/`status` the manager branches
//! on.

use crate::error::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::collections::HashMap;

/// Identity and size of the object being uploaded, plus any extra
/// creation parameters forwarded verbatim to upload initiation
/// (content type, ACLs, user metadata).
#[derive(Debug, Clone, Default)]
pub struct ObjectSpec {
    pub bucket: String,
    pub region: String,
    pub key: String,
    pub content_length: u64,
    pub init_params: HashMap<String, String>,
}

impl ObjectSpec {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>, key: impl Into<String>, content_length: u64) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            key: key.into(),
            content_length,
            init_params: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitiatedUpload {
    pub upload_id: String,
}

#[derive(Debug, Clone)]
pub struct InProgressUpload {
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadListing {
    pub uploads: Vec<InProgressUpload>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone)]
pub struct ListedPart {
    pub part_number: u32,
    pub etag: String,
}

/// One page of already-uploaded parts. `next_marker` feeds the next
/// `list_parts` call while `is_truncated` holds.
#[derive(Debug, Clone, Default)]
pub struct PartListing {
    pub parts: Vec<ListedPart>,
    pub next_marker: Option<u32>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub etag: String,
    /// Response headers, expected to include the service-computed
    /// `x-amz-checksum-*` value for the received bytes.
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompletedUpload {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub location: Option<String>,
}

/// Storage operations the upload manager consumes. Implementations wrap a
/// real SDK; every method is a single network call with no retry of its
/// own (the manager owns retry policy).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn initiate_multipart_upload(&self, object: &ObjectSpec) -> Result<InitiatedUpload, ServiceError>;

    async fn list_multipart_uploads(&self, bucket: &str, region: &str, key_prefix: &str)
    -> Result<UploadListing, ServiceError>;

    async fn list_parts(
        &self,
        object: &ObjectSpec,
        upload_id: &str,
        part_number_marker: Option<u32>,
    ) -> Result<PartListing, ServiceError>;

    async fn upload_part(
        &self,
        object: &ObjectSpec,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<UploadedPart, ServiceError>;

    async fn complete_multipart_upload(
        &self,
        object: &ObjectSpec,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<CompletedUpload, ServiceError>;

    async fn abort_multipart_upload(&self, object: &ObjectSpec, upload_id: &str) -> Result<(), ServiceError>;
}
