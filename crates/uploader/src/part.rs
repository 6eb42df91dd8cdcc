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

//! Upload of a single part, with end-to-end integrity verification.

use crate::checksum_reader::ChecksumReader;
use crate::client::{ObjectSpec, ObjectStore, UploadedPart};
use crate::error::{Result, UploadError};
use crate::retry::retry;
use crate::session::UploadSession;
use crate::source::RangeSource;
use bytes::Bytes;
use multiup_checksums::ChecksumAlgorithm;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub(crate) struct PartUploadContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub source: &'a dyn RangeSource,
    pub object: &'a ObjectSpec,
    pub upload_id: &'a str,
    pub chunk_size: u64,
    pub algorithm: ChecksumAlgorithm,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

/// Byte range `[start, end)` covered by `part_number` (1-based). The last
/// part is truncated to the remainder of the object.
pub(crate) fn part_range(content_length: u64, chunk_size: u64, part_number: u32) -> (u64, u64) {
    let start = (u64::from(part_number) - 1) * chunk_size;
    let end = start.saturating_add(chunk_size).min(content_length);
    (start, end)
}

/// Upload one part and record its ETag in the session.
///
/// Skips parts the session already holds a verified checksum for — the
/// resumability short-circuit, no network call is made. On a checksum
/// mismatch the part's entry is cleared (empty ETag) so the caller's next
/// `run_task` re-uploads it, and the mismatch is surfaced with both values
/// and the service's response headers.
pub(crate) async fn upload_one_part(
    ctx: &PartUploadContext<'_>,
    session: &Mutex<UploadSession>,
    part_number: u32,
) -> Result<()> {
    if session.lock().await.has_verified_part(part_number) {
        debug!(part_number, "part already uploaded, skipping");
        return Ok(());
    }

    let (start, end) = part_range(ctx.object.content_length, ctx.chunk_size, part_number);

    // Each attempt opens a fresh range view; a drained stream is never
    // resubmitted.
    let (uploaded, computed) = retry(ctx.max_attempts, ctx.retry_delay, "upload_part", || {
        read_and_upload(ctx, part_number, start, end)
    })
    .await?;

    let reported = uploaded
        .headers
        .get(ctx.algorithm.header_name())
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if reported != computed {
        session.lock().await.clear_part(part_number);
        warn!(part_number, computed, reported, "part checksum mismatch");
        return Err(UploadError::ChecksumMismatch {
            part_number,
            computed,
            reported,
            headers: uploaded.headers,
        });
    }

    let etag = uploaded.etag.trim_matches('"').to_string();
    session.lock().await.record_part(part_number, etag);
    debug!(part_number, len = end - start, "part uploaded and verified");
    Ok(())
}

async fn read_and_upload(
    ctx: &PartUploadContext<'_>,
    part_number: u32,
    start: u64,
    end: u64,
) -> Result<(UploadedPart, String)> {
    let reader = ctx.source.open(start, end).await?;
    let mut reader = ChecksumReader::new(reader, ctx.algorithm);

    let expected_len = (end - start) as usize;
    let mut body = Vec::with_capacity(expected_len);
    reader.read_to_end(&mut body).await?;
    if body.len() != expected_len {
        return Err(UploadError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("range [{start}, {end}) produced {} bytes, expected {expected_len}", body.len()),
        )));
    }

    let computed = reader
        .take_value()
        .ok_or_else(|| UploadError::InvalidState("checksum unavailable before stream end".to_string()))?;

    let uploaded = ctx
        .store
        .upload_part(ctx.object, ctx.upload_id, part_number, Bytes::from(body))
        .await?;
    Ok((uploaded, computed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_tile_the_object_exactly() {
        let content_length: u64 = 10 * 1024 * 1024 + 123;
        let chunk_size = 1024 * 1024;
        let parts = content_length.div_ceil(chunk_size) as u32;

        let mut covered = 0;
        for part_number in 1..=parts {
            let (start, end) = part_range(content_length, chunk_size, part_number);
            assert_eq!(start, covered, "no gap or overlap before part {part_number}");
            assert!(end > start);
            covered = end;
        }
        assert_eq!(covered, content_length);
    }

    #[test]
    fn last_part_is_truncated() {
        let (start, end) = part_range(2_500_000, 1_000_000, 3);
        assert_eq!((start, end), (2_000_000, 2_500_000));
    }

    #[test]
    fn exact_multiple_has_full_last_part() {
        let (start, end) = part_range(3_000_000, 1_000_000, 3);
        assert_eq!((start, end), (2_000_000, 3_000_000));
    }
}
