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

use multiup_checksums::ChecksumAlgorithm;
use multiup_checksums::http::HttpChecksum;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

pin_project! {
    /// `AsyncRead` wrapper feeding every byte it passes through a checksum
    /// hasher. The final value is available once the inner reader hits
    /// EOF, so a part body must be drained fully before the checksum is
    /// read.
    pub struct ChecksumReader<R> {
        #[pin]
        inner: R,
        hasher: Option<Box<dyn HttpChecksum>>,
        finished: bool,
    }
}

impl<R> ChecksumReader<R> {
    pub fn new(inner: R, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            inner,
            hasher: Some(algorithm.into_impl()),
            finished: false,
        }
    }

    /// Base64 checksum of everything read so far. `None` until EOF has
    /// been observed; consumes the hasher on first call.
    pub fn take_value(&mut self) -> Option<String> {
        if !self.finished {
            return None;
        }
        self.hasher.take().map(|h| h.base64_value())
    }
}

impl<R: AsyncRead> AsyncRead for ChecksumReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let orig_filled = buf.filled().len();
        let poll = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let filled = &buf.filled()[orig_filled..];
            if !filled.is_empty() {
                if let Some(hasher) = this.hasher.as_mut() {
                    hasher.update(filled);
                }
            } else {
                // EOF
                *this.finished = true;
            }
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn value_matches_one_shot_hash() {
        let data = b"123456789";
        let mut reader = ChecksumReader::new(Cursor::new(&data[..]), ChecksumAlgorithm::Crc64Nvme);

        let mut buf = Vec::new();
        let n = reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, data.len());
        assert_eq!(&buf, data);

        let mut expected = ChecksumAlgorithm::Crc64Nvme.into_impl();
        expected.update(data);
        assert_eq!(reader.take_value(), Some(expected.base64_value()));
    }

    #[tokio::test]
    async fn value_unavailable_before_eof() {
        let data = b"abcdef";
        let mut reader = ChecksumReader::new(Cursor::new(&data[..]), ChecksumAlgorithm::Crc64Nvme);

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(reader.take_value(), None);
    }

    #[tokio::test]
    async fn empty_stream_yields_zero_checksum() {
        let mut reader = ChecksumReader::new(Cursor::new(&b""[..]), ChecksumAlgorithm::Crc64Nvme);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();

        let expected = ChecksumAlgorithm::Crc64Nvme.into_impl().base64_value();
        assert_eq!(reader.take_value(), Some(expected));
    }

    #[tokio::test]
    async fn take_value_consumes_hasher() {
        let mut reader = ChecksumReader::new(Cursor::new(&b"xy"[..]), ChecksumAlgorithm::Crc32);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert!(reader.take_value().is_some());
        assert!(reader.take_value().is_none());
    }
}
