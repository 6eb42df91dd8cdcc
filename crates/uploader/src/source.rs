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

//! Repeatable byte-range sources for part bodies.
//!
//! A part body stream can only be consumed once, but a failed attempt must
//! be retried with fresh bytes. [`RangeSource::open`] therefore hands out
//! a new reader per call; the retry wrapper re-opens the range on every
//! attempt instead of reusing a drained stream.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::{self, Cursor, SeekFrom};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt};

pub type RangeReader = Box<dyn AsyncRead + Send + Unpin>;

/// Capability to open a fresh read view over `[start, end)` of the source
/// data, any number of times.
#[async_trait]
pub trait RangeSource: Send + Sync {
    async fn open(&self, start: u64, end: u64) -> io::Result<RangeReader>;
}

/// Range source over a file on disk. Each `open` re-opens the file, seeks
/// to `start` and limits the reader to the range length.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RangeSource for FileSource {
    async fn open(&self, start: u64, end: u64) -> io::Result<RangeReader> {
        if end < start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid range: start {start} past end {end}"),
            ));
        }
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        Ok(Box::new(tokio::io::AsyncReadExt::take(file, end - start)))
    }
}

/// In-memory range source, mainly for tests and small payloads.
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl RangeSource for BytesSource {
    async fn open(&self, start: u64, end: u64) -> io::Result<RangeReader> {
        let len = self.data.len() as u64;
        if start > len || end > len || end < start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range [{start}, {end}) outside source of {len} bytes"),
            ));
        }
        let slice = self.data.slice(start as usize..end as usize);
        Ok(Box::new(Cursor::new(slice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn bytes_source_reads_exact_range() {
        let source = BytesSource::new(&b"0123456789"[..]);
        let mut reader = source.open(2, 6).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf, b"2345");
    }

    #[tokio::test]
    async fn bytes_source_rejects_out_of_bounds() {
        let source = BytesSource::new(&b"abc"[..]);
        assert!(source.open(0, 4).await.is_err());
        assert!(source.open(2, 1).await.is_err());
    }

    #[tokio::test]
    async fn bytes_source_open_is_repeatable() {
        let source = BytesSource::new(&b"hello world"[..]);
        for _ in 0..3 {
            let mut reader = source.open(6, 11).await.unwrap();
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await.unwrap();
            assert_eq!(&buf, b"world");
        }
    }

    #[tokio::test]
    async fn file_source_reads_ranges() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefghij").unwrap();
        tmp.flush().unwrap();

        let source = FileSource::new(tmp.path());
        let mut reader = source.open(3, 7).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf, b"defg");

        // a range reaching past EOF yields the available bytes only
        let mut reader = source.open(8, 10).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ij");
    }
}
