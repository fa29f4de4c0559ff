//! ChunkSource - a uniform abstraction over pull-style and push-style
//! streaming writers, so `stream_write` can drive either through one
//! object-safe type (needed since `StorageBackend` is used as `dyn`).

/// Something `stream_write` can consume to obtain successive chunks.
///
/// `Pull` wraps an iterator that yields whole chunks (the caller already
/// has them in memory or generates them lazily). `Push` wraps anything
/// exposing a `read(buf) -> usize` contract (a `std::io::Read`), which the
/// Local Store drives itself, buffering `chunk_size` bytes per call.
pub enum ChunkSource<'a> {
    Pull(Box<dyn Iterator<Item = Vec<u8>> + 'a>),
    Push(Box<dyn std::io::Read + 'a>),
}

impl<'a> ChunkSource<'a> {
    pub fn from_chunks(chunks: impl Iterator<Item = Vec<u8>> + 'a) -> Self {
        ChunkSource::Pull(Box::new(chunks))
    }

    pub fn from_reader(reader: impl std::io::Read + 'a) -> Self {
        ChunkSource::Push(Box::new(reader))
    }

    /// Drain the source into the given sink, reading at most `chunk_size`
    /// bytes per `Push` read, forwarding whole chunks for `Pull`.
    pub fn for_each_chunk<F>(self, chunk_size: usize, mut sink: F) -> std::io::Result<()>
    where
        F: FnMut(&[u8]) -> std::io::Result<()>,
    {
        match self {
            ChunkSource::Pull(iter) => {
                for chunk in iter {
                    sink(&chunk)?;
                }
                Ok(())
            }
            ChunkSource::Push(mut reader) => {
                let mut buf = vec![0u8; chunk_size.max(1)];
                loop {
                    let n = reader.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    sink(&buf[..n])?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pull_source_forwards_each_chunk() {
        let chunks = vec![b"ab".to_vec(), b"cd".to_vec()];
        let source = ChunkSource::from_chunks(chunks.into_iter());
        let mut collected = Vec::new();
        source
            .for_each_chunk(8192, |chunk| {
                collected.extend_from_slice(chunk);
                Ok(())
            })
            .unwrap();
        assert_eq!(collected, b"abcd");
    }

    #[test]
    fn push_source_reads_in_chunk_size_units() {
        let reader = Cursor::new(b"hello world".to_vec());
        let source = ChunkSource::from_reader(reader);
        let mut collected = Vec::new();
        source
            .for_each_chunk(4, |chunk| {
                collected.extend_from_slice(chunk);
                Ok(())
            })
            .unwrap();
        assert_eq!(collected, b"hello world");
    }
}
