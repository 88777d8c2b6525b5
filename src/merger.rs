//! Reassembly of split assets
//!
//! A split object is stored as two part files. The primary part (`.ppart`)
//! holds 1023 of every 1024 bytes, the secondary part (`.spart`) holds the
//! remaining one. The secondary stream drives the merge: for each of its bytes
//! one primary chunk of up to 1023 bytes is written, followed by that byte.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Bytes taken from the primary stream per secondary byte
pub const PRIMARY_CHUNK_LEN: usize = 1023;

/// Merges `.ppart`/`.spart` streams back into the original byte stream
#[derive(Clone, Copy, Debug, Default)]
pub struct PartMerger;

impl PartMerger {
    /// Merge `primary` and `secondary` into `output`, returning the bytes written
    ///
    /// # Errors
    ///
    /// Returns [`Error::MergeIntegrity`] if the secondary stream still has a
    /// byte when the primary stream is exhausted. I/O failures are returned
    /// as [`Error::Io`].
    pub async fn merge<P, S, W>(
        &self,
        primary: &mut P,
        secondary: &mut S,
        output: &mut W,
    ) -> Result<u64>
    where
        P: AsyncRead + Unpin + ?Sized,
        S: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut chunk = [0u8; PRIMARY_CHUNK_LEN];
        let mut secondary_byte = [0u8; 1];
        let mut chunks: u64 = 0;
        let mut primary_read: u64 = 0;
        let mut written: u64 = 0;

        while secondary.read(&mut secondary_byte).await? > 0 {
            let filled = fill(primary, &mut chunk).await?;
            if filled == 0 {
                return Err(Error::MergeIntegrity {
                    chunk: chunks,
                    primary_bytes_read: primary_read,
                });
            }
            primary_read += filled as u64;

            output.write_all(&chunk[..filled]).await?;
            output.write_all(&secondary_byte).await?;
            written += filled as u64 + 1;
            chunks += 1;
        }

        let mut probe = [0u8; 1];
        if primary.read(&mut probe).await? > 0 {
            tracing::warn!(
                chunks,
                primary_bytes_read = primary_read,
                "primary part has bytes left after the secondary part ended"
            );
        }

        output.flush().await?;
        Ok(written)
    }
}

/// Read until `buf` is full or the stream ends
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of the merge: deal every 1024th byte into the secondary part
    fn split(original: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for block in original.chunks(PRIMARY_CHUNK_LEN + 1) {
            let (head, tail) = block.split_at(block.len() - 1);
            primary.extend_from_slice(head);
            secondary.extend_from_slice(tail);
        }
        (primary, secondary)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    async fn merge_bytes(primary: &[u8], secondary: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        PartMerger
            .merge(&mut &primary[..], &mut &secondary[..], &mut output)
            .await?;
        Ok(output)
    }

    #[tokio::test]
    async fn test_merge_restores_split_file() {
        // whole blocks, a partial last block, and the two-byte minimum
        for len in [2048, 5000, 1024 * 3 + 17, 2] {
            let original = sample(len);
            let (primary, secondary) = split(&original);
            let merged = merge_bytes(&primary, &secondary).await.unwrap();
            assert_eq!(merged, original, "length {}", len);
        }
    }

    #[tokio::test]
    async fn test_merge_is_repeatable() {
        let (primary, secondary) = split(&sample(4100));
        let first = merge_bytes(&primary, &secondary).await.unwrap();
        let second = merge_bytes(&primary, &secondary).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_short_primary_chunk_at_end() {
        let primary = vec![1u8; 1023 + 10];
        let secondary = vec![9u8, 8u8];
        let merged = merge_bytes(&primary, &secondary).await.unwrap();

        assert_eq!(merged.len(), 1023 + 1 + 10 + 1);
        assert_eq!(merged[1023], 9);
        assert_eq!(merged[merged.len() - 1], 8);
    }

    #[tokio::test]
    async fn test_exhausted_primary_is_integrity_error() {
        let primary = vec![1u8; 1023];
        let secondary = vec![0u8; 2];

        match merge_bytes(&primary, &secondary).await {
            Err(Error::MergeIntegrity {
                chunk,
                primary_bytes_read,
            }) => {
                assert_eq!(chunk, 1);
                assert_eq!(primary_bytes_read, 1023);
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_secondary_writes_nothing() {
        let merged = merge_bytes(&[1, 2, 3], &[]).await.unwrap();
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn test_primary_short_reads_are_filled() {
        // a reader that yields one byte per read still produces full chunks
        let original = sample(3000);
        let (primary, secondary) = split(&original);

        let (mut client, mut server) = tokio::io::duplex(1);
        let writer = tokio::spawn(async move {
            server.write_all(&primary).await.unwrap();
        });

        let mut output = Vec::new();
        let written = PartMerger
            .merge(&mut client, &mut &secondary[..], &mut output)
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(written as usize, original.len());
        assert_eq!(output, original);
    }
}
