//! Exact-length reads and 2-byte length framing for DNS over TCP.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Size of the big-endian length prefix in front of every TCP message.
pub const FRAME_PREFIX_LEN: usize = 2;

/// Read exactly `count` bytes from `stream`.
///
/// Partial reads are retried until the count is satisfied. If the stream
/// ends first, [`Error::StreamTerminated`] reports how far it got.
pub async fn read_exact<S>(stream: &mut S, count: usize) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; count];
    let mut received = 0;

    while received < count {
        let n = stream.read(&mut buf[received..]).await?;
        if n == 0 {
            return Err(Error::StreamTerminated {
                expected: count,
                received,
            });
        }
        received += n;
    }

    Ok(buf)
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly on a frame
/// boundary.
pub async fn read_frame<S>(stream: &mut S) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let prefix = match read_exact(stream, FRAME_PREFIX_LEN).await {
        Ok(prefix) => prefix,
        Err(Error::StreamTerminated { received: 0, .. }) => return Ok(None),
        Err(err) => return Err(err),
    };

    let length = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
    read_exact(stream, length).await.map(Some)
}

/// Prepend the 2-byte big-endian length of `payload`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let length = u16::try_from(payload.len()).map_err(|_| Error::FrameTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Write `payload` as one frame.
pub async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    stream.write_all(&frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    /// Feed `bytes` into the returned reader `chunk` bytes at a time.
    fn chunked_reader(bytes: Vec<u8>, chunk: usize) -> tokio::io::DuplexStream {
        let (mut writer, reader) = duplex(64);
        tokio::spawn(async move {
            for piece in bytes.chunks(chunk) {
                writer.write_all(piece).await.unwrap();
                writer.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });
        reader
    }

    #[tokio::test]
    async fn should_read_exact_count_across_partial_reads() {
        let mut reader = chunked_reader((0u8..10).collect(), 3);

        let first = read_exact(&mut reader, 4).await.unwrap();
        let rest = read_exact(&mut reader, 6).await.unwrap();

        assert_eq!(first, vec![0, 1, 2, 3]);
        assert_eq!(rest, vec![4, 5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn should_report_premature_end_of_stream() {
        let mut reader: &[u8] = &[1, 2, 3];

        let result = read_exact(&mut reader, 5).await;

        assert!(matches!(
            result,
            Err(Error::StreamTerminated {
                expected: 5,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn should_read_nothing_for_zero_count() {
        let mut reader: &[u8] = &[];
        assert!(read_exact(&mut reader, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_reassemble_frames_split_byte_by_byte() {
        let mut bytes = encode_frame(b"hello").unwrap();
        bytes.extend(encode_frame(b"dns").unwrap());
        let mut reader = chunked_reader(bytes, 1);

        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(b"dns".to_vec()));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_fail_on_truncated_frame() {
        let mut reader: &[u8] = &[0x00, 0x05, b'a', b'b'];

        let result = read_frame(&mut reader).await;

        assert!(matches!(
            result,
            Err(Error::StreamTerminated {
                expected: 5,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn should_fail_on_half_a_prefix() {
        let mut reader: &[u8] = &[0x00];

        let result = read_frame(&mut reader).await;

        assert!(matches!(
            result,
            Err(Error::StreamTerminated {
                expected: 2,
                received: 1
            })
        ));
    }

    #[test]
    fn should_prefix_big_endian_length() {
        let payload = vec![7u8; 300];

        let frame = encode_frame(&payload).unwrap();

        assert_eq!(&frame[..2], &[0x01, 0x2c]);
        assert_eq!(frame.len(), 302);
    }

    #[test]
    fn should_reject_oversized_payload() {
        let payload = vec![0u8; 65536];
        assert!(matches!(
            encode_frame(&payload),
            Err(Error::FrameTooLarge(65536))
        ));
    }

    #[tokio::test]
    async fn should_write_one_frame() {
        let mut out = Vec::new();

        write_frame(&mut out, b"abc").await.unwrap();

        assert_eq!(out, vec![0x00, 0x03, b'a', b'b', b'c']);
    }
}
