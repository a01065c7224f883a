//! Async Decompression Operations (feature-gated behind `async`)

use crate::Compression;
use async_compression::futures::bufread::{BrotliDecoder, GzipDecoder};
use futures::io::{AsyncRead, BufReader as AsyncBufReader};

// Readers handed out here end up inside response bodies that hop between
// worker threads, hence `Send` on top of `Unpin`.

impl Compression {
    /// Wrap an async reader with the appropriate decompression layer.
    /// Automatically wraps with a buffered reader internally.
    ///
    /// Decoder errors are deferred until the first read attempt.
    pub fn async_wrap_reader<'a, R>(&self, reader: R) -> Box<dyn AsyncRead + Unpin + Send + 'a>
    where
        R: AsyncRead + Unpin + Send + 'a,
    {
        // `async-compression` requires AsyncBufRead; wrap the incoming reader
        // so callers don't need to.
        let reader = AsyncBufReader::new(reader);
        match self {
            Compression::None => Box::new(reader),
            Compression::Brotli => Box::new(BrotliDecoder::new(reader)),
            Compression::Gzip => Box::new(GzipDecoder::new(reader)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use futures::io::{AsyncReadExt, Cursor};
    use rstest::rstest;

    #[tokio::test]
    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Brotli)]
    #[case(Compression::Gzip)]
    async fn test_async_wrap_reader(#[case] format: Compression) {
        let original = b"Hello, world!";
        let compressed = format.compress(original).unwrap();
        let mut reader = format.async_wrap_reader(Cursor::new(compressed));
        let mut decompressed = Vec::new();
        reader.read_to_end(&mut decompressed).await.unwrap();
        assert_eq!(decompressed, original);
    }

    #[tokio::test]
    #[rstest]
    #[case(Compression::Brotli)]
    #[case(Compression::Gzip)]
    async fn test_async_truncated_stream_errors(#[case] format: Compression) {
        let original = b"Some bytes that will not survive being cut in half.".repeat(64);
        let compressed = format.compress(&original).unwrap();
        let truncated = compressed[..compressed.len() / 2].to_vec();
        let mut reader = format.async_wrap_reader(Cursor::new(truncated));
        let mut decompressed = Vec::new();
        assert!(reader.read_to_end(&mut decompressed).await.is_err());
    }
}
