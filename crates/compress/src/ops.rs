//! In-memory encoding and decoding.
//!
//! The server only ever decodes streams (see the `async` feature); these are
//! for building and checking whole pre-compressed variants.

use crate::Compression;
use crate::error::{ErrorKind, Result};
use brotli::enc::BrotliEncoderParams;
use exn::ResultExt;
use flate2::Compression as GzLevel;
use flate2::read::{GzDecoder, GzEncoder};
use std::io::{Cursor, Read};

const BROTLI_BUFFER_SIZE: usize = 4096;

impl Compression {
    /// Encode `input` as a complete stream in this encoding.
    ///
    /// ```
    /// use skycache_compress::Compression;
    ///
    /// let encoded = Compression::Gzip.compress(b"wave.adf").unwrap();
    /// assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Brotli => {
                let params = BrotliEncoderParams {
                    quality: 11,
                    ..BrotliEncoderParams::default()
                };
                brotli::BrotliCompress(&mut Cursor::new(input), &mut output, &params).or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                GzEncoder::new(input, GzLevel::best())
                    .read_to_end(&mut output)
                    .or_raise(|| ErrorKind::Io)?;
            },
        }
        Ok(output)
    }

    /// Decode a complete stream. Truncated or corrupt input is
    /// [`ErrorKind::InvalidData`].
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let read = match self {
            Compression::None => {
                output.extend_from_slice(input);
                Ok(input.len())
            },
            Compression::Brotli => brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE).read_to_end(&mut output),
            Compression::Gzip => GzDecoder::new(input).read_to_end(&mut output),
        };
        read.or_raise(|| ErrorKind::InvalidData)?;
        tracing::trace!(format = %self, input = input.len(), output = output.len(), "decoded in memory");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Brotli)]
    #[case(Compression::Gzip)]
    fn test_compress_decompress(#[case] format: Compression) {
        let original = b"kchat.adf vcpr.adf fever.adf vrock.adf wave.adf emotion.adf espant.adf".repeat(8);
        let compressed = format.compress(&original).unwrap();
        if format != Compression::None {
            assert!(compressed.len() < original.len());
        }
        assert_eq!(format.decompress(&compressed).unwrap(), original);
    }

    #[rstest]
    #[case(Compression::Brotli)]
    #[case(Compression::Gzip)]
    fn test_truncated_data(#[case] format: Compression) {
        let compressed = format.compress(&[7u8; 4096]).unwrap();
        let err = format.decompress(&compressed[..compressed.len() / 2]).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData);
    }
}
