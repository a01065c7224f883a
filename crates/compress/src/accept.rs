//! `Accept-Encoding` negotiation.

use crate::Compression;

/// The subset of encodings a client is willing to receive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accepted {
    pub brotli: bool,
    pub gzip: bool,
}

impl Accepted {
    /// Identity only.
    pub const NONE: Accepted = Accepted { brotli: false, gzip: false };
    /// Both encodings this crate can produce.
    pub const ALL: Accepted = Accepted { brotli: true, gzip: true };

    /// Parse an `Accept-Encoding` header value.
    ///
    /// Codings are matched by token (so `brotli-ish` does not count as `br`),
    /// parameters other than `q` are ignored, and `q=0` (or an unparseable
    /// weight) explicitly refuses a coding. A `*` entry applies to any coding
    /// not named on its own.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let (mut brotli, mut gzip, mut wildcard) = (None, None, None);
        for item in header.split(',') {
            let mut parts = item.split(';');
            let coding = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let weight = parts
                .filter_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    key.trim().eq_ignore_ascii_case("q").then(|| value.trim().parse::<f32>().unwrap_or(0.0))
                })
                .next()
                .unwrap_or(1.0);
            let accepted = weight > 0.0;
            match coding.as_str() {
                "br" => brotli = Some(accepted),
                "gzip" | "x-gzip" => gzip = Some(accepted),
                "*" => wildcard = Some(accepted),
                _ => {},
            }
        }
        let wildcard = wildcard.unwrap_or(false);
        Self {
            brotli: brotli.unwrap_or(wildcard),
            gzip: gzip.unwrap_or(wildcard),
        }
    }

    /// Parse an optional header; a missing header accepts identity only.
    #[must_use]
    pub fn from_header(header: Option<&str>) -> Self {
        header.map(Self::parse).unwrap_or(Self::NONE)
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, compression: Compression) -> bool {
        match compression {
            Compression::None => true,
            Compression::Brotli => self.brotli,
            Compression::Gzip => self.gzip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Accepted;
    use crate::Compression;
    use rstest::rstest;

    #[rstest]
    #[case("", false, false)]
    #[case("gzip", false, true)]
    #[case("br", true, false)]
    #[case("gzip, deflate, br", true, true)]
    #[case("gzip, deflate, br, zstd", true, true)]
    #[case("br;q=1.0, gzip;q=0.8", true, true)]
    #[case("br;q=0, gzip", false, true)]
    #[case("br;q=0.0", false, false)]
    #[case("BR, GZIP", true, true)]
    #[case("x-gzip", false, true)]
    #[case("*", true, true)]
    #[case("*;q=0", false, false)]
    #[case("*, br;q=0", false, true)]
    #[case("identity", false, false)]
    #[case("brotli-ish", false, false)]
    fn test_parse(#[case] header: &str, #[case] brotli: bool, #[case] gzip: bool) {
        assert_eq!(Accepted::parse(header), Accepted { brotli, gzip });
    }

    #[test]
    fn missing_header_is_identity_only() {
        assert_eq!(Accepted::from_header(None), Accepted::NONE);
    }

    #[rstest]
    #[case(Accepted::NONE, Compression::None, true)]
    #[case(Accepted::NONE, Compression::Brotli, false)]
    #[case(Accepted::ALL, Compression::Gzip, true)]
    #[case(Accepted { brotli: true, gzip: false }, Compression::Gzip, false)]
    fn test_accepts(#[case] accepted: Accepted, #[case] compression: Compression, #[case] expected: bool) {
        assert_eq!(accepted.accepts(compression), expected);
    }
}
