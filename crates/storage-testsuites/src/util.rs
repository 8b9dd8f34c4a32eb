//! Generators and stream helpers shared by the conformance and benchmark suites.

use blake2::{Blake2b512, Digest};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::{io, pin::Pin, task};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use storage_driver::ContentReader;

pub use storage_driver::path::{first_part, join};

const FILENAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SEPARATOR_CHARS: &[u8] = b"._-";

/// Source of random paths and content.
///
/// Each scenario owns its own generator, parallel workers get one through [`Generator::fork`].
#[derive(Debug)]
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    pub fn new(seed: u64) -> Generator {
        Generator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a generator from the given seed, or a random one. Returns the seed used so that
    /// failures can be reproduced.
    pub fn seeded(seed: Option<u64>) -> (Generator, u64) {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
        (Generator::new(seed), seed)
    }

    /// Splits off an independent generator.
    pub fn fork(&mut self) -> Generator {
        Generator::new(self.rng.gen())
    }

    pub fn contents(&mut self, len: usize) -> Vec<u8> {
        let mut contents = vec![0; len];
        self.rng.fill_bytes(&mut contents);
        contents
    }

    /// Random number in `0..upper`.
    pub fn below(&mut self, upper: u64) -> u64 {
        self.rng.gen_range(0..upper)
    }

    /// Random file name of exactly `len` characters. Separators (`.`, `_` and `-`) never start
    /// or end a name and never follow each other.
    pub fn filename(&mut self, len: usize) -> String {
        let mut name = String::with_capacity(len);
        let mut was_separator = true;

        for i in 0..len {
            let c = if !was_separator && i + 1 < len && self.rng.gen_range(0..4) == 0 {
                was_separator = true;
                SEPARATOR_CHARS[self.rng.gen_range(0..SEPARATOR_CHARS.len())]
            } else {
                was_separator = false;
                FILENAME_CHARS[self.rng.gen_range(0..FILENAME_CHARS.len())]
            };

            name.push(c as char);
        }

        name
    }

    /// Random valid path of exactly `len` characters, with a random number of segments.
    ///
    /// `len` must be at least 2.
    pub fn path(&mut self, len: usize) -> String {
        let mut path = String::from("/");

        while path.len() < len {
            let chunk_len = self.rng.gen_range(0..len - path.len()) + 1;
            path.push_str(&self.filename(chunk_len));

            let remaining = len.saturating_sub(path.len());
            if remaining == 1 {
                path.push_str(&self.filename(1));
            } else if remaining > 1 {
                path.push('/');
            }
        }

        path
    }
}

/// Reader producing exactly `len` pseudo random bytes.
///
/// Used to stream payloads much larger than what should be held in memory.
#[derive(Debug)]
pub struct RandReader {
    remaining: u64,
    rng: StdRng,
}

impl RandReader {
    pub fn new(generator: &mut Generator, len: u64) -> RandReader {
        RandReader {
            remaining: len,
            rng: StdRng::seed_from_u64(generator.rng.gen()),
        }
    }
}

impl AsyncRead for RandReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let this = self.get_mut();

        let len = (buf.remaining() as u64).min(this.remaining) as usize;
        if len > 0 {
            this.rng.fill_bytes(buf.initialize_unfilled_to(len));
            buf.advance(len);
            this.remaining -= len as u64;
        }

        task::Poll::Ready(Ok(()))
    }
}

/// Reader adaptor hashing everything read through it.
#[pin_project::pin_project]
pub struct HashingReader<R> {
    #[pin]
    inner: R,
    hasher: Blake2b512,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> HashingReader<R> {
        HashingReader {
            inner,
            hasher: Blake2b512::new(),
        }
    }

    /// Checksum of everything read so far.
    pub fn checksum(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let this = self.project();
        let filled = buf.filled().len();

        let poll = this.inner.poll_read(cx, buf);
        if let task::Poll::Ready(Ok(())) = poll {
            this.hasher.update(&buf.filled()[filled..]);
        }

        poll
    }
}

/// Reads a content stream to the end.
pub async fn read_all(mut reader: ContentReader) -> io::Result<Vec<u8>> {
    let mut contents = Vec::new();
    reader.read_to_end(&mut contents).await?;
    Ok(contents)
}

/// Compares two byte strings without dumping them into the error message.
pub fn ensure_bytes_eq(actual: &[u8], expected: &[u8], what: &str) -> anyhow::Result<()> {
    if actual == expected {
        return Ok(());
    }

    let mismatch = actual
        .iter()
        .zip(expected)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| actual.len().min(expected.len()));

    anyhow::bail!(
        "{}: got {} bytes, expected {} bytes, first difference at byte {}",
        what,
        actual.len(),
        expected.len(),
        mismatch
    )
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use storage_driver::path;

    #[test]
    fn generated_paths_are_valid() {
        let mut generator = Generator::new(1);

        for len in [2, 3, 8, 32, 64] {
            for _ in 0..200 {
                let path = generator.path(len);
                assert_eq!(path.len(), len, "{:?}", path);
                assert!(path::is_valid(&path), "{:?}", path);
            }
        }
    }

    #[test]
    fn generated_filenames() {
        let mut generator = Generator::new(2);

        for _ in 0..200 {
            let name = generator.filename(16);
            let bytes = name.as_bytes();

            assert_eq!(bytes.len(), 16);
            assert!(FILENAME_CHARS.contains(&bytes[0]));
            assert!(FILENAME_CHARS.contains(&bytes[15]));
            assert!(!bytes
                .windows(2)
                .any(|w| SEPARATOR_CHARS.contains(&w[0]) && SEPARATOR_CHARS.contains(&w[1])));
        }
    }

    #[test]
    fn seeded_generators_repeat() {
        let (mut a, seed) = Generator::seeded(None);
        let (mut b, _) = Generator::seeded(Some(seed));

        assert_eq!(a.contents(64), b.contents(64));
        assert_eq!(a.path(32), b.path(32));
        assert_ne!(a.contents(32), a.contents(32));
    }

    #[tokio::test]
    async fn rand_reader_is_bounded() {
        let mut generator = Generator::new(3);
        let mut reader = RandReader::new(&mut generator, 3 * 8192 + 5);

        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();

        assert_eq!(contents.len(), 3 * 8192 + 5);
        assert_eq!(reader.read(&mut [0u8; 16]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hashing_reader_matches_digest() {
        let mut generator = Generator::new(4);
        let contents = generator.contents(100_000);

        let mut reader = HashingReader::new(&contents[..]);
        let mut read = Vec::new();
        reader.read_to_end(&mut read).await.unwrap();

        assert_eq!(read, contents);
        assert_eq!(reader.checksum(), Blake2b512::digest(&contents).to_vec());
    }

    #[test]
    fn bytes_comparison() {
        assert!(ensure_bytes_eq(b"abc", b"abc", "same").is_ok());

        let err = ensure_bytes_eq(b"abd", b"abc", "contents").unwrap_err();
        assert_eq!(
            err.to_string(),
            "contents: got 3 bytes, expected 3 bytes, first difference at byte 2"
        );

        let err = ensure_bytes_eq(b"ab", b"abc", "contents").unwrap_err();
        assert!(err.to_string().ends_with("first difference at byte 2"));
    }
}
