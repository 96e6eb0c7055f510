use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::{ready, Stream};
use pin_project_lite::pin_project;
use tracing::trace;

use crate::checksum::algorithm::{DigestAlgorithm, Hasher};
use crate::error::ArtifactError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ArtifactError>> + Send + 'static>>;

pin_project! {
    /// This struct wraps a byte stream, passing the data through unmaterialized while computing
    ///  one digest per algorithm over all of it.
    ///
    /// If expected digests are registered, they are checked when the wrapped stream is drained.
    ///  A mismatch is reported by appending an error item to the stream - once an error was
    ///  returned, this stream stops polling from upstream and always returns an error.
    pub struct DigestingStream<S> {
        #[pin]
        inner: S,
        label: String,
        hashers: Vec<(DigestAlgorithm, Hasher)>,
        expected: BTreeMap<DigestAlgorithm, String>,
        digests: BTreeMap<DigestAlgorithm, String>,
        length: u64,
        is_failed: bool,
        is_done: bool,
    }
}

impl<S> DigestingStream<S>
where S: Stream<Item = Result<Bytes, ArtifactError>>
{
    /// `label` identifies the data in error messages, typically its repository path
    pub fn new(inner: S, label: impl Into<String>, algorithms: impl IntoIterator<Item = DigestAlgorithm>) -> DigestingStream<S> {
        let mut hashers: Vec<(DigestAlgorithm, Hasher)> = Vec::new();
        for algorithm in algorithms {
            if !hashers.iter().any(|(a, _)| *a == algorithm) {
                hashers.push((algorithm, algorithm.hasher()));
            }
        }

        DigestingStream {
            inner,
            label: label.into(),
            hashers,
            expected: BTreeMap::new(),
            digests: BTreeMap::new(),
            length: 0,
            is_failed: false,
            is_done: false,
        }
    }

    /// Registers an expected digest. The algorithm is computed even if it was not requested
    ///  in the constructor.
    pub fn expect(mut self, algorithm: DigestAlgorithm, hex_digest: impl Into<String>) -> DigestingStream<S> {
        if !self.hashers.iter().any(|(a, _)| *a == algorithm) {
            self.hashers.push((algorithm, algorithm.hasher()));
        }
        self.expected.insert(algorithm, hex_digest.into().to_ascii_lowercase());
        self
    }

    /// Digests of the complete data. Empty until the wrapped stream was fully drained.
    pub fn digests(&self) -> &BTreeMap<DigestAlgorithm, String> {
        &self.digests
    }

    /// number of bytes passed through so far
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_complete(&self) -> bool {
        self.is_done && !self.is_failed
    }
}

impl<S> Stream for DigestingStream<S>
where S: Stream<Item = Result<Bytes, ArtifactError>>
{
    type Item = Result<Bytes, ArtifactError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_failed {
            return Poll::Ready(Some(Err(ArtifactError::Transport(format!("polling from failed stream for {}", self.label)))));
        }
        if self.is_done {
            return Poll::Ready(None);
        }

        let this = self.project();
        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(data)) => {
                for (_, hasher) in this.hashers.iter_mut() {
                    hasher.update(&data);
                }
                *this.length += data.len() as u64;
                Poll::Ready(Some(Ok(data)))
            }
            None => {
                // wrapped stream is fully drained -> finalize digests and validate
                for (algorithm, hasher) in this.hashers.iter() {
                    this.digests.insert(*algorithm, hasher.clone().finalize_hex());
                }
                *this.is_done = true;

                for (algorithm, expected) in this.expected.iter() {
                    trace!("validating {} digest of {}", algorithm, this.label);
                    let actual = &this.digests[algorithm];
                    if actual != expected {
                        *this.is_failed = true;
                        return Poll::Ready(Some(Err(ArtifactError::ChecksumMismatch {
                            path: this.label.clone(),
                            algorithm: *algorithm,
                            expected: expected.clone(),
                            actual: actual.clone(),
                        })));
                    }
                }
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                *this.is_failed = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod test {
    use futures::StreamExt;

    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, ArtifactError>> {
        futures::stream::iter(parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_passes_data_and_computes_digests() {
        let mut stream = Box::pin(DigestingStream::new(chunks(&["A", "BC"]), "x", [DigestAlgorithm::Sha1, DigestAlgorithm::Md5]));

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, b"ABC");
        assert_eq!(stream.length(), 3);
        assert!(stream.is_complete());
        assert_eq!(stream.digests()[&DigestAlgorithm::Sha1], "3c01bdbb26f358bab27f267924aa2c9a03fcfdb8");
        assert_eq!(stream.digests()[&DigestAlgorithm::Md5], DigestAlgorithm::Md5.digest_hex(b"ABC"));
    }

    #[tokio::test]
    async fn test_matching_expectation() {
        let stream = DigestingStream::new(chunks(&["ABC"]), "x", [])
            .expect(DigestAlgorithm::Sha1, "3C01BDBB26F358BAB27F267924AA2C9A03FCFDB8");
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_appends_error_and_stays_failed() {
        let mut stream = Box::pin(DigestingStream::new(chunks(&["ABC"]), "lib.jar", [DigestAlgorithm::Md5])
            .expect(DigestAlgorithm::Sha1, "0000000000000000000000000000000000000000"));

        assert!(stream.next().await.unwrap().is_ok());
        match stream.next().await {
            Some(Err(ArtifactError::ChecksumMismatch { algorithm, path, .. })) => {
                assert_eq!(algorithm, DigestAlgorithm::Sha1);
                assert_eq!(path, "lib.jar");
            }
            _ => panic!("expected a checksum mismatch"),
        }
        assert!(stream.next().await.unwrap().is_err());
        assert!(!stream.is_complete());
    }

    #[tokio::test]
    async fn test_upstream_error_is_passed_on() {
        let inner = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"A")),
            Err(ArtifactError::Transport("connection reset".to_string())),
        ]);
        let mut stream = Box::pin(DigestingStream::new(inner, "x", [DigestAlgorithm::Sha1]));
        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(stream.next().await, Some(Err(ArtifactError::Transport(_)))));
        assert!(stream.digests().is_empty());
    }
}
