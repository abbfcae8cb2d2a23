//! Character-encoding detection for delimited-text inputs

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::info;

/// Number of leading bytes inspected by the detector
pub const SAMPLE_SIZE: usize = 10_000;

/// Best-guess text encoding of a file together with how well it fits the sample
#[derive(Debug, Clone, Copy)]
pub struct EncodingGuess {
    /// Guessed encoding
    pub encoding: &'static Encoding,
    /// Fit of the guess in `[0, 1]`
    pub confidence: f64,
}

impl EncodingGuess {
    pub fn label(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Detect the encoding of the file at `path` from its first [`SAMPLE_SIZE`] bytes.
///
/// Fails only when the file cannot be opened or read. A low-confidence guess is
/// still returned.
pub fn detect_encoding(path: impl AsRef<Path>) -> crate::Result<EncodingGuess> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let guess = guess_encoding(&sample, sample.len() < SAMPLE_SIZE);
    info!(
        "Detected encoding: {} - Confidence: {:.2}",
        guess.label(),
        guess.confidence
    );
    Ok(guess)
}

/// Run the detector over an in-memory sample.
///
/// `complete` tells the detector whether `sample` holds the whole input.
pub fn guess_encoding(sample: &[u8], complete: bool) -> EncodingGuess {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return EncodingGuess {
            encoding,
            confidence: 1.0,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    let encoding = detector.guess(None, true);

    EncodingGuess {
        encoding,
        confidence: decode_fit(encoding, sample),
    }
}

/// Share of decoded characters that are not replacement characters
fn decode_fit(encoding: &'static Encoding, sample: &[u8]) -> f64 {
    let (text, had_errors) = encoding.decode_without_bom_handling(sample);
    if !had_errors {
        return 1.0;
    }

    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    1.0 - replaced as f64 / total as f64
}
