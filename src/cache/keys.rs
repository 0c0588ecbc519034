//! Deterministic cache key derivation.
//!
//! Keys must be stable across process restarts, collision-resistant (a
//! collision silently serves wrong data; there is no detection fallback),
//! and insensitive to Unicode encoding differences in text arguments.
//!
//! Arguments are framed as `tag || length || payload` before digesting, so
//! adjacent values can never be confused for one another, and named
//! arguments are fed in name order regardless of insertion order.

use std::fmt;

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// A derived cache key: `function-identity#sha256-hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a [`CacheKey`] from a fully-qualified function identity, ordered
/// positional arguments, and name-sorted named arguments.
#[derive(Debug)]
pub struct KeyBuilder {
    function: String,
    positional: Vec<u8>,
    named: Vec<(String, Vec<u8>)>,
}

impl KeyBuilder {
    pub fn new(function: &str) -> Self {
        Self {
            function: nfc(function),
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Positional text argument, NFC-normalized before encoding.
    pub fn text(mut self, value: &str) -> Self {
        frame(&mut self.positional, b't', nfc(value).as_bytes());
        self
    }

    /// Positional integer argument.
    pub fn int(mut self, value: i64) -> Self {
        frame(&mut self.positional, b'i', &value.to_be_bytes());
        self
    }

    /// Named text argument; named arguments are order-insensitive.
    pub fn named_text(mut self, name: &str, value: &str) -> Self {
        let mut encoded = Vec::new();
        frame(&mut encoded, b't', nfc(value).as_bytes());
        self.named.push((nfc(name), encoded));
        self
    }

    /// Named integer argument; named arguments are order-insensitive.
    pub fn named_int(mut self, name: &str, value: i64) -> Self {
        let mut encoded = Vec::new();
        frame(&mut encoded, b'i', &value.to_be_bytes());
        self.named.push((nfc(name), encoded));
        self
    }

    pub fn finish(mut self) -> CacheKey {
        let mut hasher = Sha256::new();

        let mut header = Vec::new();
        frame(&mut header, b'f', self.function.as_bytes());
        hasher.update(&header);
        hasher.update(&self.positional);

        self.named.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, encoded) in &self.named {
            let mut named_frame = Vec::new();
            frame(&mut named_frame, b'n', name.as_bytes());
            hasher.update(&named_frame);
            hasher.update(encoded);
        }

        CacheKey(format!(
            "{}#{}",
            self.function,
            hex::encode(hasher.finalize())
        ))
    }
}

fn frame(buffer: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    buffer.push(tag);
    buffer.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    buffer.extend_from_slice(payload);
}

fn nfc(value: &str) -> String {
    value.nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION: &str = "mercato::aggregate::compute_trend";

    #[test]
    fn identical_arguments_produce_identical_keys() {
        let a = KeyBuilder::new(FUNCTION).text("milk").int(30).finish();
        let b = KeyBuilder::new(FUNCTION).text("milk").int(30).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn unicode_normalization_forms_collapse() {
        // "Ñoño" precomposed vs decomposed combining marks.
        let precomposed = "\u{00D1}o\u{00F1}o";
        let decomposed = "N\u{0303}on\u{0303}o";
        assert_ne!(precomposed.as_bytes(), decomposed.as_bytes());

        let a = KeyBuilder::new(FUNCTION).text(precomposed).finish();
        let b = KeyBuilder::new(FUNCTION).text(decomposed).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn positional_order_matters() {
        let a = KeyBuilder::new(FUNCTION).text("milk").text("riga").finish();
        let b = KeyBuilder::new(FUNCTION).text("riga").text("milk").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn named_insertion_order_does_not_matter() {
        let a = KeyBuilder::new(FUNCTION)
            .named_int("window_days", 30)
            .named_text("currency", "EUR")
            .finish();
        let b = KeyBuilder::new(FUNCTION)
            .named_text("currency", "EUR")
            .named_int("window_days", 30)
            .finish();
        assert_eq!(a, b);
    }

    #[test]
    fn function_identity_prevents_cross_function_collisions() {
        let a = KeyBuilder::new("mercato::aggregate::compute_trend")
            .text("milk")
            .finish();
        let b = KeyBuilder::new("mercato::aggregate::summarize")
            .text("milk")
            .finish();
        assert_ne!(a, b);
    }

    #[test]
    fn value_types_are_not_confusable() {
        let a = KeyBuilder::new(FUNCTION).int(49).finish();
        let b = KeyBuilder::new(FUNCTION).text("49").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn adjacent_text_frames_do_not_merge() {
        let a = KeyBuilder::new(FUNCTION).text("ab").text("c").finish();
        let b = KeyBuilder::new(FUNCTION).text("a").text("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn key_text_carries_the_function_identity() {
        let key = KeyBuilder::new(FUNCTION).text("milk").finish();
        assert!(key.as_str().starts_with(FUNCTION));
        assert_eq!(key.as_str().len(), FUNCTION.len() + 1 + 64);
    }
}
