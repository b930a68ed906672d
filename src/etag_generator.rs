//! ETag generation for the Markdown variant
//!
//! The converted representation needs its own validator, distinct from any
//! upstream HTML ETag: the first 128 bits of a BLAKE3 hash over the final
//! Markdown bytes (front matter included), hex-encoded and double-quoted
//! per RFC 9110. A pure function of the bytes, so identical Markdown yields
//! an identical tag across runs, processes, and hosts, and the conversion
//! determinism guarantees carry over to HTTP caching.

use blake3;

/// ETag generator using BLAKE3
pub struct ETagGenerator;

impl ETagGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate the strong ETag for the given Markdown bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use markdown_filter::etag_generator::ETagGenerator;
    ///
    /// let etag = ETagGenerator::new().generate(b"# Hello World\n");
    /// assert!(etag.starts_with('"') && etag.ends_with('"'));
    /// assert_eq!(etag.len(), 34); // 32 hex chars + 2 quotes
    /// ```
    pub fn generate(&self, markdown: &[u8]) -> String {
        let hash = blake3::hash(markdown);
        let hash_bytes = hash.as_bytes();

        // First 16 bytes (128 bits), quoted hex per HTTP ETag syntax.
        format!("\"{}\"", hex::encode(&hash_bytes[..16]))
    }

    /// Weak form (`W/"..."`). Unused by the filter itself but kept for
    /// hosts that mark semantically-equivalent variants.
    pub fn generate_weak(&self, markdown: &[u8]) -> String {
        format!("W/{}", self.generate(markdown))
    }
}

impl Default for ETagGenerator {
    fn default() -> Self {
        Self::new()
    }
}
