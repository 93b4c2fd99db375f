//! Progress-callback trait for per-slide conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline enhances each slide and renders each document.
//! Callers can forward them to a channel, a log, or a terminal progress bar
//! without the library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use slides2ebook::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide: usize, total_slides: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} done ({} bytes)", slide, total_slides, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::DocumentKind;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each slide.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, `on_slide_start`, `on_slide_complete` and
/// `on_slide_fallback` may be called for several slides at once and in any
/// order. Protect shared mutable state accordingly.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after segmentation, before any slide is enhanced.
    fn on_conversion_start(&self, total_slides: usize, total_chapters: usize) {
        let _ = (total_slides, total_chapters);
    }

    /// Called just before a slide is sent to the enhancer.
    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when a slide's text is final: enhanced, or used as written
    /// because enhancement is off.
    ///
    /// `text_len` is the byte length of the text.
    fn on_slide_complete(&self, slide: usize, total_slides: usize, text_len: usize) {
        let _ = (slide, total_slides, text_len);
    }

    /// Called when enhancement failed and the raw slide text is used instead.
    fn on_slide_fallback(&self, slide: usize, total_slides: usize, error: &str) {
        let _ = (slide, total_slides, error);
    }

    /// Called after each output document has been attempted.
    fn on_document_rendered(&self, kind: DocumentKind, result: Result<usize, &str>) {
        let _ = (kind, result);
    }

    /// Called once after every document has been attempted.
    ///
    /// `enhanced` counts slides whose text came from the enhancer.
    fn on_conversion_complete(&self, total_slides: usize, enhanced: usize) {
        let _ = (total_slides, enhanced);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
