//! Pipeline stages for slide-deck-to-eBook conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and replaced without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ segment ──▶ assemble ──▶ render::{pdf, docx}
//! (path/URL)  (PPTX)    (chapters)  (llm + postprocess + markdown)
//! ```
//!
//! 1. [`input`]: read the local file or download the URL; size and ZIP checks
//! 2. [`extract`]: slide titles, bodies and pictures from the PPTX parts;
//!    runs in `spawn_blocking`
//! 3. [`segment`]: group slides into chapters by one of three policies
//! 4. [`llm`]: the [`llm::Enhancer`] seam and its LLM-backed
//!    implementation with retry/backoff; the only stage with network I/O
//!    besides URL input
//! 5. [`postprocess`]: deterministic cleanup of LLM responses
//! 6. [`markdown`]: light markdown → heading/paragraph blocks
//! 7. [`assemble`]: drive enhancement with bounded concurrency and lay the
//!    chapters out as a flat block sequence

pub mod assemble;
pub mod extract;
pub mod input;
pub mod llm;
pub mod markdown;
pub mod postprocess;
pub mod segment;
