//! Testing utilities and mock implementations.
//!
//! Provides a scripted frame-processing engine so conversion sessions can be
//! exercised without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use heics_core::testing::{MockEngine, MockEngineProvider};
//!
//! let provider = MockEngineProvider::new(
//!     MockEngine::new().succeed_on(StreamHypothesis::AlphaPair { color: 2, alpha: 3 }),
//! );
//! let converter = HeicsConverter::new(provider);
//! ```

mod mock_engine;

pub use mock_engine::{EngineCall, MockEngine, MockEngineProvider, DEFAULT_OUTPUT};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// Minimal bytes that look like the start of a HEICS container.
    pub fn heics_bytes() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypmsf1");
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"msf1hevc");
        bytes
    }
}
