//! # Utility Modules
//!
//! Supporting utilities for cryptography, timing, logging, and metrics.
//!
//! ## Components
//! - **Crypto**: SCRAM-SHA-256 key derivation, proofs, signatures, random values
//! - **Time**: `Clock` abstraction for lazy expiry checks
//! - **Timeout**: Async timeout wrappers
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe handshake and token counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom)
//! - Constant-time comparisons for keys and signatures (subtle)
//! - Memory zeroing for derived secrets (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
pub use time::{Clock, ManualClock, SystemClock};
