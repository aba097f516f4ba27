//! Built-in recognition engines.
//!
//! The engine contract ([`crate::RecognitionEngine`]) is deliberately
//! small: train, evaluate, parse. Anything conforming is swappable; the
//! engines here are the always-available baselines.
//!
//! | Engine | Needs training? | Intent prediction | Notes |
//! |--------|-----------------|-------------------|-------|
//! | [`KeywordEngine`] | Yes (memorizes values) | No | Zero deps, deterministic |
//! | [`crate::MockEngine`] | No | Configurable | Test double |

pub mod keyword;

pub use keyword::KeywordEngine;
