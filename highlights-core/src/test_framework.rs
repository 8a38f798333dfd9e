//! In-memory doubles for the page capability and the debug-capture sink.

pub mod capture;
pub mod fixture;

pub use capture::MemoryCapture;
pub use fixture::{FixtureDocument, FixtureNode, FixturePage};
