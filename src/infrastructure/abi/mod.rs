//! ABI infrastructure - artifact loading, calldata encoding and output decoding

mod artifact;
pub mod decoder;
pub mod encoder;
mod scanner;

pub use artifact::Artifact;
pub use scanner::ArtifactScanner;
