//! On-disk persistence of pods, session ledgers and the rhythm index.

pub mod archive;

pub use archive::SessionArchive;
