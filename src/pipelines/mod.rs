//! Render pipelines and the passes built on them.
//!
//! [`basic`] holds the base pass pipelines and the shared pipeline helpers,
//! [`bloom`] and [`output`] the post-processing passes that read the HDR
//! scene buffer.

pub mod basic;
pub mod bloom;
pub mod light;
pub mod output;
