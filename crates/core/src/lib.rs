//! Domain core for the research pipeline.
//!
//! Pure types and logic with no I/O: the job/step state machine, status
//! snapshot derivation, collaborator contracts, and the default analyzer.
//! Every other crate in the workspace builds on these definitions.

pub mod analysis;
pub mod collaborators;
pub mod error;
pub mod progress;
pub mod research;
pub mod types;
