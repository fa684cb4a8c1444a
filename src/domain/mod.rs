//! Domain layer for the moderation assistant
//!
//! CDD Principle: Domain Model - Pure business logic for rule-violation moderation
//! - Contains severities, examples, matches and user corrections
//! - Independent of the embedding model, fuzzy scorer and file formats
//! - Expresses the ubiquitous language of examples, clearances and feedback

pub mod feedback;
pub mod violations;

// Re-export main domain types for convenience
pub use feedback::*;
pub use violations::*;
