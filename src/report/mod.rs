/// Report side: which questions to ask, how to ask them, and how the
/// answers are written out.
pub mod prompt;
pub mod templates;
pub mod writer;
