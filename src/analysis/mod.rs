//! Structure discovery: repeated-block grouping, shape similarity, listing
//! likelihood, and per-field locator learning.

pub mod grouping;
pub mod learner;
pub mod likelihood;
pub mod signature;
