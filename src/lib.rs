//! Corpus preprocessing for neural machine translation.
//!
//! Builds word and feature vocabularies from a parallel corpus, indexes
//! it into a sorted dataset, pads it into Burn tensor batches, and
//! provides the multi-headed attention module those batches feed.

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
