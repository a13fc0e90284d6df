//! Media tools.

pub mod cut;
