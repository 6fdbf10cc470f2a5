//! Linear models shared by the marker tests.

pub mod lm;

pub use lm::{GroupFit, GroupModel};
