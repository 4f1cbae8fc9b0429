//! Node Classifier API.

pub mod types;
pub mod v1;

pub use types::{ClientError, Group, Hierarchy, ValueNode};
pub use v1::ClassifierClient;
