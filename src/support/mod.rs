//! Support code shared by the API client and the application shell.

pub mod io;
pub mod logging;
pub mod retry;
pub mod transform;

pub use io::FileOption;
pub use retry::{Fault, FaultKind, RetryAction, RetryError, RetryPolicy};
pub use transform::{ClassMatcher, HostnameMap, TransformError, Transformer};
