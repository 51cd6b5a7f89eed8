pub mod response;

mod macros;

pub use response::{Fingerprint, ResponseCache};
