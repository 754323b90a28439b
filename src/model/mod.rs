pub mod assignment;
pub mod common;
pub mod error;
pub mod feature;
pub mod policy;
pub mod subject;
pub mod value;

pub use assignment::*;
pub use common::*;
pub use error::*;
pub use feature::*;
pub use policy::*;
pub use subject::*;
pub use value::*;
