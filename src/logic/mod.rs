pub mod accessor;
pub mod features;
pub mod numeric;
pub mod propagate;
pub mod validate;
pub mod values;

pub use accessor::ValueAccessor;
pub use features::FeatureOps;
pub use numeric::{float_compare, float_round, format_number, parse_number};
pub use propagate::Propagator;
pub use validate::{BoundsWarning, FeatureValidator};
pub use values::ValueOps;
