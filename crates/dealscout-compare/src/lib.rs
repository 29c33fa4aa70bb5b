//! Location-scoped price comparison across chains.
//!
//! Every chain counts as one "store": its cheapest matching deal represents
//! it, and distance is measured to the nearest of its associated locations.

mod engine;
mod policy;
mod types;

pub use engine::PriceComparisonEngine;
pub use policy::ComparisonPolicy;
pub use types::{PriceComparison, ShoppingListPlan, StorePrice, StoreTotal};
