pub mod criteria;
pub mod placement;
