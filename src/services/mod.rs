pub mod circulation;
pub mod delivery;
