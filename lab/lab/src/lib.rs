pub mod barcode;
pub mod container;
pub mod geometry;
pub mod pool;
pub mod rack;
pub mod rack_layout;
pub mod tag;
pub mod units;
