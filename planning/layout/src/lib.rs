pub mod converter;
pub mod parameter;
pub mod pool_layout;
pub mod position;
pub mod stock_layout;
pub mod transfer_layout;
pub mod transfer_target;
pub mod working;
