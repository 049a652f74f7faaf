pub mod booking;
pub mod driver_pool;
pub mod handle;
pub mod region;
