pub mod property;
pub mod shared_listing;
