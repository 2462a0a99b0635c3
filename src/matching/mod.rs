pub mod address;
pub mod classifier;
pub mod clustering;
pub mod geo;
pub mod image;
pub mod similarity;
