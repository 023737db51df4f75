pub mod handler;
pub mod model;

pub use handler::{process_background_location, process_location_update};
