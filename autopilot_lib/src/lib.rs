pub mod coordinate;
pub mod route;
pub mod travel_mode;
