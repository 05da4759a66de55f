pub mod actions;
pub mod collision;
pub mod conditions;
pub mod containers;
pub mod engine;
pub mod map;
pub mod moves;
pub mod notify;
pub mod position;
pub mod scheduler;
pub mod state;
pub mod tile;
