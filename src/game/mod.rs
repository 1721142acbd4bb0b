pub mod controller;
pub mod notation;
pub mod scheduler;
pub mod session;
