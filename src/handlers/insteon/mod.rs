pub mod controller;
pub mod gateway;
