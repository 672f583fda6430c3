pub mod eagle;
pub mod insteon;
pub mod mail;
