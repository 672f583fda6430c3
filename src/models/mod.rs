pub mod charger_models;
pub mod eagle_models;
pub mod insteon_models;
