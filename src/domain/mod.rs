pub mod calibration;
pub mod decoder;
pub mod models;
pub mod profiles;
pub mod settings;
