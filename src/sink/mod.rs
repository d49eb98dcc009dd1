pub mod postgres;
pub mod sheets;
