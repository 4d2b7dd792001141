pub mod models;
pub mod validation;
pub mod wizard;
