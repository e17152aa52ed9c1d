pub mod app_state;
pub mod credentials;
pub mod errors;
pub mod shutdown;
pub mod startup;
