pub mod health;
pub mod invocations;
pub mod session;
