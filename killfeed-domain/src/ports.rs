// Repository and Service Port Traits (Interfaces)
// Define what the domain needs from infrastructure

pub mod remote;
pub mod repositories;
pub mod services;

pub use remote::*;
pub use repositories::*;
pub use services::*;
