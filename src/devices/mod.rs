pub mod profiles;
pub mod tstat7;

pub use profiles::{ProfileRegistry, RegisterEntry, RegisterProfile};
pub use tstat7::ThermostatModel;
