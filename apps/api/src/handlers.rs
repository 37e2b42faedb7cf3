pub mod health;
pub mod provisioning;
