mod database;
mod provisioning;

pub use database::connect_and_migrate;
pub use provisioning::build_provisioning_service;
