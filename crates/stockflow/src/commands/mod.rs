pub mod deploy;
pub mod teardown;
