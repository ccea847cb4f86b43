pub mod analyze;
pub mod config_cmd;
pub mod doctor;
pub mod onboard;
pub mod providers;
pub mod review;
pub mod status;
