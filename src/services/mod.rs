pub mod attachment;
pub mod edit_session;
pub mod field_controller;
pub mod hierarchy;
pub mod reference_data;
