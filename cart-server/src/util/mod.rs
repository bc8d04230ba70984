pub mod app_state;
pub mod logging;
pub mod pagination;
