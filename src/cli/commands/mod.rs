pub mod catalog;
pub mod integrity;
pub mod users;
