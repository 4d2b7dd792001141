pub mod question_manager;
pub mod session_store;
