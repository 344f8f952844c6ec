pub mod editor;
pub mod gateway_demo;
pub mod projects;
pub mod query_console;
