pub mod catalog;
pub mod editor;
pub mod geojson;
pub mod models;
pub mod projection;
