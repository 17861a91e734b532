pub mod backend;
pub mod prefs;
