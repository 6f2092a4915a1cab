pub mod catalog;
pub mod confirmation;
pub mod language;
pub mod session;
pub mod slot;
