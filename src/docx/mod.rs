pub mod extract;
pub mod package;
pub mod patch;
