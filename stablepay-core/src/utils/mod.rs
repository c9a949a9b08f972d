pub mod format;
pub mod money;
