pub mod billing;
pub mod interview;
