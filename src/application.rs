pub mod backup;
pub mod merge;
