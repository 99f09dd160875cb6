pub mod analyzer;
pub mod checksum;
pub mod cli;
pub mod format;
pub mod image;
pub mod model;
pub mod srec;

pub use analyzer::run;
