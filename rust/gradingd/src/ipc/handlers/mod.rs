pub mod core;
pub mod gpa;
pub mod grades;
pub mod imports;
pub mod records;
pub mod setup;
