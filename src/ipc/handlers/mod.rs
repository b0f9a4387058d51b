pub mod calc;
pub mod core;
pub mod courses;
pub mod criteria;
pub mod marks;
pub mod students;
