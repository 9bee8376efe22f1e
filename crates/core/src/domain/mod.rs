pub mod employee;
pub mod skill;
