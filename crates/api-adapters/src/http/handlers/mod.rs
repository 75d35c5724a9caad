pub mod admin;
pub mod catalog;
pub mod certificates;
pub mod me;
pub mod ops;
pub mod payments;
pub mod registration;
