pub mod books;
pub mod check;
pub mod harvest;
