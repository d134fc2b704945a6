pub mod cart;
pub mod catalog;
pub mod change;
pub mod order;
pub mod product;
