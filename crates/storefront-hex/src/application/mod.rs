pub mod cart_service;
pub mod catalog_service;
pub mod change_feed;
pub mod order_service;
pub mod storefront;
