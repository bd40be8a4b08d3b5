pub mod customers;
pub mod dashboard;
pub mod money;
pub mod order_reference;
pub mod orders;
pub mod products;
pub mod users;
