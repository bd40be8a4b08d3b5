pub mod customer;
pub mod order;
pub mod order_address;
pub mod order_item;
pub mod order_note;
pub mod order_payment;
pub mod product;
pub mod site;
pub mod user;
pub mod user_site;
