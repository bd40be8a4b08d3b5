use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        customers::CustomerService, dashboard::DashboardService, orders::OrderService,
        products::ProductService, users::UserService,
    },
};
use std::sync::Arc;

pub mod auth;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod products;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub customers: Arc<CustomerService>,
    pub products: Arc<ProductService>,
    pub dashboard: Arc<DashboardService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), config.order_retry())),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            products: Arc::new(ProductService::new(db_pool.clone())),
            dashboard: Arc::new(DashboardService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool)),
        }
    }
}
