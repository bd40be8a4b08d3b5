use crate::{
    db::DbPool,
    entities::{customer, order, product},
    errors::ServiceError,
    services::money::from_cents,
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

/// Headline figures for the selected sites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardKpis {
    /// Orders that are not annulled
    pub total_orders: u64,
    /// Live orders not invoiced yet
    pub pending_invoicing: u64,
    /// Live orders not paid yet
    pub unpaid_orders: u64,
    /// Sum of live order totals
    pub revenue: Decimal,
    /// Active products with no stock left
    pub out_of_stock_products: u64,
    pub customers: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    fn live_orders(site_ids: &[i32]) -> sea_orm::Select<order::Entity> {
        order::Entity::find()
            .filter(order::Column::SiteId.is_in(site_ids.iter().copied()))
            .filter(order::Column::IsAnnulled.eq(false))
    }

    #[instrument(skip(self))]
    pub async fn kpis(&self, site_ids: &[i32]) -> Result<DashboardKpis, ServiceError> {
        let db = &*self.db_pool;

        let total_orders = Self::live_orders(site_ids).count(db).await?;
        let pending_invoicing = Self::live_orders(site_ids)
            .filter(order::Column::IsInvoiced.eq(false))
            .count(db)
            .await?;
        let unpaid_orders = Self::live_orders(site_ids)
            .filter(order::Column::IsPaid.eq(false))
            .count(db)
            .await?;

        let revenue_cents = Self::live_orders(site_ids)
            .select_only()
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(total_cents), 0) AS BIGINT)"),
                "revenue_cents",
            )
            .into_tuple::<i64>()
            .one(db)
            .await?
            .unwrap_or(0);

        let out_of_stock_products = product::Entity::find()
            .filter(product::Column::SiteId.is_in(site_ids.iter().copied()))
            .filter(product::Column::Active.eq(true))
            .filter(product::Column::StockQuantity.lte(0))
            .count(db)
            .await?;

        let customers = customer::Entity::find()
            .filter(customer::Column::SiteId.is_in(site_ids.iter().copied()))
            .count(db)
            .await?;

        Ok(DashboardKpis {
            total_orders,
            pending_invoicing,
            unpaid_orders,
            revenue: from_cents(revenue_cents),
            out_of_stock_products,
            customers,
        })
    }
}
