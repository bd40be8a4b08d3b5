use crate::{
    db::DbPool,
    entities::product,
    errors::ServiceError,
    services::money::{from_cents, to_cents, validate_non_negative},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub product_id: i32,
    pub site_id: i32,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub stock_quantity: i32,
    pub active: bool,
    pub out_of_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            out_of_stock: model.is_out_of_stock(),
            product_id: model.product_id,
            site_id: model.site_id,
            sku: model.sku,
            name: model.name,
            unit_price: from_cents(model.unit_price_cents),
            stock_quantity: model.stock_quantity,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductFilter {
    /// SKU prefix or name fragment
    pub search: Option<String>,
    pub out_of_stock: Option<bool>,
    pub active: Option<bool>,
}

/// Site-scoped product catalog
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        site_id: i32,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;

        let model = product::ActiveModel {
            site_id: Set(site_id),
            sku: Set(request.sku.trim().to_string()),
            name: Set(request.name.trim().to_string()),
            unit_price_cents: Set(to_cents(request.unit_price)?),
            stock_quantity: Set(request.stock_quantity),
            active: Set(request.active),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            warn!(error = %e, site_id, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = model.product_id, site_id, "Product created");
        Ok(model.into())
    }

    async fn find_scoped(
        &self,
        site_ids: &[i32],
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::SiteId.is_in(site_ids.iter().copied()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        site_ids: &[i32],
        product_id: i32,
    ) -> Result<ProductResponse, ServiceError> {
        Ok(self.find_scoped(site_ids, product_id).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        site_ids: &[i32],
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let mut query = product::Entity::find()
            .filter(product::Column::SiteId.is_in(site_ids.iter().copied()));

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Sku.starts_with(term))
                    .add(product::Column::Name.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(product::Column::Active.eq(active));
        }
        match filter.out_of_stock {
            Some(true) => {
                query = query
                    .filter(product::Column::Active.eq(true))
                    .filter(product::Column::StockQuantity.lte(0));
            }
            Some(false) => {
                query = query.filter(
                    Condition::any()
                        .add(product::Column::Active.eq(false))
                        .add(product::Column::StockQuantity.gt(0)),
                );
            }
            None => {}
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(ProductListResponse {
            products: products.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        site_ids: &[i32],
        product_id: i32,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_scoped(site_ids, product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(sku) = request.sku {
            active.sku = Set(sku.trim().to_string());
        }
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(price) = request.unit_price {
            active.unit_price_cents = Set(to_cents(price)?);
        }
        if let Some(stock) = request.stock_quantity {
            active.stock_quantity = Set(stock);
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        Ok(updated.into())
    }

    /// Applies a relative stock movement in a single statement
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        site_ids: &[i32],
        product_id: i32,
        delta: i32,
    ) -> Result<ProductResponse, ServiceError> {
        let existing = self.find_scoped(site_ids, product_id).await?;

        product::Entity::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(delta),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::ProductId.eq(existing.product_id))
            .exec(&*self.db_pool)
            .await?;

        self.get_product(site_ids, product_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, site_ids: &[i32], product_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_scoped(site_ids, product_id).await?;
        product::Entity::delete_by_id(existing.product_id)
            .exec(&*self.db_pool)
            .await?;
        info!(product_id, "Product deleted");
        Ok(())
    }
}
