use crate::{
    db::DbPool,
    entities::{customer, order},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub customer_id: i32,
    pub site_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            customer_id: model.customer_id,
            site_id: model.site_id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            city: model.city,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Site-scoped customer records
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create_customer(
        &self,
        site_id: i32,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;

        let model = customer::ActiveModel {
            site_id: Set(site_id),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            email: Set(non_blank(request.email)),
            phone: Set(non_blank(request.phone)),
            city: Set(non_blank(request.city)),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create customer");
            ServiceError::DatabaseError(e)
        })?;

        info!(customer_id = model.customer_id, site_id, "Customer created");
        Ok(model.into())
    }

    async fn find_scoped(
        &self,
        site_ids: &[i32],
        customer_id: i32,
    ) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(customer_id)
            .filter(customer::Column::SiteId.is_in(site_ids.iter().copied()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {customer_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_customer(
        &self,
        site_ids: &[i32],
        customer_id: i32,
    ) -> Result<CustomerResponse, ServiceError> {
        Ok(self.find_scoped(site_ids, customer_id).await?.into())
    }

    /// Lists customers by last name, optionally filtered by a name or email fragment
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        site_ids: &[i32],
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<CustomerListResponse, ServiceError> {
        let mut query = customer::Entity::find()
            .filter(customer::Column::SiteId.is_in(site_ids.iter().copied()));

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::FirstName.contains(term))
                    .add(customer::Column::LastName.contains(term))
                    .add(customer::Column::Email.contains(term)),
            );
        }

        let paginator = query
            .order_by_asc(customer::Column::LastName)
            .order_by_asc(customer::Column::FirstName)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(CustomerListResponse {
            customers: customers.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        site_ids: &[i32],
        customer_id: i32,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_scoped(site_ids, customer_id).await?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(first_name) = request.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if request.email.is_some() {
            active.email = Set(non_blank(request.email));
        }
        if request.phone.is_some() {
            active.phone = Set(non_blank(request.phone));
        }
        if request.city.is_some() {
            active.city = Set(non_blank(request.city));
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, customer_id, "Failed to update customer");
            ServiceError::DatabaseError(e)
        })?;

        Ok(updated.into())
    }

    /// Deletes a customer that no order refers to
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, site_ids: &[i32], customer_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_scoped(site_ids, customer_id).await?;

        let order_count = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .count(&*self.db_pool)
            .await?;
        if order_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer {customer_id} has {order_count} order(s)"
            )));
        }

        customer::Entity::delete_by_id(existing.customer_id)
            .exec(&*self.db_pool)
            .await?;
        info!(customer_id, "Customer deleted");
        Ok(())
    }
}
