use super::common::{created_response, success_response, PaginationParams, SearchParams};
use crate::{
    auth::{AuthUser, SiteParams, SiteScope},
    errors::ServiceError,
    i18n::{self, Locale},
    services::customers::{
        CreateCustomerRequest, CustomerListResponse, CustomerResponse, UpdateCustomerRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Extension, Json, Router,
};

/// Customer routes, mounted under `/api/v1/customers`
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer)
                .patch(update_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    summary = "List customers",
    params(SiteParams, PaginationParams, SearchParams),
    responses(
        (status = 200, description = "Customers retrieved", body = ApiResponse<CustomerListResponse>),
        (status = 403, description = "Site not assigned to the user", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    Query(pagination): Query<PaginationParams>,
    Query(search): Query<SearchParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let (page, per_page) = pagination.resolve(&state.config);

    let customers = state
        .services
        .customers
        .list_customers(scope.site_ids(), search.q.as_deref(), page, per_page)
        .await?;
    Ok(success_response(customers, None))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    summary = "Create customer",
    params(SiteParams),
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<CustomerResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Response, ServiceError> {
    let site_id = SiteScope::from_params(&user, &sites)?.single()?;
    let customer = state
        .services
        .customers
        .create_customer(site_id, payload)
        .await?;
    Ok(created_response(customer, i18n::message("customer.created", locale)))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    summary = "Get customer",
    params(("id" = i32, Path, description = "Customer id"), SiteParams),
    responses(
        (status = 200, description = "Customer retrieved", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let customer = state
        .services
        .customers
        .get_customer(scope.site_ids(), id)
        .await?;
    Ok(success_response(customer, None))
}

#[utoipa::path(
    patch,
    path = "/api/v1/customers/{id}",
    summary = "Update customer",
    params(("id" = i32, Path, description = "Customer id"), SiteParams),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<CustomerResponse>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let customer = state
        .services
        .customers
        .update_customer(scope.site_ids(), id, payload)
        .await?;
    Ok(success_response(
        customer,
        Some(i18n::message("customer.updated", locale)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    summary = "Delete customer",
    params(("id" = i32, Path, description = "Customer id"), SiteParams),
    responses(
        (status = 200, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Customer still has orders", body = crate::errors::ErrorResponse),
    ),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    state
        .services
        .customers
        .delete_customer(scope.site_ids(), id)
        .await?;
    Ok(success_response(
        serde_json::json!({ "customer_id": id }),
        Some(i18n::message("customer.deleted", locale)),
    ))
}
