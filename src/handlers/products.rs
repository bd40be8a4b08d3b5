use super::common::{created_response, success_response, PaginationParams};
use crate::{
    auth::{AuthUser, SiteParams, SiteScope},
    errors::ServiceError,
    i18n::{self, Locale},
    services::products::{
        CreateProductRequest, ProductFilter, ProductListResponse, ProductResponse,
        UpdateProductRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustment {
    /// Signed quantity added to the stock
    pub delta: i32,
}

/// Product routes, mounted under `/api/v1/products`
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product)
                .patch(update_product)
                .put(update_product)
                .delete(delete_product),
        )
        .route("/:id/stock", post(adjust_stock))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(SiteParams, PaginationParams, ProductFilter),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductListResponse>),
        (status = 403, description = "Site not assigned to the user", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ProductFilter>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let (page, per_page) = pagination.resolve(&state.config);

    let products = state
        .services
        .products
        .list_products(scope.site_ids(), filter, page, per_page)
        .await?;
    Ok(success_response(products, None))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    params(SiteParams),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already used on the site", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    let site_id = SiteScope::from_params(&user, &sites)?.single()?;
    let product = state
        .services
        .products
        .create_product(site_id, payload)
        .await?;
    Ok(created_response(product, i18n::message("product.created", locale)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = i32, Path, description = "Product id"), SiteParams),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let product = state
        .services
        .products
        .get_product(scope.site_ids(), id)
        .await?;
    Ok(success_response(product, None))
}

#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = i32, Path, description = "Product id"), SiteParams),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let product = state
        .services
        .products
        .update_product(scope.site_ids(), id, payload)
        .await?;
    Ok(success_response(
        product,
        Some(i18n::message("product.updated", locale)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/stock",
    summary = "Adjust product stock",
    params(("id" = i32, Path, description = "Product id"), SiteParams),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<StockAdjustment>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let product = state
        .services
        .products
        .adjust_stock(scope.site_ids(), id, payload.delta)
        .await?;
    Ok(success_response(
        product,
        Some(i18n::message("product.stock_adjusted", locale)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = i32, Path, description = "Product id"), SiteParams),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    state
        .services
        .products
        .delete_product(scope.site_ids(), id)
        .await?;
    Ok(success_response(
        serde_json::json!({ "product_id": id }),
        Some(i18n::message("product.deleted", locale)),
    ))
}
