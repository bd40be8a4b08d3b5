use super::common::{created_response, success_response, PaginationParams, SearchParams};
use crate::{
    auth::{AuthUser, SiteParams, SiteScope},
    errors::ServiceError,
    i18n::{self, Locale},
    services::orders::{
        AddNoteRequest, CreateOrderRequest, NoteResponse, OrderDetailResponse, OrderListFilter,
        OrderListResponse, OrderResponse, UpdateOrderRequest,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};

/// Order routes, mounted under `/api/v1/orders`
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/search", get(search_orders))
        .route(
            "/:id",
            get(get_order).patch(update_order).put(update_order).delete(delete_order),
        )
        .route("/:id/notes", post(add_order_note))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Paginated list of orders for the selected sites, newest first",
    params(SiteParams, PaginationParams, OrderListFilter),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Site not assigned to the user", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<OrderListFilter>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let (page, per_page) = pagination.resolve(&state.config);

    let orders = state
        .services
        .orders
        .list_orders(scope.site_ids(), filter, page, per_page)
        .await?;
    Ok(success_response(orders, None))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/search",
    summary = "Search orders",
    description = "Match orders by reference prefix or customer name",
    params(SiteParams, SearchParams),
    responses(
        (status = 200, description = "Matching orders", body = ApiResponse<Vec<OrderResponse>>),
        (status = 400, description = "Empty search term", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn search_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    Query(search): Query<SearchParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let limit = state.config.page_size(search.limit);
    let term = search.q.unwrap_or_default();

    let orders = state
        .services
        .orders
        .search_orders(scope.site_ids(), &term, limit)
        .await?;
    Ok(success_response(orders, None))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Create an order with its payment, items, addresses and notes in one transaction",
    params(SiteParams),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderDetailResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Site not assigned to the user", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order reference still colliding after retries", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Response, ServiceError> {
    let site_id = SiteScope::from_params(&user, &sites)?.single()?;

    let order = state
        .services
        .orders
        .create_order(site_id, Some(user.user_id), payload)
        .await?;
    Ok(created_response(order, i18n::message("order.created", locale)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order id"), SiteParams),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetailResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let order = state.services.orders.get_order(scope.site_ids(), id).await?;
    Ok(success_response(order, None))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}",
    summary = "Update order",
    description = "Partial update of header fields and status flags",
    params(("id" = i32, Path, description = "Order id"), SiteParams),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<UpdateOrderRequest>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let order = state
        .services
        .orders
        .update_order(scope.site_ids(), id, payload)
        .await?;
    Ok(success_response(
        order,
        Some(i18n::message("order.updated", locale)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    description = "Delete an order together with its payment, items, addresses and notes",
    params(("id" = i32, Path, description = "Order id"), SiteParams),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    state.services.orders.delete_order(scope.site_ids(), id).await?;
    Ok(success_response(
        serde_json::json!({ "order_id": id }),
        Some(i18n::message("order.deleted", locale)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/notes",
    summary = "Add order note",
    params(("id" = i32, Path, description = "Order id"), SiteParams),
    request_body = AddNoteRequest,
    responses(
        (status = 201, description = "Note added", body = ApiResponse<NoteResponse>),
        (status = 400, description = "Blank note", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn add_order_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Query(sites): Query<SiteParams>,
    locale: Locale,
    Json(payload): Json<AddNoteRequest>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let note = state
        .services
        .orders
        .add_note(scope.site_ids(), id, Some(user.user_id), payload)
        .await?;
    Ok(created_response(note, i18n::message("order.note_added", locale)))
}
