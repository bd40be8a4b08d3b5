use super::common::success_response;
use crate::{
    auth::{AuthUser, SiteParams, SiteScope},
    errors::ServiceError,
    services::dashboard::DashboardKpis,
    ApiResponse, AppState,
};
use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Extension, Router,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/kpis", get(get_kpis))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/kpis",
    summary = "Dashboard KPIs",
    description = "Order, revenue, stock and customer figures for the selected sites",
    params(SiteParams),
    responses(
        (status = 200, description = "KPIs computed", body = ApiResponse<DashboardKpis>),
        (status = 403, description = "Site not assigned to the user", body = crate::errors::ErrorResponse),
    ),
    tag = "Dashboard"
)]
pub async fn get_kpis(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(sites): Query<SiteParams>,
) -> Result<Response, ServiceError> {
    let scope = SiteScope::from_params(&user, &sites)?;
    let kpis = state.services.dashboard.kpis(scope.site_ids()).await?;
    Ok(success_response(kpis, None))
}
