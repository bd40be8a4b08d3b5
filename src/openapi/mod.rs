use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GesPack API",
        version = "1.0.0",
        description = r#"
# GesPack Order Management API

Multi-tenant backend for order entry, customers, products and dashboard indicators.

## Authentication

Log in through `POST /auth/login`. The token is returned in the body and set as the
`gespack_token` HttpOnly cookie. Non-browser clients can send it as a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Sites

Every business endpoint is scoped to the sites assigned to the caller. Narrow the scope with
`site_id=<id>` or `site_ids=1,2`. Requesting a site outside the assignment yields `403`.
Creation endpoints require exactly one site.

## Errors

```json
{
  "success": false,
  "error": "Conflict",
  "message": "Order reference already in use",
  "request_id": "5f0c..."
}
```

## Localisation

Envelope messages follow `Accept-Language` (`fr` by default, `en` supported).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order entry and consultation"),
        (name = "Customers", description = "Customer management"),
        (name = "Products", description = "Product catalogue and stock"),
        (name = "Dashboard", description = "Key performance indicators"),
        (name = "Auth", description = "Session management"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::search_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::add_order_note,

        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::adjust_stock,
        crate::handlers::products::delete_product,

        // Dashboard
        crate::handlers::dashboard::get_kpis,

        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,

        // Health
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::PaymentRequest,
            crate::services::orders::OrderItemRequest,
            crate::services::orders::AddressRequest,
            crate::services::orders::AddNoteRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::PaymentResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::AddressResponse,
            crate::services::orders::NoteResponse,
            crate::services::orders::OrderDetailResponse,
            crate::services::orders::OrderListResponse,

            // Customer types
            crate::services::customers::CreateCustomerRequest,
            crate::services::customers::UpdateCustomerRequest,
            crate::services::customers::CustomerResponse,
            crate::services::customers::CustomerListResponse,

            // Product types
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::ProductResponse,
            crate::services::products::ProductListResponse,
            crate::handlers::products::StockAdjustment,

            // Dashboard and session types
            crate::services::dashboard::DashboardKpis,
            crate::services::users::UserProfile,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::auth::IssuedToken,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    security(
        ("bearer_auth" = []),
        ("cookie_auth" = [])
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "cookie_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(crate::auth::AUTH_COOKIE))),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_routes_and_schemes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("GesPack API"));
        assert!(json.contains("/api/v1/orders/{id}/notes"));
        assert!(json.contains("/api/v1/dashboard/kpis"));
        assert!(json.contains("bearer_auth"));
        assert!(json.contains("gespack_token"));
    }
}
