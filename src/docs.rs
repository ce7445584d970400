//! OpenAPI document and Swagger UI wiring.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::access::check_page,
        routes::access::check_action,
        routes::access::get_role_permissions,
        routes::access::replace_role_permissions,
        routes::access::toggle_role_page,
        routes::access::toggle_role_action,
        routes::access::list_actions,
        routes::access::list_users,
        routes::access::approve_user,
        routes::access::disable_user,
        routes::access::enable_user,
        routes::access::set_user_roles,
        routes::access::set_user_overrides,
        routes::health::health,
    ),
    components(schemas(
        models::profile::Account,
        models::profile::AuthResponse,
        models::profile::LoginRequest,
        models::profile::RegisterRequest,
        models::profile::ApproveRequest,
        models::profile::SetRolesRequest,
        models::profile::OverridesUpdateRequest,
        models::access::TogglePageRequest,
        models::access::ToggleActionRequest,
        models::access::CheckResponse,
        models::access::ActionListResponse,
        crate::authz::Role,
        crate::authz::UserStatus,
        routes::health::HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login, and the current account"),
        (name = "Access", description = "Permission checks, role-permission table, account lifecycle"),
        (name = "Health", description = "Liveness and database reachability")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Swagger UI at /docs, backed by the generated document.
pub fn swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
