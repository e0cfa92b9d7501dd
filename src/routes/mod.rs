use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod delivery_type_routes;
pub mod home_routes;
pub mod notification_routes;
pub mod organization_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/users", user_routes::router())
        .nest("/api/v1/delivery_types", delivery_type_routes::router())
        .nest("/api/v1", organization_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", notification_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
