use axum::{
    routing::{delete, get, patch, post},
    Router,
};

pub mod companies;
pub mod members;
pub mod password;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/user", post(users::register))
        .route("/user/login", patch(users::login))
        .nest("/password-reset", password::router())
}

/// Endpoints that require an authenticated caller.
pub fn router() -> Router {
    Router::new()
        .route(
            "/user",
            get(users::get_me).patch(users::update_me).delete(users::deactivate_me),
        )
        .route("/user/companies", get(users::my_companies))
        .nest("/company", company_router())
}

fn company_router() -> Router {
    Router::new()
        .route("/", post(companies::create_company))
        .route("/by-email/:email", get(companies::get_company_by_email))
        .route(
            "/:id",
            get(companies::get_company)
                .patch(companies::update_company)
                .delete(companies::close_company),
        )
        .route("/:id/role", post(roles::create_role).delete(roles::delete_role))
        .route("/:id/role/:name", patch(roles::update_role))
        .route("/:id/roles", get(roles::list_roles))
        .route("/:id/users", get(members::list_members).post(members::add_member))
        .route("/:id/user/:user_id", delete(members::remove_member))
}
