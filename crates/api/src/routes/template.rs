//! Route definitions for the `/templates` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::template;
use crate::state::AppState;

/// Routes mounted at `/templates`.
///
/// ```text
/// GET    /            -> list_templates
/// POST   /            -> create_template
/// GET    /variables   -> list_variables
/// GET    /types       -> list_types
/// GET    /{id}        -> get_template
/// PUT    /{id}        -> update_template
/// DELETE /{id}        -> deactivate_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(template::list_templates).post(template::create_template),
        )
        .route("/variables", get(template::list_variables))
        .route("/types", get(template::list_types))
        .route(
            "/{id}",
            get(template::get_template)
                .put(template::update_template)
                .delete(template::deactivate_template),
        )
}
