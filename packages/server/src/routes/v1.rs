use axum::{
    Extension, Router,
    routing::{delete, get, post},
};

use crate::config::AppConfig;
use crate::domain::DependentKind;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new().nest("/namespaces/{namespace}", namespace_routes(config))
}

fn namespace_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .nest("/applications", application_routes(config))
        .route(
            "/staging/{stage_id}/complete",
            get(handlers::staging::stage_complete),
        )
        .nest(
            "/configurations",
            dependent_routes().layer(Extension(DependentKind::Configuration)),
        )
        .nest(
            "/services",
            dependent_routes().layer(Extension(DependentKind::Service)),
        )
}

fn application_routes(config: &AppConfig) -> Router<AppState> {
    let crud = Router::new()
        .route(
            "/",
            get(handlers::application::list_applications)
                .post(handlers::application::create_application)
                .delete(handlers::application::delete_applications),
        )
        .route(
            "/{app}",
            get(handlers::application::show_application)
                .patch(handlers::application::update_application)
                .delete(handlers::application::delete_application),
        )
        .route("/{app}/stage", post(handlers::staging::stage))
        .route("/{app}/deploy", post(handlers::staging::deploy))
        .route("/{app}/restart", post(handlers::staging::restart))
        .nest(
            "/{app}/configurationbindings",
            binding_routes().layer(Extension(DependentKind::Configuration)),
        )
        .nest(
            "/{app}/servicebindings",
            binding_routes().layer(Extension(DependentKind::Service)),
        );

    let upload = Router::new()
        .route("/{app}/store", post(handlers::application::upload))
        .layer(handlers::application::upload_body_limit(
            config.storage.max_blob_size,
        ));

    crud.merge(upload)
}

fn binding_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::binding::bind))
        .route("/{name}", delete(handlers::binding::unbind))
}

fn dependent_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::dependent::list_dependents).post(handlers::dependent::create_dependent),
        )
        .route(
            "/{name}",
            get(handlers::dependent::show_dependent)
                .patch(handlers::dependent::patch_dependent)
                .put(handlers::dependent::replace_dependent)
                .delete(handlers::dependent::delete_dependent),
        )
}
