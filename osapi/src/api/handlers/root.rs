use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/",
    tag = "docs",
    summary = "Redirect to documentation",
    responses(
        (status = 302, description = "Redirect to the interactive API documentation at /docs")
    )
)]
pub async fn redirect_to_docs() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/docs")])
}
