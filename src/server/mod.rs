mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::upload_handler,
        api::image_handler,
        api::image_data_handler,
        api::similar_handler,
        api::history_handler,
        api::clear_history_handler,
    ),
    components(schemas(
        types::UploadForm,
        types::UploadResponse,
        types::ImageView,
        types::SimilarImage,
        types::SimilarResponse,
        types::HistoryView,
        types::SuccessResponse,
        types::ErrorResponse,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
///
/// 上传接口自行边读边检查大小，这里不限制请求体
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/images/upload", post(api::upload_handler))
        .route("/api/images/{id}", get(api::image_handler))
        .route("/api/images/{id}/data", get(api::image_data_handler))
        .route("/api/images/{id}/similar", get(api::similar_handler))
        .route("/api/history", get(api::history_handler).delete(api::clear_history_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
