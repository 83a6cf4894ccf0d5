//! OpenAPI documentation definition.

use fbstat_core::api::status::{ApiError, ApiRefresh, ApiStatus, ApiWalkStats, ApiWalkSummary};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::handle_metrics,
        crate::handlers::handle_database_report,
        crate::handlers::handle_refresh,
        crate::handlers::handle_status,
    ),
    components(schemas(ApiStatus, ApiRefresh, ApiWalkSummary, ApiWalkStats, ApiError)),
    info(
        title = "fbstat API",
        version = "1.0",
        description = "Firebird database statistics: gstat report metrics and raw reports"
    )
)]
pub(crate) struct ApiDoc;
