use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hermes API",
        version = "0.2.0",
        description = "Batch geocoding proxy: resolves addresses through a resilient provider cascade while keeping upstream credentials server-side."
    ),
    paths(
        crate::routes::geocode,
        crate::routes::geocode_batch,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::GeocodeRequest,
        crate::dto::GeocodeResponse,
        crate::dto::BatchGeocodeRequest,
        crate::dto::BatchGeocodeResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "geocode", description = "Address resolution"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
