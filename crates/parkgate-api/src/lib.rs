//! parkgate-api - HTTP and WebSocket surface of the gateway
//!
//! Camera webhooks, barrier triggers and the display WebSocket rooms all
//! live here. Handlers are thin: each one composes the hub, the barrier
//! commander, the snapshot fetcher, the sign display and the cloud client
//! held in [`AppState`].
//!
//! # Usage
//!
//! ```ignore
//! use parkgate_api::{create_router, AppState};
//!
//! let state = AppState::new(hub, barriers, fetcher, signs, cloud, dedup, "PK01");
//! let router = create_router(state);
//! ```

pub mod cloud;
pub mod error;
pub mod event;
pub mod handlers;
pub mod state;

pub use cloud::{CloudApi, CloudError, CloudReply, HttpCloudClient};
pub use error::ApiError;
pub use event::{extract_xml_value, CameraUpload, PlateEvent, MAX_PARTS, MAX_UPLOAD_BYTES};
pub use handlers::ws::WsSubscriber;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Create the gateway router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/healthz", get(handlers::health::healthz))
        // Display rooms
        .route("/gate-in/{gate_no}", get(handlers::ws::gate_in))
        .route("/gate-out/{gate_no}", get(handlers::ws::gate_out))
        .route(
            "/zoning/entrance/{zoning_code}/{gate_no}",
            get(handlers::ws::zoning_entrance),
        )
        .route(
            "/zoning/exit/{zoning_code}/{gate_no}",
            get(handlers::ws::zoning_exit),
        )
        // Camera webhooks
        .route(
            "/api/v2-202402/order/verify-member",
            post(handlers::order::verify_member),
        )
        .route(
            "/api/v2-202402/order/verify-license-plate-out",
            post(handlers::order::verify_license_plate_out),
        )
        .route(
            "/api/v2-202402/zoning/entrance/{zoning_code}",
            post(handlers::zoning::zoning_entrance),
        )
        .route(
            "/api/v2-202402/zoning/exit/{zoning_code}",
            post(handlers::zoning::zoning_exit),
        )
        // Snapshots
        .route(
            "/api/v2-202401/image/collect-image/{gate_no}",
            post(handlers::image::collect_image),
        )
        .route(
            "/api/v2-202401/image/get-license-plate-picture",
            get(handlers::image::get_license_plate_picture),
        )
        // Barrier triggers
        .route(
            "/api/v2-202402/gate/open-barrier/{direction}/{gate}",
            get(handlers::barrier::open_barrier),
        )
        .route(
            "/api/v2-202402/gate/close-barrier/{direction}/{gate}",
            get(handlers::barrier::close_barrier),
        )
        .route(
            "/api/v2-202402/gate/open-zoning/{direction}/{gate}",
            get(handlers::barrier::open_zoning),
        )
        .route(
            "/api/v2-202402/gate/close-zoning/{direction}/{gate}",
            get(handlers::barrier::close_zoning),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors)
        .with_state(state)
}
