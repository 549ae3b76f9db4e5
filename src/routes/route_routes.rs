use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::controllers::route_controller::RouteController;
use crate::dto::route_dto::{
    ApiResponse, CreateRouteRequest, RegisterDeliveryRequest, RouteResponse, UpdateRouteRequest,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_route).get(list_routes))
        .route("/stream", get(stream_routes))
        .route("/:id", get(get_route).patch(update_route).delete(delete_route))
        .route("/:id/deliveries", post(register_delivery))
}

async fn create_route(
    State(state): State<AppState>,
    payload: Result<Json<CreateRouteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RouteResponse>>), AppError> {
    let Json(request) = payload?;
    let controller = RouteController::new(state.routes.clone());
    let response = controller.create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_routes(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<RouteResponse>>>, AppError> {
    let controller = RouteController::new(state.routes.clone());
    let response = controller.list().await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let controller = RouteController::new(state.routes.clone());
    let response = controller.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateRouteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let Json(request) = payload?;
    let controller = RouteController::new(state.routes.clone());
    let response = controller.update(id, request).await?;
    Ok(Json(response))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let controller = RouteController::new(state.routes.clone());
    controller.delete(id).await?;
    Ok(Json(ApiResponse::message("Rota excluída".to_string())))
}

async fn register_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RegisterDeliveryRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RouteResponse>>, AppError> {
    let Json(request) = payload?;
    let controller = RouteController::new(state.routes.clone());
    let response = controller.register_delivery(id, request).await?;
    Ok(Json(response))
}

/// Snapshots en vivo como Server-Sent Events (evento `routes`)
async fn stream_routes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::info!("📡 Nuevo observador de rutas");

    let stream = state.routes.watch().into_stream().filter_map(|snapshot| async move {
        match snapshot {
            Ok(routes) => {
                let body: Vec<RouteResponse> = routes.into_iter().map(RouteResponse::from).collect();
                Some(Event::default().event("routes").json_data(body))
            }
            Err(e) => {
                tracing::warn!("⚠️ Snapshot de rutas omitido: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
