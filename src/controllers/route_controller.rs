use uuid::Uuid;
use validator::Validate;

use crate::dto::route_dto::{
    ApiResponse, CreateRouteRequest, RegisterDeliveryRequest, RouteResponse, UpdateRouteRequest,
};
use crate::services::RouteService;
use crate::utils::errors::AppError;

pub struct RouteController {
    service: RouteService,
}

impl RouteController {
    pub fn new(service: RouteService) -> Self {
        Self { service }
    }

    pub async fn create(
        &self,
        request: CreateRouteRequest,
    ) -> Result<ApiResponse<RouteResponse>, AppError> {
        request.validate()?;

        let route = self
            .service
            .create_route(request.stop_count, request.package_count, request.route_date)
            .await?;

        Ok(ApiResponse::success_with_message(
            route.into(),
            "Rota cadastrada com sucesso".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<RouteResponse, AppError> {
        let route = self.service.get_route(id).await?;
        Ok(route.into())
    }

    pub async fn list(&self) -> Result<Vec<RouteResponse>, AppError> {
        let routes = self.service.list_routes().await?;
        Ok(routes.into_iter().map(RouteResponse::from).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateRouteRequest,
    ) -> Result<ApiResponse<RouteResponse>, AppError> {
        request.validate()?;
        let patch = request.into_patch()?;

        let route = self.service.update_route(id, patch).await?;

        Ok(ApiResponse::success_with_message(
            route.into(),
            "Rota atualizada com sucesso".to_string(),
        ))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.service.delete_route(id).await?;
        Ok(())
    }

    pub async fn register_delivery(
        &self,
        id: Uuid,
        request: RegisterDeliveryRequest,
    ) -> Result<ApiResponse<RouteResponse>, AppError> {
        let photo = request.photo_payload()?;

        let route = self
            .service
            .register_delivery(id, photo, request.note)
            .await?;

        let message = if route.is_complete() {
            "Rota concluída! Todas as entregas foram registradas"
        } else {
            "Entrega registrada"
        };

        Ok(ApiResponse::success_with_message(route.into(), message.to_string()))
    }
}
