use tonic::{Request, Response, Status};
use tracing::warn;
use proto::kanban::{
    health_service_server::HealthService,
    HealthCheckRequest,
    HealthCheckResponse,
};

use super::SharedStore;

pub struct HealthController {
    pub store: SharedStore,
}

#[tonic::async_trait]
impl HealthService for HealthController {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let response = match self.store.ping().await {
            Ok(()) => HealthCheckResponse {
                serving: true,
                message: "ok".into(),
            },
            Err(err) => {
                warn!(error = %err, "health check failed");
                HealthCheckResponse {
                    serving: false,
                    message: err.to_string(),
                }
            }
        };
        Ok(Response::new(response))
    }
}
