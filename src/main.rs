use std::sync::Arc;

use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;
use proto::kanban::{
    boards_service_server::BoardsServiceServer,
    columns_service_server::ColumnsServiceServer,
    health_service_server::HealthServiceServer,
    realtime_service_server::RealtimeServiceServer,
    tasks_service_server::TasksServiceServer,
};

use kanban::{
    config::Config,
    controllers::{
        BoardsController, ColumnsController, HealthController, RealtimeController,
        SharedStore, TasksController,
    },
    db::connection::establish_connection,
    realtime::ChangeHub,
    seed::seed_demo_board,
    store::PgStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kanban=info")),
        )
        .init();

    let config = Config::from_env()?;
    let pool = establish_connection(&config)?;
    let store: SharedStore = Arc::new(PgStore::new(pool));
    let hub = ChangeHub::new(config.change_buffer);

    if let Some(user_id) = &config.seed_demo_user {
        seed_demo_board(store.as_ref(), user_id).await?;
    }

    let boards_controller = BoardsController {
        store: store.clone(),
        hub: hub.clone(),
    };
    let columns_controller = ColumnsController {
        store: store.clone(),
        hub: hub.clone(),
    };
    let tasks_controller = TasksController {
        store: store.clone(),
        hub: hub.clone(),
    };
    let realtime_controller = RealtimeController { hub };
    let health_controller = HealthController { store };

    info!(address = %config.app_url, "kanban service listening");
    Server::builder()
        .add_service(BoardsServiceServer::new(boards_controller))
        .add_service(ColumnsServiceServer::new(columns_controller))
        .add_service(TasksServiceServer::new(tasks_controller))
        .add_service(RealtimeServiceServer::new(realtime_controller))
        .add_service(HealthServiceServer::new(health_controller))
        .serve(config.app_url)
        .await?;

    Ok(())
}
