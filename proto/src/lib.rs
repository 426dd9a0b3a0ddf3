pub mod kanban {
    tonic::include_proto!("kanban");
}
