use crate::compare::ComparisonCoordinator;
use std::sync::Arc;

pub struct AppState {
    pub coordinator: Arc<ComparisonCoordinator>,
}
