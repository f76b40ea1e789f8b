mod handlers;
mod types;

pub use handlers::{list_alerts, resolve_alert, unresolved_count};
pub use types::{AlertsQuery, UnresolvedCountResponse};

// Re-export utoipa path structs for OpenAPI documentation
pub use handlers::{__path_list_alerts, __path_resolve_alert, __path_unresolved_count};
