pub mod client;
pub mod feed;
pub mod models;
pub mod store;

pub use client::SupabaseClient;
pub use feed::{ChangeFeed, ChangeNotification, DisabledChangeFeed, ManualChangeFeed, PollingChangeFeed};
pub use models::AuthSession;
pub use store::{AuthProvider, Collection, RemoteStore};
