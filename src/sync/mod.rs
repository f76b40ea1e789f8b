pub mod readings;
pub mod scheduler;
pub mod session;
pub mod subscriptions;
pub mod synchronizer;
pub mod thresholds;

pub use readings::{FixedReadings, RandomWalk, ReadingSource};
pub use session::{AlertView, DashboardSession};
pub use subscriptions::{ChannelState, ChannelStatus, RefreshTask};
pub use synchronizer::{SyncOptions, Synchronizer, TickFailure, TickReport};
pub use thresholds::{ThresholdEdit, ThresholdForm, ThresholdSaveReport};
