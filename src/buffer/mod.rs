pub mod queue;

pub use queue::{ChannelMetrics, DeliveryChannel};
