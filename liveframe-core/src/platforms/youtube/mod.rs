pub mod broadcasts;

pub use broadcasts::{YouTubeClient, LIVE_BROADCASTS_URL};
