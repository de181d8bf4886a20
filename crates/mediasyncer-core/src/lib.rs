pub mod auctioneer;
pub mod bidder;
pub mod errors;
pub mod ids;
pub mod price;
pub mod protocol;
pub mod stats;
pub mod transport;
pub mod upload_url;
pub mod uploader;
pub mod volume;

pub use auctioneer::{Auctioneer, AuctioneerHandle};
pub use bidder::{Bidder, BidderHandle};
pub use errors::{MediaSyncerError, Result};
pub use ids::{AuctionId, ByteSize, FileId, PeerId, Price, PRICE_NOT_INTERESTED};
pub use protocol::NetworkProtocol;
pub use stats::FileStats;
pub use transport::Transport;
pub use upload_url::UploadUrlMinter;
pub use uploader::{HttpUploader, UploadOutcome, Uploader};
pub use volume::{Volume, VolumeEntry};
