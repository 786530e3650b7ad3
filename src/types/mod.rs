mod blinded_block;
mod block_submission;
mod builder_bid;
mod execution_payload;
mod primitives;
mod proposer_schedule;
mod registration;

pub use blinded_block::*;
pub use block_submission::*;
pub use builder_bid::*;
pub use execution_payload::*;
pub use primitives::*;
pub use proposer_schedule::*;
pub use registration::*;
