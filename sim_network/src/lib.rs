pub mod link;
pub mod overlay;

pub use link::{link_capacity_bps, message_delay, sample_rho, BLOCK_MESSAGE_BITS, TX_MESSAGE_BITS};
pub use overlay::build_overlay;
