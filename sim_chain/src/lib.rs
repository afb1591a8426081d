pub mod block;

pub use block::{
    AddOutcome, Block, BlockId, BlockTree, IdGen, PeerId, SimTime, Transaction, TxId,
    ValidationOutcome, COINBASE_REWARD, DEFAULT_BALANCE, GENESIS_ID, KB_BITS, MAX_TX_PER_BLOCK,
};
