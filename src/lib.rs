pub mod codec;
pub mod compile;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod retry;

pub use codec::{Lp, PointsLedger, Swap};
pub use compile::Checkpoints;
pub use config::Config;
pub use datasource::{
    ChainError, ChainReader, HermesPriceSource, MockChainReader, MockPriceSource, PriceSource,
    RpcChainReader,
};
pub use db::{init_db, Repository};
pub use domain::{Address, OwnerLedger, PositionEvent, ProtocolEvent, Signature, SwapEvent};
pub use error::CycleError;
pub use orchestration::{CycleReport, Orchestrator};
