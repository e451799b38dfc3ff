//! Data sources
//!
//! Responsible for:
//! - Contract reads over JSON-RPC
//! - Paged GraphQL reads from subgraph indexers
//! - USD quotes from a REST price API
//!
//! Each source sits behind a trait so dashboard sections can be exercised
//! against in-memory fakes.

pub mod chain;
pub mod price_feed;
pub mod subgraph;

pub use chain::{ContractAddresses, ContractReader, RawStakingPool, RpcContractReader, SynthetixContracts};
pub use price_feed::{PriceFeed, PriceQuote, RestPriceFeed};
pub use subgraph::{
    int_field, number_field, paginate, string_field, EntityQuery, HttpSubgraphClient, OrderDirection,
    SubgraphClient, MAX_PAGE_SIZE,
};
