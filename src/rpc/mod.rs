//! Remote collaborators: the ledger RPC and the delegation feed.
//!
//! Ledger calls go through [`FailoverClient`], which walks an ordered list of
//! endpoints and never fails hard: when every endpoint soft-fails the call
//! yields `None` and the caller decides what missing data means.

mod client;
mod feed;

pub use client::{
    FailoverClient, HttpTransport, RpcRequest, RpcResponse, RpcTransport, GET_ACCOUNT_HISTORY,
};
pub use feed::{parse_incoming, to_current_state, DelegationFeed, IncomingDelegation};
