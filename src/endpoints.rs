//! RPC endpoint resolution shared by the dashboard and the diagnose binary

use std::env;
use std::fmt;

/// RPC endpoint template; `{}` is replaced by `PROVIDER_API_KEY`
pub const PROVIDER_URL_TEMPLATE: &str = "https://mainnet.infura.io/v3/{}";
pub const PUBLIC_RPC_URL: &str = "https://eth.llamarpc.com";

/// Where the resolved RPC URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcSource {
    Explicit,
    ProviderKey,
    Public,
}

impl fmt::Display for RpcSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcSource::Explicit => write!(f, "(RPC_URL)"),
            RpcSource::ProviderKey => write!(f, "(built from PROVIDER_API_KEY)"),
            RpcSource::Public => write!(f, "(default public RPC)"),
        }
    }
}

/// An explicit URL wins; otherwise the provider URL is built from the key.
/// Empty values count as unset.
pub fn resolve_rpc_url(rpc_url: Option<String>, api_key: Option<String>) -> (String, RpcSource) {
    if let Some(url) = rpc_url.filter(|url| !url.is_empty()) {
        return (url, RpcSource::Explicit);
    }
    match api_key.filter(|key| !key.is_empty()) {
        Some(key) => (PROVIDER_URL_TEMPLATE.replace("{}", &key), RpcSource::ProviderKey),
        None => (PUBLIC_RPC_URL.to_string(), RpcSource::Public),
    }
}

/// [`resolve_rpc_url`] over `RPC_URL` and `PROVIDER_API_KEY`
pub fn rpc_url_from_env() -> (String, RpcSource) {
    resolve_rpc_url(env::var("RPC_URL").ok(), env::var("PROVIDER_API_KEY").ok())
}
