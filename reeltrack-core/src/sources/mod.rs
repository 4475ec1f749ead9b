//! Metadata source clients implementing the [`ports`](crate::ports) traits.

pub mod tvmaze;

use serde::{Deserialize, Serialize};

pub use tvmaze::{ShowExternals, TvmazeClient, TvmazeConfig, TvmazeIdMapper};

/// Which metadata sources to talk to. A source without a section is off.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvmaze: Option<TvmazeConfig>,
}
