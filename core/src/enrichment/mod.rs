//! Organization enrichment.
//!
//! Player handles are resolved to their RSI organization through an
//! [`OrgLookup`] service. Results are cached per handle and attached to
//! events off the ingestion path.

mod cache;
mod rsi;
mod stage;
mod store;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

pub use cache::{OrgCache, UNAVAILABLE_COOLDOWN};
pub use rsi::{RsiLookup, citizen_url, organization_url, parse_org_sid};
pub use stage::{Enricher, EnrichmentStage, StageSender, enrichment_stage};
pub use store::{CachedAffiliation, default_cache_path, load_cache_file, save_cache_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    /// Spectrum identifier, e.g. `TEST`.
    pub sid: String,
}

/// Definitive answer for one handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Affiliation {
    /// No citizen page exists. Usually an NPC.
    NotACitizen,
    Citizen {
        organization: Option<OrganizationInfo>,
    },
}

impl Affiliation {
    pub fn is_citizen(&self) -> bool {
        matches!(self, Affiliation::Citizen { .. })
    }

    pub fn organization(&self) -> Option<&OrganizationInfo> {
        match self {
            Affiliation::Citizen { organization } => organization.as_ref(),
            Affiliation::NotACitizen => None,
        }
    }
}

/// Resolves a player handle to its affiliation.
///
/// Any error is treated as "unavailable" by the cache.
pub trait OrgLookup: Send + Sync + 'static {
    fn lookup(&self, handle: &str)
    -> impl Future<Output = Result<Affiliation, LookupError>> + Send;
}
