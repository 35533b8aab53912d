//! Token authentication and tenant scope.
//!
//! Policy is deliberately small: a token maps to a user, a scope and the
//! feature areas it may join. Scope only gates visibility.

use crate::config::PrincipalConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use voxfleet_proto::{Feature, OwnedRecord};

/// How much of the fleet a principal can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Own records only.
    Owner,
    /// Every record.
    Admin,
}

/// Record filter derived from a principal's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerFilter {
    All,
    Owner(String),
}

impl OwnerFilter {
    pub fn matches(&self, owner: &str) -> bool {
        match self {
            Self::All => true,
            Self::Owner(user) => user == owner,
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
    pub scope: Scope,
    pub features: Vec<Feature>,
}

impl Principal {
    /// Whether this principal may join `feature`.
    pub fn allows(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn filter(&self) -> OwnerFilter {
        match self.scope {
            Scope::Admin => OwnerFilter::All,
            Scope::Owner => OwnerFilter::Owner(self.user.clone()),
        }
    }

    pub fn can_see<R: OwnedRecord + ?Sized>(&self, record: &R) -> bool {
        self.filter().matches(record.owner())
    }
}

/// Token lookup table built from `[[principals]]`.
#[derive(Debug, Default)]
pub struct Authenticator {
    tokens: HashMap<String, Principal>,
}

impl Authenticator {
    pub fn from_config(principals: &[PrincipalConfig]) -> Self {
        let tokens = principals
            .iter()
            .map(|p| {
                let features = if p.features.is_empty() {
                    Feature::ALL.to_vec()
                } else {
                    p.features.clone()
                };
                let principal = Principal {
                    user: p.user.clone(),
                    scope: p.scope,
                    features,
                };
                (p.token.clone(), principal)
            })
            .collect();
        Self { tokens }
    }

    /// Resolve a bearer token.
    pub fn authenticate(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).cloned()
    }
}
