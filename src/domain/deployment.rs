//! Deployments
//!
//! A deployment binds a user-controlled wallet to an agent and records which
//! execution credentials apply per venue. The engine treats it as read-mostly
//! configuration; only the module-enabled flag changes over its life.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Active,
    Paused,
    Cancelled,
}

/// Wallet + agent pairing with per-venue execution credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub agent_id: Uuid,
    /// User's wallet address (the Safe-style wallet the module acts on, or
    /// the user's exchange wallet for API venues).
    pub user_wallet: String,
    pub status: DeploymentStatus,
    /// Delegated-authority wallet module is enabled on-chain.
    pub module_enabled: bool,
    /// Delegated agent address approved on Hyperliquid, if any.
    pub hyperliquid_agent: Option<String>,
    /// Delegated agent address approved on Ostium, if any.
    pub ostium_agent: Option<String>,
    /// Per-deployment venue routing priority override.
    pub venue_priority: Option<Vec<Venue>>,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(agent_id: Uuid, user_wallet: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            user_wallet: user_wallet.into(),
            status: DeploymentStatus::Active,
            module_enabled: false,
            hyperliquid_agent: None,
            ostium_agent: None,
            venue_priority: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_module_enabled(mut self) -> Self {
        self.module_enabled = true;
        self
    }

    pub fn with_hyperliquid_agent(mut self, agent: impl Into<String>) -> Self {
        self.hyperliquid_agent = Some(agent.into());
        self
    }

    pub fn with_ostium_agent(mut self, agent: impl Into<String>) -> Self {
        self.ostium_agent = Some(agent.into());
        self
    }

    pub fn with_venue_priority(mut self, priority: Vec<Venue>) -> Self {
        self.venue_priority = Some(priority);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }

    /// Whether the credentials needed to execute on `venue` are in place.
    pub fn credentials_for(&self, venue: Venue) -> bool {
        match venue {
            Venue::Spot => self.module_enabled,
            Venue::Hyperliquid => self.hyperliquid_agent.is_some(),
            Venue::Ostium => self.ostium_agent.is_some(),
        }
    }

    /// Routing priority for this deployment, falling back to the default.
    pub fn routing_priority(&self) -> Vec<Venue> {
        self.venue_priority
            .clone()
            .unwrap_or_else(|| Venue::DEFAULT_PRIORITY.to_vec())
    }
}
