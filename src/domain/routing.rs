//! Venue routing decisions
//!
//! Append-only audit records of every routing attempt, successful or not.
//! Used for observability and routing-quality analysis; never mutated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::venue::{RequestedVenue, Venue, VenueAvailability};

/// Why the router arrived at its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingReason {
    /// Signal named a concrete venue and it was available.
    StaticVenue,
    /// First available venue in priority order was chosen.
    FirstAvailable,
    /// Requested concrete venue does not list the token.
    RequestedUnavailable,
    /// No candidate venue listed the token.
    NoneAvailable,
}

/// Audit record for one routing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueRoutingDecision {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub token_symbol: String,
    pub requested_venue: RequestedVenue,
    /// Every candidate checked, in order, with its availability verdict.
    pub checked: Vec<VenueAvailability>,
    /// Chosen venue; None when routing failed.
    pub selected_venue: Option<Venue>,
    pub reason: RoutingReason,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl VenueRoutingDecision {
    pub fn new(
        signal_id: Uuid,
        token_symbol: impl Into<String>,
        requested_venue: RequestedVenue,
        checked: Vec<VenueAvailability>,
        selected_venue: Option<Venue>,
        reason: RoutingReason,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_id,
            token_symbol: token_symbol.into(),
            requested_venue,
            checked,
            selected_venue,
            reason,
            latency_ms,
            created_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.selected_venue.is_some()
    }
}

/// Routing quality of one venue over a time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueStats {
    /// Times the venue was evaluated as a candidate.
    pub checked: u64,
    /// Times it was the selected venue.
    pub selections: u64,
    /// Average routing latency of the decisions this venue won.
    pub avg_latency_ms: f64,
}

impl VenueStats {
    /// Fraction of evaluations this venue won.
    pub fn selection_ratio(&self) -> f64 {
        if self.checked == 0 {
            return 0.0;
        }
        self.selections as f64 / self.checked as f64
    }
}

/// Aggregated routing quality over a time window, overall and per venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueRoutingStats {
    pub decisions: u64,
    pub selections: u64,
    pub avg_latency_ms: f64,
    pub per_venue: HashMap<Venue, VenueStats>,
}

impl VenueRoutingStats {
    /// Roll up a window of decision records, grouping by venue the way the
    /// audit trail records them: every checked candidate counts toward that
    /// venue's evaluations, the winner toward its selections.
    pub fn aggregate(decisions: &[VenueRoutingDecision]) -> Self {
        let mut stats = Self::default();
        let mut total_latency: u64 = 0;
        let mut won_latency: HashMap<Venue, u64> = HashMap::new();

        for decision in decisions {
            stats.decisions += 1;
            total_latency += decision.latency_ms;
            for availability in &decision.checked {
                stats
                    .per_venue
                    .entry(availability.venue)
                    .or_default()
                    .checked += 1;
            }
            if let Some(venue) = decision.selected_venue {
                stats.selections += 1;
                stats.per_venue.entry(venue).or_default().selections += 1;
                *won_latency.entry(venue).or_default() += decision.latency_ms;
            }
        }

        if stats.decisions > 0 {
            stats.avg_latency_ms = total_latency as f64 / stats.decisions as f64;
        }
        for (venue, latency) in won_latency {
            if let Some(entry) = stats.per_venue.get_mut(&venue) {
                entry.avg_latency_ms = latency as f64 / entry.selections as f64;
            }
        }
        stats
    }

    pub fn selection_ratio(&self) -> f64 {
        if self.decisions == 0 {
            return 0.0;
        }
        self.selections as f64 / self.decisions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded() {
        let d = VenueRoutingDecision::new(
            Uuid::new_v4(),
            "BTC",
            RequestedVenue::Any,
            vec![VenueAvailability::available(Venue::Hyperliquid, "listed")],
            Some(Venue::Hyperliquid),
            RoutingReason::FirstAvailable,
            12,
        );
        assert!(d.succeeded());

        let d = VenueRoutingDecision::new(
            Uuid::new_v4(),
            "BTC",
            RequestedVenue::Any,
            vec![],
            None,
            RoutingReason::NoneAvailable,
            3,
        );
        assert!(!d.succeeded());
    }

    #[test]
    fn test_selection_ratio() {
        let stats = VenueRoutingStats {
            decisions: 10,
            selections: 7,
            avg_latency_ms: 5.0,
            per_venue: HashMap::new(),
        };
        assert!((stats.selection_ratio() - 0.7).abs() < 1e-9);
        assert_eq!(VenueRoutingStats::default().selection_ratio(), 0.0);
    }

    #[test]
    fn test_aggregate_groups_by_venue() {
        let win = |venue, latency| {
            VenueRoutingDecision::new(
                Uuid::new_v4(),
                "ETH",
                RequestedVenue::Any,
                vec![VenueAvailability::available(venue, "listed")],
                Some(venue),
                RoutingReason::FirstAvailable,
                latency,
            )
        };
        let miss = VenueRoutingDecision::new(
            Uuid::new_v4(),
            "XYZ",
            RequestedVenue::Any,
            vec![
                VenueAvailability::unavailable(Venue::Hyperliquid, "not listed"),
                VenueAvailability::unavailable(Venue::Ostium, "not listed"),
            ],
            None,
            RoutingReason::NoneAvailable,
            2,
        );

        let stats = VenueRoutingStats::aggregate(&[
            win(Venue::Hyperliquid, 10),
            win(Venue::Hyperliquid, 20),
            win(Venue::Ostium, 6),
            miss,
        ]);

        assert_eq!(stats.decisions, 4);
        assert_eq!(stats.selections, 3);

        let hl = &stats.per_venue[&Venue::Hyperliquid];
        assert_eq!(hl.checked, 3);
        assert_eq!(hl.selections, 2);
        assert!((hl.avg_latency_ms - 15.0).abs() < 1e-9);
        assert!((hl.selection_ratio() - 2.0 / 3.0).abs() < 1e-9);

        let os = &stats.per_venue[&Venue::Ostium];
        assert_eq!(os.checked, 2);
        assert_eq!(os.selections, 1);
        assert!((os.avg_latency_ms - 6.0).abs() < 1e-9);

        assert!(!stats.per_venue.contains_key(&Venue::Spot));
    }
}
