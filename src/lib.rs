#![allow(dead_code, unused_imports, unused_variables)]
//! Venue Pilot - multi-venue signal execution and position lifecycle engine
//!
//! Turns upstream trading signals into venue positions and shepherds those
//! positions from entry to exit across perpetuals venues (Hyperliquid,
//! Ostium) and delegated on-chain spot execution.
//!
//! # Modules
//!
//! - `domain`: Core business logic (Signal, Position, ExitTracker, routing records)
//! - `ports`: Trait abstractions (PositionStore, VenueAdapter, PriceFeed)
//! - `adapters`: External implementations (venue HTTP services, wallet module, oracle, in-memory store)
//! - `application`: Router, validator, executor, tracker, exit monitor
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
