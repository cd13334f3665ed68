//! Call-control: client-side registration and call lifecycle
//!
//! This crate drives a single registration plus at most one call through
//! their lifecycle, reconciling user gestures with events arriving
//! asynchronously from a session-protocol engine.
//!
//! ## Layer Separation
//! ```text
//! presentation -> call-control -> session engine (signaling, media, transport)
//! ```
//!
//! Call-control focuses on:
//! - The call state machine and its legality rules
//! - Mapping one user gesture to the command that fits the current state
//! - Publishing a status label after every change
//!
//! SIP signaling, media negotiation and transport belong to the engine,
//! which is consumed through the traits in [`engine`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # use rvoip_call_control::{ControllerBuilder, SessionEngine, UserAction, Gesture};
//! # use std::sync::Arc;
//! # async fn example(engine: Arc<dyn SessionEngine>) -> Result<(), Box<dyn std::error::Error>> {
//! let controller = ControllerBuilder::new(engine)
//!     .local_address("alice@registrar.example.com")
//!     .password("secret")
//!     .peer_address("bob@example.com")
//!     .spawn()?;
//!
//! let mut status = controller.subscribe_status();
//! controller.on_register_requested();
//!
//! while let Ok(update) = status.recv().await {
//!     println!("status: {}", update.label);
//!     if update.label == "Ready for call" {
//!         controller.perform(UserAction::Gesture(Gesture::Act)).await?;
//!         break;
//!     }
//! }
//!
//! controller.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod identity;
pub mod offer;
pub mod session;

pub use call::{CallState, SessionId};
pub use config::ControllerConfig;
pub use controller::{
    status_label, CallController, Command, ControllerBuilder, ControllerHandle, DispatchOutcome,
    Gesture, StatusUpdate, UserAction,
};
pub use engine::{
    EngineError, EngineEvent, EngineResult, EngineSession, EventListener, SessionEngine,
    SessionEvent,
};
pub use error::{CallControlError, CallControlResult, RemoteFailure};
pub use identity::{LocalIdentity, PeerIdentity, SipAddress};
pub use offer::{Offer, OfferTemplate};
pub use session::CallSession;

/// Call-control version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
