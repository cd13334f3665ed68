//! Controller builder

use std::net::IpAddr;
use std::sync::Arc;

use super::{CallController, ControllerHandle};
use crate::{config::ControllerConfig, engine::SessionEngine, error::CallControlResult};

/// Builder for a call controller bound to a session engine
///
/// ```rust,no_run
/// # use rvoip_call_control::{ControllerBuilder, SessionEngine};
/// # use std::sync::Arc;
/// # async fn example(engine: Arc<dyn SessionEngine>) -> Result<(), Box<dyn std::error::Error>> {
/// let controller = ControllerBuilder::new(engine)
///     .local_address("alice@192.168.1.20:5060")
///     .password("secret")
///     .peer_address("bob@192.168.1.30")
///     .spawn()?;
///
/// controller.on_user_gesture(); // registers
/// println!("{}", controller.current_status_label());
/// controller.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControllerBuilder {
    engine: Arc<dyn SessionEngine>,
    config: ControllerConfig,
}

impl ControllerBuilder {
    pub fn new(engine: Arc<dyn SessionEngine>) -> Self {
        Self {
            engine,
            config: ControllerConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_address(mut self, address: impl Into<String>) -> Self {
        self.config.local_address = address.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.config.display_name = display_name.into();
        self
    }

    pub fn peer_address(mut self, address: impl Into<String>) -> Self {
        self.config.peer_address = Some(address.into());
        self
    }

    pub fn local_ip(mut self, ip: IpAddr) -> Self {
        self.config.local_ip = ip;
        self
    }

    pub fn media_port(mut self, port: u16) -> Self {
        self.config.local_media_port = port;
        self
    }

    /// Build a controller to drive directly, together with its event receiver
    pub fn build(
        self,
    ) -> CallControlResult<(
        CallController,
        tokio::sync::mpsc::UnboundedReceiver<crate::engine::SessionEvent>,
    )> {
        CallController::new(&self.config, self.engine)
    }

    /// Build the controller and run it on its own task
    pub fn spawn(self) -> CallControlResult<ControllerHandle> {
        let (controller, events) = self.build()?;
        Ok(ControllerHandle::spawn(controller, events))
    }
}
