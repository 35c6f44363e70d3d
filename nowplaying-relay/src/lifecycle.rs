//! Relay lifecycle: owns the screen and the listening task.
//!
//! ```text
//!            start()
//!   Stopped ────────► Running
//!      ▲                 │
//!      └──── stop() ◄────┘
//! ```
//!
//! The listening task runs on the current thread's `LocalSet`, so
//! [`RelayApp::start`] must be called from inside one.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nowplaying_core::NowPlayingError;

use crate::screen::RelayScreen;
use crate::service::{RelayService, ServiceSettings};
use crate::ui::DisplayToolkit;

struct Running<D: DisplayToolkit> {
    screen: Rc<RefCell<RelayScreen<D>>>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

pub struct RelayApp<D: DisplayToolkit + 'static> {
    settings: ServiceSettings,
    display: Option<D>,
    running: Option<Running<D>>,
}

impl<D: DisplayToolkit + 'static> RelayApp<D> {
    pub fn new(display: D, settings: ServiceSettings) -> Self {
        Self {
            settings,
            display: Some(display),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// The toolkit, while stopped.
    pub fn display(&self) -> Option<&D> {
        self.display.as_ref()
    }

    /// Inspect the live screen, while running.
    pub fn with_screen<R>(&self, f: impl FnOnce(&RelayScreen<D>) -> R) -> Option<R> {
        let running = self.running.as_ref()?;
        let screen = running.screen.borrow();
        Some(f(&screen))
    }

    /// Build the screen, bind the listener and spawn the listening task.
    ///
    /// Returns the bound address. Calling it again while running is a
    /// no-op.
    pub async fn start(&mut self) -> Result<SocketAddr, NowPlayingError> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        let display = self
            .display
            .take()
            .ok_or_else(|| NowPlayingError::Other("display toolkit was lost".into()))?;
        let screen = match RelayScreen::create(display) {
            Ok(screen) => Rc::new(RefCell::new(screen)),
            Err((display, e)) => {
                error!("failed to build relay screen: {e}");
                self.display = Some(display);
                return Err(e);
            }
        };

        let service = match RelayService::bind(self.settings.clone(), Rc::clone(&screen)).await {
            Ok(service) => service,
            Err(e) => {
                error!("failed to listen on {}: {e}", self.settings.listen_address);
                self.display = release(screen);
                return Err(e);
            }
        };
        let local_addr = match service.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                drop(service);
                self.display = release(screen);
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let task = tokio::task::spawn_local(service.run(shutdown.clone()));
        info!("relay started on {local_addr}");

        self.running = Some(Running {
            screen,
            shutdown,
            task,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Cancel the listening task, wait for it, and tear down the screen.
    /// Safe to call repeatedly or before `start`.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.cancel();
        if let Err(e) = running.task.await {
            warn!("relay task ended abnormally: {e}");
        }
        self.display = release(running.screen);
        info!("relay stopped");
    }
}

impl<D: DisplayToolkit + 'static> Drop for RelayApp<D> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}

/// Tear down the screen once nothing else holds it.
fn release<D: DisplayToolkit>(screen: Rc<RefCell<RelayScreen<D>>>) -> Option<D> {
    match Rc::try_unwrap(screen) {
        Ok(cell) => Some(cell.into_inner().teardown()),
        Err(_) => {
            error!("screen still in use; widgets not released");
            None
        }
    }
}
