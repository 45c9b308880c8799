//! # Display sink.
//!
//! [`DisplaySink`] is the actor handler registered on the `"display"` route.
//! It hands every `DisplayImage` to a [`DisplayDriver`]. Images arriving before
//! a driver is attached are logged and dropped; driver failures are logged and
//! never stop the sink.
//!
//! ```text
//! plugins ──► Router("display") ──► DisplaySink ──► driver.render(title, image)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::actor::{ActorContext, Handler};
use crate::messages::{Message, MessageKind, Payload};

/// Hardware (or simulated) panel driver.
pub trait DisplayDriver: Send + 'static {
    /// Driver name, reported in logs.
    fn name(&self) -> &str;

    /// Shows one image. The image is opaque to the runtime.
    fn render(&mut self, title: &str, image: &Payload) -> anyhow::Result<()>;
}

/// Actor handler feeding a display driver.
#[derive(Default)]
pub struct DisplaySink {
    driver: Option<Box<dyn DisplayDriver>>,
    rendered: u64,
}

impl DisplaySink {
    /// Creates a sink without a driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a driver.
    pub fn with_driver(mut self, driver: impl DisplayDriver) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Number of images handed to the driver successfully.
    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

#[async_trait]
impl Handler for DisplaySink {
    async fn execute(&mut self, ctx: &ActorContext, msg: Message) -> anyhow::Result<()> {
        let MessageKind::DisplayImage(img) = &msg.kind else {
            debug!(actor = ctx.name(), kind = msg.kind.name(), "ignored");
            return Ok(());
        };
        let Some(driver) = self.driver.as_mut() else {
            warn!(actor = ctx.name(), title = %img.title, "no display driver; image dropped");
            return Ok(());
        };

        driver.render(&img.title, &img.image)?;
        self.rendered += 1;
        info!(actor = ctx.name(), driver = driver.name(), title = %img.title, "image rendered");
        Ok(())
    }
}

/// Driver that records rendered titles instead of drawing.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    titles: Arc<Mutex<Vec<String>>>,
}

impl RecordingDriver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Titles rendered so far, oldest first.
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().clone()
    }
}

impl DisplayDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&mut self, title: &str, _image: &Payload) -> anyhow::Result<()> {
        self.titles.lock().push(title.to_string());
        Ok(())
    }
}
