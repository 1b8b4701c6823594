use tokio::sync::watch;

/// A global position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Above mean sea level.
    pub absolute_altitude_m: f64,
    /// Above the home position.
    pub relative_altitude_m: f64
}

/// A lazy, infinite sequence of telemetry snapshots.
///
/// The first call to `next` yields the latest known value, if there is one,
/// and later calls wait for a fresh one. Asking the link for another stream
/// starts over from the latest value.
///
/// Returns `None` once the link has shut down.
#[derive(Debug)]
pub struct TelemetryStream<T> {
    rx: watch::Receiver<Option<T>>,
    primed: bool
}

impl<T: Clone> TelemetryStream<T> {
    pub(crate) fn new(rx: watch::Receiver<Option<T>>) -> Self {
        Self { rx, primed: false }
    }

    pub async fn next(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            let latest = self.rx.borrow_and_update().clone();
            if latest.is_some() {
                return latest;
            }
        }

        loop {
            self.rx.changed().await.ok()?;
            let value = self.rx.borrow_and_update().clone();
            if value.is_some() {
                return value;
            }
        }
    }
}

/// The publishing side of a link's telemetry.
#[derive(Debug)]
pub(crate) struct TelemetryChannels {
    pub connected: watch::Sender<bool>,
    pub position: watch::Sender<Option<Position>>,
    pub in_air: watch::Sender<Option<bool>>,
    pub armed: watch::Sender<Option<bool>>
}

impl TelemetryChannels {
    pub fn new() -> Self {
        Self {
            connected: watch::channel(false).0,
            position: watch::channel(None).0,
            in_air: watch::channel(None).0,
            armed: watch::channel(None).0
        }
    }

    pub fn position(&self) -> TelemetryStream<Position> {
        TelemetryStream::new(self.position.subscribe())
    }

    pub fn in_air(&self) -> TelemetryStream<bool> {
        TelemetryStream::new(self.in_air.subscribe())
    }

    pub fn armed(&self) -> TelemetryStream<bool> {
        TelemetryStream::new(self.armed.subscribe())
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Waits until the connected flag is raised.
    pub async fn wait_connected(&self) {
        let mut rx = self.connected.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
