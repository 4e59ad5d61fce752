//! SIGINT/SIGTERM delivered to async code
//!
//! signal-hook's iterator runs on a plain thread and forwards each signal
//! into a watch channel the run loop can await.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::os::raw::c_int;
use std::thread;
use tokio::sync::watch;
use tracing::info;

pub struct ShutdownSignal {
    rx: watch::Receiver<Option<c_int>>,
    handle: Handle,
}

/// Listen for SIGINT and SIGTERM.
pub fn shutdown_signal() -> std::io::Result<ShutdownSignal> {
    listen(&[SIGINT, SIGTERM])
}

pub(crate) fn listen(signals: &[c_int]) -> std::io::Result<ShutdownSignal> {
    let mut signals = Signals::new(signals)?;
    let handle = signals.handle();
    let (tx, rx) = watch::channel(None);

    thread::spawn(move || {
        for sig in signals.forever() {
            info!("Received {}", signal_name(sig));
            if tx.send(Some(sig)).is_err() {
                break;
            }
        }
    });

    Ok(ShutdownSignal { rx, handle })
}

fn signal_name(sig: c_int) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        _ => "signal",
    }
}

impl ShutdownSignal {
    /// Wait for the first signal; returns its number.
    pub async fn recv(&mut self) -> Option<c_int> {
        self.rx.wait_for(Option::is_some).await.ok().and_then(|s| *s)
    }

    /// Wait for another signal after [`ShutdownSignal::recv`].
    pub async fn recv_next(&mut self) -> Option<c_int> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    /// Stop listening and let the forwarding thread exit.
    pub fn close(&self) {
        self.handle.close();
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_hook::consts::SIGUSR2;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_is_forwarded() {
        let mut signal = listen(&[SIGUSR2]).unwrap();
        signal_hook::low_level::raise(SIGUSR2).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), signal.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(SIGUSR2));
        signal.close();
    }
}
