use anyhow::{Result, anyhow};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Flag shared between the event loop and an off-thread fetch.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(anyhow!("fetch cancelled at stage={stage}"));
        }
        Ok(())
    }
}

/// At most one full-source fetch is live; starting another cancels the
/// previous one.
#[derive(Debug, Default)]
pub struct FetchSlot {
    current: Option<(u64, CancellationToken)>,
}

impl FetchSlot {
    pub fn start(&mut self, seq: u64) -> CancellationToken {
        self.cancel();
        let token = CancellationToken::new();
        self.current = Some((seq, token.clone()));
        token
    }

    /// Clears the slot when `seq` is the live fetch.
    pub fn finish(&mut self, seq: u64) -> bool {
        match &self.current {
            Some((live, _)) if *live == seq => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
    }
}
