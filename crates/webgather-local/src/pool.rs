//! Bounded pool of browser page surfaces.
//!
//! The free list and active count are the only state shared across tasks in
//! the whole pipeline; both live behind one mutex. A surface checked out by
//! `acquire` is exclusively owned until handed back to `release`.

use std::sync::Arc;
use webgather_core::{Error, PageFactory, PageSurface, PipelineConfig, Result};

struct PoolState {
    free: Vec<Box<dyn PageSurface>>,
    active: usize,
}

pub struct PagePool {
    factory: Arc<dyn PageFactory>,
    state: tokio::sync::Mutex<PoolState>,
    max_pages: usize,
    poll: std::time::Duration,
    poll_retries: usize,
}

impl PagePool {
    pub fn new(factory: Arc<dyn PageFactory>, cfg: &PipelineConfig) -> Self {
        Self {
            factory,
            state: tokio::sync::Mutex::new(PoolState {
                free: Vec::new(),
                active: 0,
            }),
            max_pages: cfg.max_pages.max(1),
            poll: cfg.acquire_poll(),
            poll_retries: cfg.acquire_retries,
        }
    }

    /// Allocated surfaces right now (`active` + `free`). May transiently
    /// exceed `max_pages` only under the overflow policy.
    pub async fn allocated(&self) -> usize {
        let st = self.state.lock().await;
        st.active + st.free.len()
    }

    /// Check out a page surface.
    ///
    /// Order of preference: reuse a free surface; create one while under
    /// `max_pages`; otherwise poll for a release up to the configured retry
    /// ceiling. When the wait budget is exhausted the pool over-provisions —
    /// it creates a surface beyond the nominal cap instead of failing the
    /// caller. Liveness over strict capacity; tune `acquire_retries` to
    /// trade the other way.
    pub async fn acquire(&self) -> Result<Box<dyn PageSurface>> {
        for attempt in 0..=self.poll_retries {
            {
                let mut st = self.state.lock().await;
                if let Some(page) = st.free.pop() {
                    st.active += 1;
                    return Ok(page);
                }
                if st.active + st.free.len() < self.max_pages {
                    // Reserve the slot before the (slow) create so a
                    // concurrent acquire cannot double-book it.
                    st.active += 1;
                    drop(st);
                    return self.create_reserved().await;
                }
            }
            if attempt < self.poll_retries {
                tokio::time::sleep(self.poll).await;
            }
        }

        tracing::warn!(
            max_pages = self.max_pages,
            "page pool wait budget exhausted; over-provisioning"
        );
        {
            let mut st = self.state.lock().await;
            st.active += 1;
        }
        self.create_reserved().await
    }

    async fn create_reserved(&self) -> Result<Box<dyn PageSurface>> {
        match self.factory.open_page().await {
            Ok(page) => Ok(page),
            Err(e) => {
                let mut st = self.state.lock().await;
                st.active -= 1;
                Err(Error::Pool(format!("page creation failed: {e}")))
            }
        }
    }

    /// Hand a surface back. A successful reset returns it to the free list;
    /// a failed reset closes and discards it (the slot frees up for a later
    /// create; the surface itself never comes back).
    pub async fn release(&self, mut page: Box<dyn PageSurface>) {
        match page.reset().await {
            Ok(()) => {
                let mut st = self.state.lock().await;
                st.active -= 1;
                st.free.push(page);
            }
            Err(e) => {
                tracing::debug!(error = %e, "page reset failed; closing surface");
                page.close().await;
                let mut st = self.state.lock().await;
                st.active -= 1;
            }
        }
    }
}
