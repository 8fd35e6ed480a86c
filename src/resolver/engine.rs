//! The deferral/retry engine.
//!
//! Fixpoint iteration over the products: each pass re-attempts every
//! Pending or Deferred product; a pass that resolves nobody while products
//! remain Deferred means an inter-product cycle, and every stuck product
//! fails. Bounded by the product count, so worst case O(n^2) work, which is
//! fine for product counts in the hundreds.

use std::time::Instant;

use crate::core::product::ResolutionState;
use crate::resolver::errors::ResolveError;
use crate::resolver::resolution::Resolution;
use crate::resolver::{DeferralPolicy, Session};
use crate::util::Phase;

impl Session {
    /// Run resolution passes until a fixpoint.
    ///
    /// Per-product failures are isolated and recorded in the returned
    /// [`Resolution`] unless the session is configured fail-fast, in which
    /// case the first failure is returned as an error. Cancellation is
    /// checked between products and always returns an error.
    pub fn resolve_all(&mut self) -> Result<Resolution, ResolveError> {
        let mut pass = 0usize;

        loop {
            pass += 1;
            let pass_start = Instant::now();
            let mut progress = false;
            let mut blocked = false;

            for idx in 0..self.products.len() {
                if self.cancel.is_cancelled() {
                    self.profiler
                        .record(Phase::ResolutionPasses, pass_start.elapsed());
                    tracing::info!("resolution cancelled during pass {}", pass);
                    return Err(ResolveError::Cancelled);
                }

                match self.products[idx].state() {
                    ResolutionState::Unresolved | ResolutionState::Deferred => {}
                    _ => continue,
                }

                match self.resolve_product_dependencies(idx, DeferralPolicy::Allowed) {
                    Ok(true) => {
                        self.products[idx].finish_resolved();
                        progress = true;
                        tracing::debug!(
                            "pass {}: product `{}` resolved",
                            pass,
                            self.products[idx].instance_key()
                        );
                    }
                    Ok(false) => {
                        self.products[idx].set_state(ResolutionState::Deferred);
                        blocked = true;
                    }
                    Err(err) => {
                        tracing::debug!(
                            "pass {}: product `{}` failed: {}",
                            pass,
                            self.products[idx].instance_key(),
                            err
                        );
                        self.products[idx].fail(err.to_string());
                        // A failure shrinks the pending set, so products
                        // deferred on this one must get another pass to
                        // pick up the failure instead of reading the
                        // stall as a cycle.
                        progress = true;
                        if self.fail_fast {
                            self.profiler
                                .record(Phase::ResolutionPasses, pass_start.elapsed());
                            return Err(err);
                        }
                    }
                }
            }

            self.profiler
                .record(Phase::ResolutionPasses, pass_start.elapsed());

            if !blocked {
                break;
            }

            if !progress {
                let stuck: Vec<String> = self
                    .products
                    .iter()
                    .filter(|p| p.state() == ResolutionState::Deferred)
                    .map(|p| p.instance_key().as_str().to_string())
                    .collect();

                tracing::debug!(
                    "pass {} made no progress, failing stuck products: {}",
                    pass,
                    stuck.join(", ")
                );

                let cause = ResolveError::CyclicDependency {
                    products: stuck.clone(),
                }
                .to_string();

                for product in &mut self.products {
                    if product.state() == ResolutionState::Deferred {
                        product.fail(cause.clone());
                    }
                }

                if self.fail_fast {
                    return Err(ResolveError::CyclicDependency { products: stuck });
                }
                break;
            }
        }

        tracing::info!(
            "resolution finished after {} pass(es): {} product(s), {} cached module(s)",
            pass,
            self.products.len(),
            self.cache.len()
        );

        Ok(self.build_resolution())
    }

    /// Snapshot products into the immutable output graph.
    fn build_resolution(&self) -> Resolution {
        let mut resolution = Resolution::new();

        for product in &self.products {
            resolution.add_product(
                product.instance_key(),
                product.state(),
                product.modules().to_vec(),
                product.failure().map(str::to_string),
            );
        }

        for product in &self.products {
            for &target_name in product.product_dependencies() {
                if let Some(targets) = self.index.get(&target_name) {
                    for &target in targets {
                        resolution
                            .add_edge(product.instance_key(), self.products[target].instance_key());
                    }
                }
            }
        }

        resolution
    }
}
