use async_trait::async_trait;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};
use task_local_extensions::Extensions;

/// Middleware enforcing a minimum spacing between any two outgoing requests
/// from a single client instance.
///
/// This is a client-side floor, not a substitute for handling 429 responses:
/// the server may still throttle well above this rate.
pub struct RateFloorMiddleware {
    min_spacing: Duration,
    /// Earliest instant at which the next request may be sent.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateFloorMiddleware {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            next_allowed: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Middleware for RateFloorMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // Reserve a send slot inside the critical section; sleep outside it,
        // so concurrent callers queue up consecutive slots.
        let wait = {
            let mut next_allowed = self.next_allowed.lock().unwrap();
            let now = Instant::now();
            let slot = match *next_allowed {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_allowed = Some(slot + self.min_spacing);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        next.run(req, extensions).await
    }
}
