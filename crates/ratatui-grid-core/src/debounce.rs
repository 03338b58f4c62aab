//! Deadline-based single-shot timers driven by explicit timestamps.

/// One pending timer per operation.
///
/// Scheduling again replaces the pending timer. Every schedule hands out a token; a fire request
/// carrying an older token is ignored, so a late callback from a replaced timer cannot run.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay_ms: u64,
    next_token: u64,
    pending: Option<Pending<T>>,
}

#[derive(Clone, Debug)]
struct Pending<T> {
    due_ms: u64,
    token: u64,
    payload: T,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            next_token: 0,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn set_delay_ms(&mut self, delay_ms: u64) {
        self.delay_ms = delay_ms;
    }

    /// (Re)arms the timer `delay_ms` after `now_ms`.
    pub fn schedule(&mut self, now_ms: u64, payload: T) -> u64 {
        self.next_token += 1;
        self.pending = Some(Pending {
            due_ms: now_ms.saturating_add(self.delay_ms),
            token: self.next_token,
            payload,
        });
        self.next_token
    }

    /// Arms the timer only if none is pending; otherwise replaces the payload and keeps the
    /// deadline. This is the trailing-edge half of a throttle.
    pub fn schedule_trailing(&mut self, now_ms: u64, payload: T) -> u64 {
        match &mut self.pending {
            Some(p) => {
                p.payload = payload;
                p.token
            }
            None => self.schedule(now_ms, payload),
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.due_ms)
    }

    /// Takes the payload if the deadline passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<T> {
        if self.pending.as_ref().is_some_and(|p| p.due_ms <= now_ms) {
            return self.pending.take().map(|p| p.payload);
        }
        None
    }

    /// Fires the pending timer if `token` is still current, regardless of its deadline.
    pub fn fire(&mut self, token: u64) -> Option<T> {
        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            return self.pending.take().map(|p| p.payload);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_pushes_the_deadline() {
        let mut d = Debouncer::new(100);
        d.schedule(0, "a");
        d.schedule(50, "ab");
        assert_eq!(d.poll(120), None);
        assert_eq!(d.poll(150), Some("ab"));
        assert!(!d.is_pending());
    }

    #[test]
    fn stale_token_does_not_fire() {
        let mut d = Debouncer::new(10);
        let old = d.schedule(0, 1);
        let new = d.schedule(1, 2);
        assert_eq!(d.fire(old), None);
        assert_eq!(d.fire(new), Some(2));
    }

    #[test]
    fn trailing_keeps_first_deadline() {
        let mut d = Debouncer::new(40);
        d.schedule_trailing(0, (0, 0));
        d.schedule_trailing(30, (0, 9));
        assert_eq!(d.due_ms(), Some(40));
        assert_eq!(d.poll(40), Some((0, 9)));
    }
}
