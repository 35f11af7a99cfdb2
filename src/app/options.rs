use super::Teardown;

/// Boot configuration.
///
/// Both flags follow an "unless explicitly false" rule, so the defaults are
/// `true`: errors abort boot and propagate out of guarded zones, and every
/// caught error is logged before teardown.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationOptions {
    pub abort_on_error: bool,
    pub auto_flush_logs: bool,
}

impl Default for ApplicationOptions {
    fn default() -> Self {
        Self {
            abort_on_error: true,
            auto_flush_logs: true,
        }
    }
}

impl ApplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    pub fn auto_flush_logs(mut self, flush: bool) -> Self {
        self.auto_flush_logs = flush;
        self
    }

    pub(crate) fn teardown(&self) -> Teardown {
        if self.abort_on_error {
            Teardown::Rethrow
        } else {
            Teardown::Swallow
        }
    }
}
