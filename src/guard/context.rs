use super::{CanActivate, ExecutionContext};
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of global guards plus the short-circuiting evaluation logic.
#[derive(Default)]
pub struct GuardContext {
    global_guards: RwLock<Vec<Arc<dyn CanActivate>>>,
}

impl GuardContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_guard(&self, guard: Arc<dyn CanActivate>) {
        self.global_guards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(guard);
    }

    /// Run global guards in registration order, then scoped guards in
    /// declaration order, stopping at the first denial. A guard error
    /// counts as a denial.
    pub async fn apply_guards(
        &self,
        scoped_guards: &[Arc<dyn CanActivate>],
        context: &ExecutionContext,
    ) -> bool {
        let global: Vec<Arc<dyn CanActivate>> = self
            .global_guards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for guard in global.iter().chain(scoped_guards) {
            match guard.can_activate(context).await {
                Ok(true) => {}
                Ok(false) => return false,
                Err(err) => {
                    tracing::warn!(error = %err, handler = context.get_handler(), "guard failed, denying request");
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{Exception, RuntimeError};
    use crate::http::{HttpRequest, HttpResponse, RequestMethod};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGuard {
        allow: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CanActivate for CountingGuard {
        async fn can_activate(&self, _context: &ExecutionContext) -> Result<bool, Exception> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.allow)
        }
    }

    struct FailingGuard;

    #[async_trait]
    impl CanActivate for FailingGuard {
        async fn can_activate(&self, _context: &ExecutionContext) -> Result<bool, Exception> {
            Err(RuntimeError::other("guard exploded").into())
        }
    }

    fn execution_context() -> ExecutionContext {
        ExecutionContext::new(
            HttpRequest::new(RequestMethod::Get, "/guarded"),
            HttpResponse::new(),
            "TestController",
            "handler",
        )
    }

    #[tokio::test]
    async fn denial_short_circuits_remaining_guards() {
        let context = GuardContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let scoped: Vec<Arc<dyn CanActivate>> = vec![
            Arc::new(CountingGuard {
                allow: false,
                calls: calls.clone(),
            }),
            Arc::new(CountingGuard {
                allow: true,
                calls: calls.clone(),
            }),
        ];

        let allowed = context.apply_guards(&scoped, &execution_context()).await;
        assert!(!allowed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn global_guards_run_before_scoped() {
        let context = GuardContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        context.add_global_guard(Arc::new(CountingGuard {
            allow: false,
            calls: calls.clone(),
        }));
        let scoped: Vec<Arc<dyn CanActivate>> = vec![Arc::new(CountingGuard {
            allow: true,
            calls: calls.clone(),
        })];

        let allowed = context.apply_guards(&scoped, &execution_context()).await;
        assert!(!allowed);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "scoped guard never ran");
    }

    #[tokio::test]
    async fn guard_error_counts_as_denial() {
        let context = GuardContext::new();
        let scoped: Vec<Arc<dyn CanActivate>> = vec![Arc::new(FailingGuard)];
        assert!(!context.apply_guards(&scoped, &execution_context()).await);
    }

    #[tokio::test]
    async fn all_passing_guards_allow_the_request() {
        let context = GuardContext::new();
        let calls = Arc::new(AtomicUsize::new(0));
        context.add_global_guard(Arc::new(CountingGuard {
            allow: true,
            calls: calls.clone(),
        }));
        let scoped: Vec<Arc<dyn CanActivate>> = vec![Arc::new(CountingGuard {
            allow: true,
            calls: calls.clone(),
        })];

        assert!(context.apply_guards(&scoped, &execution_context()).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
