use super::{ArgumentsHost, Exception, ExceptionFilter, FilterRegistration};
use crate::metadata::{ControllerDescriptor, RouteDescriptor};
use std::sync::{Arc, PoisonError, RwLock};

/// The closure a route's errors are offered to: `Ok(())` means some filter
/// handled (or swallowed) the exception, `Err` hands it back for the
/// built-in converter.
pub type ExceptionHandler = Arc<dyn Fn(Exception, &ArgumentsHost) -> Result<(), Exception> + Send + Sync>;

/// Registry of global exception filters plus the selection logic.
#[derive(Default)]
pub struct ExceptionFilterContext {
    global_filters: RwLock<Vec<Arc<dyn ExceptionFilter>>>,
}

impl ExceptionFilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_filter(&self, filter: Arc<dyn ExceptionFilter>) {
        self.global_filters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filter);
    }

    fn global_filters(&self) -> Vec<Arc<dyn ExceptionFilter>> {
        self.global_filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First filter in `filters` that can handle `exception`: one that
    /// declared no scopes (catch-all) or whose scopes match.
    pub fn get_filter_for_exception(
        &self,
        exception: &Exception,
        filters: &[Arc<dyn ExceptionFilter>],
    ) -> Option<Arc<dyn ExceptionFilter>> {
        filters
            .iter()
            .find(|filter| {
                let scopes = filter.catch_scopes();
                scopes.is_empty() || scopes.iter().any(|scope| scope.matches(exception))
            })
            .cloned()
    }

    /// Build the exception handler for one route.
    ///
    /// Filters are consulted in class, then method, then global order, and
    /// the first match wins. Registrations are resolved lazily on each
    /// invocation (factory registrations cache their instance after the
    /// first one).
    pub fn create_exception_handler(
        self: &Arc<Self>,
        controller: &Arc<ControllerDescriptor>,
        route: &Arc<RouteDescriptor>,
    ) -> ExceptionHandler {
        let context = Arc::clone(self);
        let controller = Arc::clone(controller);
        let route = Arc::clone(route);

        Arc::new(move |exception: Exception, host: &ArgumentsHost| {
            let mut filters: Vec<Arc<dyn ExceptionFilter>> = Vec::new();
            filters.extend(controller.filters().iter().map(FilterRegistration::resolve));
            filters.extend(route.filters().iter().map(FilterRegistration::resolve));
            filters.extend(context.global_filters());

            match context.get_filter_for_exception(&exception, &filters) {
                Some(filter) => filter.catch(exception, host),
                None => Err(exception),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{BaseExceptionFilter, CatchScope, HttpException, RuntimeError};
    use crate::http::{HttpRequest, HttpResponse, RequestMethod};
    use crate::metadata::{ControllerDescriptor, RouteDescriptor};
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScopedFilter {
        scopes: Vec<CatchScope>,
        hits: Arc<AtomicUsize>,
    }

    impl ExceptionFilter for ScopedFilter {
        fn catch_scopes(&self) -> &[CatchScope] {
            &self.scopes
        }

        fn catch(&self, _exception: Exception, _host: &ArgumentsHost) -> Result<(), Exception> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scoped(scopes: Vec<CatchScope>) -> (Arc<dyn ExceptionFilter>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(ScopedFilter {
                scopes,
                hits: hits.clone(),
            }),
            hits,
        )
    }

    #[derive(Default)]
    struct DummyController;

    fn host() -> ArgumentsHost {
        ArgumentsHost::new(
            HttpRequest::new(RequestMethod::Get, "/x"),
            HttpResponse::new(),
        )
    }

    #[test]
    fn typed_filter_wins_over_catch_all_when_it_matches() {
        let context = ExceptionFilterContext::new();
        let (f1, _) = scoped(vec![CatchScope::Http(StatusCode::NOT_FOUND)]);
        let (f2, _) = scoped(vec![]);
        let filters = vec![f1.clone(), f2.clone()];

        let not_found = Exception::Http(HttpException::not_found("x"));
        let selected = context.get_filter_for_exception(&not_found, &filters).unwrap();
        assert!(Arc::ptr_eq(&selected, &f1));

        let runtime = Exception::Runtime(RuntimeError::other("x"));
        let selected = context.get_filter_for_exception(&runtime, &filters).unwrap();
        assert!(Arc::ptr_eq(&selected, &f2));
    }

    #[test]
    fn no_applicable_filter_yields_none() {
        let context = ExceptionFilterContext::new();
        let (f1, _) = scoped(vec![CatchScope::Validation]);
        let filters = vec![f1];

        let runtime = Exception::Runtime(RuntimeError::other("x"));
        assert!(context.get_filter_for_exception(&runtime, &filters).is_none());
    }

    #[test]
    fn handler_prefers_class_filters_then_method_then_global() {
        let context = Arc::new(ExceptionFilterContext::new());
        let (global, global_hits) = scoped(vec![]);
        context.add_global_filter(global);

        let (class_filter, class_hits) = scoped(vec![]);
        let (method_filter, method_hits) = scoped(vec![]);

        let controller = ControllerDescriptor::builder::<DummyController>("")
            .filter(FilterRegistration::instance(class_filter))
            .build();
        let route = RouteDescriptor::get("/x", "handler")
            .filter(FilterRegistration::instance(method_filter))
            .build();

        let handler = context.create_exception_handler(&controller, &route);
        handler(Exception::Http(HttpException::bad_request("x")), &host()).unwrap();

        assert_eq!(class_hits.load(Ordering::SeqCst), 1);
        assert_eq!(method_hits.load(Ordering::SeqCst), 0);
        assert_eq!(global_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_falls_through_class_to_method_by_scope() {
        let context = Arc::new(ExceptionFilterContext::new());
        let (class_filter, class_hits) = scoped(vec![CatchScope::Validation]);
        let (method_filter, method_hits) = scoped(vec![CatchScope::HttpAny]);

        let controller = ControllerDescriptor::builder::<DummyController>("")
            .filter(FilterRegistration::instance(class_filter))
            .build();
        let route = RouteDescriptor::get("/x", "handler")
            .filter(FilterRegistration::instance(method_filter))
            .build();

        let handler = context.create_exception_handler(&controller, &route);
        handler(Exception::Http(HttpException::conflict("x")), &host()).unwrap();

        assert_eq!(class_hits.load(Ordering::SeqCst), 0);
        assert_eq!(method_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unmatched_exception_is_handed_back() {
        let context = Arc::new(ExceptionFilterContext::new());
        let controller = ControllerDescriptor::builder::<DummyController>("").build();
        let route = RouteDescriptor::get("/x", "handler").build();

        let handler = context.create_exception_handler(&controller, &route);
        let result = handler(Exception::Runtime(RuntimeError::other("loose")), &host());
        assert!(result.is_err());
    }

    #[test]
    fn base_filter_as_global_catches_everything() {
        let context = Arc::new(ExceptionFilterContext::new());
        context.add_global_filter(Arc::new(BaseExceptionFilter));
        let controller = ControllerDescriptor::builder::<DummyController>("").build();
        let route = RouteDescriptor::get("/x", "handler").build();

        let handler = context.create_exception_handler(&controller, &route);
        let host = host();
        handler(Exception::Runtime(RuntimeError::other("boom")), &host).unwrap();
        assert_eq!(
            host.switch_to_http().response().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
