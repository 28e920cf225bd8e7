//! Navigation requests issued by view models after successful mutations.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Products,
    Product(String),
    EditProduct(String),
    AddProduct,
    /// Return to the previous page.
    Back,
}

impl Route {
    pub fn path(&self) -> Option<String> {
        match self {
            Route::Home => Some("/".to_string()),
            Route::Products => Some("/products".to_string()),
            Route::Product(id) => Some(format!("/products/{id}")),
            Route::EditProduct(id) => Some(format!("/products/{id}/edit")),
            Route::AddProduct => Some("/products/add".to_string()),
            Route::Back => None,
        }
    }
}

/// Implemented by whatever owns the page stack (a router, a TUI, a test).
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, route: Route);
}

/// Navigator that only remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RouteLog {
    routes: Mutex<Vec<Route>>,
}

impl RouteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.routes.lock().last().cloned()
    }
}

impl Navigator for RouteLog {
    fn navigate(&self, route: Route) {
        self.routes.lock().push(route);
    }
}
