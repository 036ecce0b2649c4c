mod route_adapter;
pub use route_adapter::RouteAdapter;

mod axum_route_adapter;
pub use axum_route_adapter::AxumRouteAdapter;

mod axum_adapter;
pub use axum_adapter::AxumAdapter;
