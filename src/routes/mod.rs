// Routing module.
// Declarative path-to-view mapping consumed by whatever renders the views.

pub mod table;

pub use table::{Resolution, RouteMatch, RouteTable, ViewName};
