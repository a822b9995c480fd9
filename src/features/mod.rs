//! Feature state containers.
//!
//! Each feature pairs a listener (backend notifications for one object id),
//! a service (typed backend calls) and a reducer driven by `BlocHandle`.

pub mod calculations;
pub mod favorites;
pub mod recent_views;
pub mod trash;
pub mod workspace;

pub use calculations::{CalculationsBloc, CalculationsEvent, CalculationsState};
pub use favorites::{FavoriteBloc, FavoriteEvent, FavoriteState};
pub use recent_views::{RecentViewsBloc, RecentViewsEvent, RecentViewsState};
pub use trash::{TrashBloc, TrashEvent, TrashState};
pub use workspace::{WorkspaceBloc, WorkspaceEvent, WorkspaceState};
