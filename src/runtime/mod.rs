//! State containers and the small primitives they lean on.
//!
//! - `bloc`: single-task reducer loop with a FIFO intake queue
//! - `debounce`: cancel-and-rearm timer
//! - `state`: load/action/notice markers shared by feature states
//! - `expansion`: sidebar expansion flags
//! - `version`: update checker owned by the application context

pub mod bloc;
pub mod debounce;
pub mod expansion;
pub mod state;
pub mod version;

pub use bloc::{BlocHandle, Dispatcher, Reducer, DEFAULT_STATE_CAPACITY};
pub use debounce::Debounce;
pub use expansion::ExpansionRegistry;
pub use state::{ActionResult, LoadState, UserNotice};
pub use version::{AppVersion, ReleaseInfo, VersionChecker};
