pub mod items;
pub mod results;
pub mod workspace;

pub use items::{ExtendedItemInfo, ItemInfo, ItemType, PendingChange, ServerStatusType};
pub use results::{CheckoutResult, DeleteResult};
pub use workspace::{mappings_differ, Location, Mapping, Workspace, WorkspaceDiff};
