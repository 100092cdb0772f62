//! Background tasks for the cache: the ticking service and the janitor that
//! sweeps expired entries on each tick.

pub(crate) mod janitor;
pub mod ticker;
