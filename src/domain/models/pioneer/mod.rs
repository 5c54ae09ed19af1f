//! Pioneer detection domain models.
//!
//! Leaf-first: estimates and observations feed per-expert rolling windows; each
//! closed period builds a [`GroupSnapshot`]; the distance reduction,
//! orientation and attribution tests read windows and snapshots only; the
//! classifier turns their [`TestScore`] into a lifecycle state; the weight
//! assigner and the pooling step produce the period's published result.

pub mod attribution;
pub mod classifier;
pub mod distance;
pub mod estimate;
pub mod observation;
pub mod orientation;
pub mod outcome;
pub mod pooling;
pub mod record;
pub mod scores;
pub mod snapshot;
pub mod weights;
pub mod window;

pub use attribution::*;
pub use classifier::*;
pub use distance::*;
pub use estimate::*;
pub use observation::*;
pub use orientation::*;
pub use outcome::*;
pub use pooling::*;
pub use record::*;
pub use scores::*;
pub use snapshot::*;
pub use weights::*;
pub use window::*;
