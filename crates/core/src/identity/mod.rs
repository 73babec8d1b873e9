//! Identity resolution for jobs.
//!
//! Maps a job's desired name and container group onto exactly one canonical
//! path under the storage root, picks a working path that can never be the
//! canonical one, and claims the identity so that at most one job produces a
//! given canonical artifact at a time.

mod error;
mod normalize;
mod resolver;

pub use error::IdentityError;
pub use normalize::{is_encoding_safe, legalize_filename, MAX_NAME_LEN};
pub use resolver::{
    ClaimTable, IdentityClaim, IdentityResolver, Resolution, ResolvedJob, SkipReason,
};
