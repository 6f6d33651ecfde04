//! Derived listening statistics
//!
//! Pure functions over already-fetched API data: no I/O, no caching, and
//! the same input order always gives the same output. Callers recompute on
//! every request.

pub mod genres;
pub mod ranking;

pub use genres::{GenreShare, genre_distribution};
pub use ranking::{GroupRank, rank_groups};
