pub mod error;
pub mod sequence;
pub mod store;

pub use error::StoreError;
pub use sequence::next_seq;
pub use store::{decode, encode, prefix_bounds, Store};
