pub mod movie;
mod paging;
pub mod rating;

pub use paging::{Page, Paging};
