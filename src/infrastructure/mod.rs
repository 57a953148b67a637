pub mod page_driver;

pub use page_driver::{CdpPage, PageDriver};
