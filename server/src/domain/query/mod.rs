//! Search: criteria, compilation, counting and paging

pub mod compiler;
pub mod count;
pub mod criteria;
pub mod error;
pub mod pager;
pub mod search;

pub use compiler::{CompiledQuery, compile};
pub use count::{FastCount, advisory_estimate, exact_count, row_count_for_paging, try_fast_count};
pub use criteria::{FilterCriteria, Side};
pub use error::CompileError;
pub use pager::{Navigation, Page, PageNotice, PageState, Pager, clamp_page, load_page};
pub use search::{SearchNotice, find_rows};
