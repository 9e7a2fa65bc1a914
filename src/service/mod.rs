//! Read side: cached, paginated views of the delegation history.

pub mod dto;
mod error;
mod pagination;
mod validator;

pub use error::{AppError, UNPROCESSABLE_ENTITY};
pub use pagination::{offset, to_pagination, PageRef, Pagination, NO_PAGE};
pub use validator::QueryService;
