//! The request pipeline, pagination combinators, and execution facade
//! (spec §4.1 C5, §4.11 C11): the layer adapters call into to make an
//! outbound HTTP call, page through a list endpoint, or dispatch one named
//! operation on behalf of an authenticated caller.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod facade;
mod middleware;
mod pagination;
mod pipeline;
mod transport;

pub use facade::ExecutionFacade;
pub use middleware::{MiddlewareChain, MiddlewareContext, RateLimitFeedbackMiddleware, ResponseMiddleware};
pub use pagination::{collect_cursor_paginated, get_all_pages};
pub use pipeline::{CallScope, Pipeline};
pub use transport::{compose_headers, resolve_url, RequestBody, RequestCall};
