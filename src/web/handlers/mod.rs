//! Web 路由处理器

pub mod translate;

pub use translate::*;
