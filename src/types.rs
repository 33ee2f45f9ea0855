//! # Object Data Model
//!
//! The static types an expression is checked against. There is no runtime
//! reflection: callers describe their model with [`ClassType::builder`],
//! [`EnumType::new`] and the constructed types of [`Type`].
//!
//! - **[builtin]** - members and methods every model gets for free
//! - **[conversion]** - the implicit conversion relation
pub mod builtin;
pub mod conversion;
mod model;

pub use model::{
    AnonymousType, ClassBody, ClassBuilder, ClassType, Constructor, EnumType, Indexer, Member,
    MemberKind, Method, Type,
};
