//! Canonical domain model definitions.
//!
//! One definition per concept: earlier iterations of this system carried
//! several diverging shapes for the same entities, which are collapsed here.
//! Presentation-level naming differences belong in the HTTP DTO layer, not in
//! the data model.

pub mod class;
pub mod page;
pub mod payment;
pub mod records;
pub mod student;
pub mod user;

pub use class::*;
pub use page::*;
pub use payment::*;
pub use records::*;
pub use student::*;
pub use user::*;
